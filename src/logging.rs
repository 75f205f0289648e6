//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, checked before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "DDF_LOG";

fn filter() -> EnvFilter {
    std::env::var(LOG_ENV_VAR)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls leave the first subscriber in place.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
