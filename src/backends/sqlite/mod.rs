//! SQLite-backed Manager.
//!
//! Supports:
//! - File-based databases (`.db`, `.sqlite`, `.sqlite3`)
//! - In-memory databases (`:memory:`)
//! - Read-only mode
//!
//! # Example
//!
//! ```ignore
//! use ddf::coordinator::Coordinator;
//! use ddf::config::EngineConfig;
//! use ddf::datasource::{DataSourceDescriptor, EngineType, SourceParams};
//!
//! let coordinator = Coordinator::with_config(EngineConfig::builtin());
//! let descriptor = DataSourceDescriptor::new(
//!     EngineType::Jdbc,
//!     SourceParams::file("/path/to/database.db", false),
//! );
//! let manager = coordinator.register_engine("warehouse", EngineType::Jdbc, descriptor).await?;
//! ```

mod manager;
mod types;

pub use manager::SqliteManager;
