//! Coordinator for distributed data frames over heterogeneous engines.
//!
//! A [`Coordinator`] maps engine names to [`Manager`]s built by a
//! [`ManagerFactory`] from [`EngineConfig`]. Each Manager owns a
//! [`HandleCache`](handle::HandleCache) of the [`DataHandle`]s it created
//! and answers SQL, persistence, export and transfer requests for its
//! backend.
//!
//! ```ignore
//! use ddf::{Coordinator, EngineConfig};
//! use ddf::datasource::{DataSourceDescriptor, EngineType, SourceParams};
//!
//! let coordinator = Coordinator::with_config(EngineConfig::builtin());
//! coordinator
//!     .register_engine(
//!         "e1",
//!         EngineType::Jdbc,
//!         DataSourceDescriptor::new(EngineType::Jdbc, SourceParams::in_memory()),
//!     )
//!     .await?;
//! coordinator.set_default_engine("e1")?;
//! let result = coordinator.run_sql("SELECT 1", None).await?;
//! ```

pub mod backends;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod datasource;
pub mod error;
pub mod handle;
pub mod logging;
pub mod manager;
pub mod storage;

pub use config::EngineConfig;
pub use content::{Schema, SqlResult, SqlTypedResult};
pub use coordinator::Coordinator;
pub use datasource::{DataFormat, DataSourceDescriptor, EngineType, SourceParams};
pub use error::{DdfError, DdfResult};
pub use handle::DataHandle;
pub use manager::{Manager, ManagerFactory};
