//! Built-in Manager implementations.
//!
//! - **sqlite**: SQLx SQLite pool, file or in-memory (`jdbc`, `postgres`, `redshift` engine types)
//! - **file**: OpenDAL local filesystem or S3 plus in-memory tables (`file`, `s3`)

pub mod file;
pub mod sqlite;

use std::sync::Arc;

use crate::manager::{Manager, ManagerFactory};

/// Implementation name of the SQLite Manager.
pub const SQLITE_MANAGER: &str = "sqlite";
/// Implementation name of the file Manager.
pub const FILE_MANAGER: &str = "file";

pub use file::FileManager;
pub use sqlite::SqliteManager;

/// Register the built-in constructors with a factory.
pub fn register_builtin(factory: &ManagerFactory) {
    factory.register(SQLITE_MANAGER, |context| {
        Ok(Arc::new(SqliteManager::new(context)?) as Arc<dyn Manager>)
    });
    factory.register(FILE_MANAGER, |context| {
        Ok(Arc::new(FileManager::new(context)?) as Arc<dyn Manager>)
    });
}
