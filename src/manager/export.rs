//! Delimited export through OpenDAL.

use std::sync::Arc;

use super::transfer::read_handle;
use super::Manager;
use crate::content::{delimited, SqlResult};
use crate::error::{DdfError, DdfResult};
use crate::handle::DataHandle;
use crate::storage;

/// What to export: a handle of the exporting engine, or a result in hand.
pub enum ExportSource {
    Handle(Arc<DataHandle>),
    Result(SqlResult),
}

pub async fn export<M: Manager + ?Sized>(
    manager: &M,
    source: ExportSource,
    url: &str,
    separator: &str,
    has_header: bool,
) -> DdfResult<()> {
    let engine = manager.engine_name();
    let separator = delimited::parse_separator(separator)
        .map_err(|e| DdfError::InvalidArgument(e.to_string()))?;
    let location = storage::resolve(url)?;

    let result = match source {
        ExportSource::Handle(handle) => {
            let owner = manager.core().engine_name();
            if handle.engine_name() != owner {
                return Err(DdfError::InvalidArgument(format!(
                    "Cannot export handle of engine {} from {}",
                    handle.engine_name(),
                    owner
                )));
            }
            read_handle(manager, &handle).await?
        }
        ExportSource::Result(result) => result,
    };

    let bytes = delimited::write(&result, separator, has_header)
        .map_err(|e| DdfError::backend(engine.as_str(), "export", e))?;
    let size = bytes.len();
    storage::write(&location, bytes)
        .await
        .map_err(|e| DdfError::backend(engine.as_str(), "export", e))?;

    tracing::info!("{}: exported {} bytes to {}", engine, size, url);
    Ok(())
}
