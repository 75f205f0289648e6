//! Copy within an engine and pulls across engines.
//!
//! A transfer never moves a handle: the destination reads the source's rows
//! and materialises them as a new handle in its own cache.

use std::sync::Arc;
use uuid::Uuid;

use super::persistence::PersistenceUri;
use super::{Manager, SqlOptions};
use crate::content::{Schema, SqlResult};
use crate::error::{DdfError, DdfResult};
use crate::handle::DataHandle;

/// What a transfer pulls from the source engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSource {
    /// A handle of the source engine, by identifier
    Handle(Uuid),
    /// A handle name or a table of the source engine
    Table(String),
}

impl TransferSource {
    /// Parse `<from_engine>://<handle id or table>`; a bare reference is taken as is.
    pub fn parse(from_engine: &str, reference: &str) -> DdfResult<Self> {
        let path = if reference.contains("://") {
            let uri = PersistenceUri::parse(reference)?;
            if uri.engine() != from_engine {
                return Err(DdfError::invalid_uri(
                    reference,
                    format!("expected a reference on engine {}", from_engine),
                ));
            }
            uri.path().to_string()
        } else {
            reference.trim().to_string()
        };

        if path.is_empty() {
            return Err(DdfError::invalid_uri(reference, "empty source reference"));
        }
        Ok(match Uuid::parse_str(&path) {
            Ok(id) => Self::Handle(id),
            Err(_) => Self::Table(path),
        })
    }
}

/// All rows behind a handle, read through its owning Manager.
pub async fn read_handle<M: Manager + ?Sized>(
    manager: &M,
    handle: &DataHandle,
) -> DdfResult<SqlResult> {
    let table = handle
        .table_name()
        .ok_or_else(|| DdfError::unsupported(manager.engine_name(), "read a handle without a backing table"))?;
    manager
        .sql_with(&format!("SELECT * FROM {}", table), SqlOptions::default())
        .await
}

async fn read_source<M: Manager + ?Sized>(
    manager: &M,
    source: &TransferSource,
) -> DdfResult<(SqlResult, Option<Schema>)> {
    let handle = match source {
        TransferSource::Handle(id) => Some(manager.get_or_restore_handle(*id).await?),
        TransferSource::Table(name) => manager.get_handle_by_name(name).ok(),
    };

    match (handle, source) {
        (Some(handle), _) => {
            let result = read_handle(manager, &handle).await?;
            Ok((result, handle.schema()))
        }
        (None, TransferSource::Table(table)) => {
            let result = manager
                .sql_with(&format!("SELECT * FROM {}", table), SqlOptions::default())
                .await?;
            Ok((result, None))
        }
        (None, TransferSource::Handle(id)) => Err(DdfError::HandleNotFoundById(*id)),
    }
}

/// Pull `source` from engine `from_engine` into `destination`.
pub async fn pull<M: Manager + ?Sized>(
    destination: &M,
    from_engine: &str,
    source: TransferSource,
) -> DdfResult<Arc<DataHandle>> {
    let coordinator = destination.core().coordinator().ok_or_else(|| {
        DdfError::unsupported(destination.engine_name(), "transfer outside a coordinator")
    })?;
    let origin = coordinator.resolve_engine(from_engine)?;

    tracing::debug!(
        "Transferring {:?} from {} to {}",
        source,
        from_engine,
        destination.engine_name()
    );
    let (result, schema) = read_source(origin.as_ref(), &source).await?;
    let handle = destination.materialize(None, result, schema).await?;

    tracing::info!(
        "Transferred {:?} from {} into {} as {:?}",
        source,
        from_engine,
        destination.engine_name(),
        handle.id()
    );
    Ok(handle)
}

/// Duplicate a handle of `manager` under `target_name`.
pub async fn copy_within<M: Manager + ?Sized>(
    manager: &M,
    handle: &DataHandle,
    target_name: &str,
) -> DdfResult<Arc<DataHandle>> {
    let owner = manager.core().engine_name();
    if handle.engine_name() != owner {
        return Err(DdfError::InvalidArgument(format!(
            "Handle belongs to engine {}, not {}",
            handle.engine_name(),
            owner
        )));
    }
    let result = read_handle(manager, handle).await?;
    manager
        .materialize(Some(target_name), result, handle.schema())
        .await
}

/// Copy the handle named `source_name` of `other` into `manager`.
pub async fn copy_across<M: Manager + ?Sized>(
    manager: &M,
    other: &dyn Manager,
    source_name: &str,
    target_name: &str,
) -> DdfResult<Arc<DataHandle>> {
    let source = other.get_handle_by_name(source_name)?;
    let result = read_handle(other, &source).await?;
    manager
        .materialize(Some(target_name), result, source.schema())
        .await
}
