//! Persistence URIs and the restore path.
//!
//! Storage of persisted objects belongs to an external [`PersistenceHandler`]
//! attached to a Manager; Managers without one report `Unsupported`.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::Manager;
use crate::error::{DdfError, DdfResult};
use crate::handle::{DataHandle, Model};

/// `<engineName>://<engine-specific-path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceUri {
    engine: String,
    path: String,
}

impl PersistenceUri {
    /// Parse a URI. A missing or empty scheme, or an empty path, fails here,
    /// before any engine is looked up.
    pub fn parse(uri: &str) -> DdfResult<Self> {
        let (engine, path) = uri
            .split_once("://")
            .ok_or_else(|| DdfError::invalid_uri(uri, "missing engine segment"))?;
        let engine = engine.trim();
        if engine.is_empty() {
            return Err(DdfError::invalid_uri(uri, "empty engine segment"));
        }
        if path.trim().is_empty() {
            return Err(DdfError::invalid_uri(uri, "empty path"));
        }

        Ok(Self {
            engine: engine.to_string(),
            path: path.to_string(),
        })
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Split `namespace/name` at its last slash.
    pub fn namespace_and_name(&self) -> DdfResult<(&str, &str)> {
        match self.path.rsplit_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok((namespace, name))
            }
            _ => Err(DdfError::invalid_uri(
                self.to_string(),
                "expected <namespace>/<name>",
            )),
        }
    }

    /// The path read as a handle identifier.
    pub fn handle_id(&self) -> DdfResult<Uuid> {
        Uuid::parse_str(&self.path)
            .map_err(|_| DdfError::invalid_uri(self.to_string(), "path is not a handle identifier"))
    }
}

impl fmt::Display for PersistenceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.engine, self.path)
    }
}

/// An object that can be persisted and loaded back.
#[derive(Clone)]
pub enum Persistible {
    Handle(Arc<DataHandle>),
    Model(Arc<dyn Model>),
}

impl Persistible {
    pub fn as_handle(&self) -> Option<&Arc<DataHandle>> {
        match self {
            Persistible::Handle(h) => Some(h),
            Persistible::Model(_) => None,
        }
    }

    pub fn as_model(&self) -> Option<&Arc<dyn Model>> {
        match self {
            Persistible::Model(m) => Some(m),
            Persistible::Handle(_) => None,
        }
    }
}

/// Storage collaborator for persisted handles and models.
#[async_trait]
pub trait PersistenceHandler: Send + Sync {
    async fn load(&self, namespace: &str, name: &str) -> anyhow::Result<Persistible>;

    async fn unpersist(&self, namespace: &str, name: &str) -> anyhow::Result<()>;

    /// Rebuild a handle persisted under `id`; `None` if nothing is stored.
    async fn restore(&self, id: Uuid) -> anyhow::Result<Option<DataHandle>>;
}

fn handler<M: Manager + ?Sized>(
    manager: &M,
    operation: &str,
) -> DdfResult<Arc<dyn PersistenceHandler>> {
    manager
        .core()
        .persistence_handler()
        .ok_or_else(|| DdfError::unsupported(manager.engine_name(), operation))
}

pub async fn load<M: Manager + ?Sized>(
    manager: &M,
    namespace: &str,
    name: &str,
) -> DdfResult<Persistible> {
    let handler = handler(manager, "load")?;
    let object = handler
        .load(namespace, name)
        .await
        .map_err(|e| DdfError::backend(manager.engine_name(), "load", e))?;

    match &object {
        Persistible::Handle(handle) => {
            let cached = handle.id().is_some_and(|id| manager.core().handles().contains(id));
            if !cached {
                manager.add_handle(handle.clone())?;
            }
        }
        Persistible::Model(model) => manager.add_model(model.clone()),
    }
    Ok(object)
}

pub async fn load_uri<M: Manager + ?Sized>(manager: &M, uri: &str) -> DdfResult<Persistible> {
    let parsed = PersistenceUri::parse(uri)?;
    let (namespace, name) = parsed.namespace_and_name()?;
    load(manager, namespace, name).await
}

pub async fn unpersist<M: Manager + ?Sized>(
    manager: &M,
    namespace: &str,
    name: &str,
) -> DdfResult<()> {
    let handler = handler(manager, "unpersist")?;
    handler
        .unpersist(namespace, name)
        .await
        .map_err(|e| DdfError::backend(manager.engine_name(), "unpersist", e))
}

/// Cached handle `id`, or the persisted one re-registered under `id`.
pub async fn get_or_restore<M: Manager + ?Sized>(
    manager: &M,
    id: Uuid,
) -> DdfResult<Arc<DataHandle>> {
    if let Ok(handle) = manager.get_handle(id) {
        return Ok(handle);
    }

    let Some(handler) = manager.core().persistence_handler() else {
        return Err(DdfError::HandleNotFoundById(id));
    };
    let restored = handler
        .restore(id)
        .await
        .map_err(|e| DdfError::backend(manager.engine_name(), "restore handle", e))?
        .ok_or(DdfError::HandleNotFoundById(id))?;

    if restored.engine_name() != manager.core().engine_name() {
        return Err(DdfError::InvalidArgument(format!(
            "Restored handle {} belongs to engine {}, not {}",
            id,
            restored.engine_name(),
            manager.core().engine_name()
        )));
    }
    let handle = Arc::new(restored);
    manager.core().handles().add_with_id(handle.clone(), id)?;
    tracing::debug!("Restored handle {} on {}", id, manager.engine_name());
    Ok(handle)
}

pub async fn get_or_restore_uri<M: Manager + ?Sized>(
    manager: &M,
    uri: &str,
) -> DdfResult<Arc<DataHandle>> {
    let parsed = PersistenceUri::parse(uri)?;
    get_or_restore(manager, parsed.handle_id()?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri() {
        let uri = PersistenceUri::parse("e1://db/table").unwrap();
        assert_eq!(uri.engine(), "e1");
        assert_eq!(uri.path(), "db/table");
        assert_eq!(uri.namespace_and_name().unwrap(), ("db", "table"));
        assert_eq!(uri.to_string(), "e1://db/table");
    }

    #[test]
    fn test_malformed_uris() {
        for uri in ["://path", "no-scheme", "e1://", "  ://x"] {
            assert!(
                matches!(PersistenceUri::parse(uri), Err(DdfError::InvalidUri { .. })),
                "{} should be rejected",
                uri
            );
        }
    }

    #[test]
    fn test_handle_id_path() {
        let id = Uuid::new_v4();
        let uri = PersistenceUri::parse(&format!("e1://{}", id)).unwrap();
        assert_eq!(uri.handle_id().unwrap(), id);
        assert!(PersistenceUri::parse("e1://db.table")
            .unwrap()
            .handle_id()
            .is_err());
    }

    #[test]
    fn test_namespace_required() {
        let uri = PersistenceUri::parse("e1://table").unwrap();
        assert!(uri.namespace_and_name().is_err());
    }
}
