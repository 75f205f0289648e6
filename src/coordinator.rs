//! Engine registry and routing façade.
//!
//! The coordinator maps engine names to Managers, tracks an optional
//! default engine, and routes SQL, browsing, persistence lookups and
//! cross-engine transfers. It is a cheap `Clone` over shared state; Managers
//! hold a weak [`CoordinatorRef`] back to it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::config::EngineConfig;
use crate::content::SqlResult;
use crate::datasource::{DataSourceDescriptor, EngineType};
use crate::error::{DdfError, DdfResult};
use crate::handle::DataHandle;
use crate::manager::persistence::PersistenceUri;
use crate::manager::sql::{self, SHOW_TABLES};
use crate::manager::{DelegatingManager, Manager, ManagerFactory, Persistible};

#[derive(Default)]
struct Registry {
    managers: HashMap<String, Arc<dyn Manager>>,
    /// Registration order, for `engine_names` and `browse_all`
    order: Vec<String>,
    default_engine: Option<String>,
    /// Delegating engine name to the engine it wraps
    delegates: HashMap<String, String>,
}

impl Registry {
    fn delegates_of(&self, target: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .delegates
            .iter()
            .filter(|(_, wrapped)| wrapped.as_str() == target)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

struct CoordinatorInner {
    factory: ManagerFactory,
    registry: RwLock<Registry>,
}

/// Weak back-reference from a Manager to its coordinator.
#[derive(Clone)]
pub struct CoordinatorRef(Weak<CoordinatorInner>);

impl CoordinatorRef {
    pub fn upgrade(&self) -> Option<Coordinator> {
        self.0.upgrade().map(|inner| Coordinator { inner })
    }
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("engines", &self.engine_names())
            .field("default_engine", &self.default_engine())
            .finish()
    }
}

impl Coordinator {
    pub fn new(factory: ManagerFactory) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                factory,
                registry: RwLock::new(Registry::default()),
            }),
        }
    }

    /// Coordinator over the built-in backends.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::new(ManagerFactory::with_builtin(config))
    }

    pub fn factory(&self) -> &ManagerFactory {
        &self.inner.factory
    }

    fn downgrade(&self) -> CoordinatorRef {
        CoordinatorRef(Arc::downgrade(&self.inner))
    }

    /// Register a new engine backed by a Manager from the factory.
    pub async fn register_engine(
        &self,
        name: &str,
        engine_type: EngineType,
        descriptor: DataSourceDescriptor,
    ) -> DdfResult<Arc<dyn Manager>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DdfError::InvalidArgument(
                "Engine name cannot be empty".to_string(),
            ));
        }
        if self.inner.registry.read().managers.contains_key(name) {
            return Err(DdfError::DuplicateEngine(name.to_string()));
        }

        let manager = self.inner.factory.create(engine_type, descriptor)?;
        self.insert(name, manager.clone(), None)?;

        if let Err(e) = manager.startup().await {
            tracing::warn!("Engine {} failed to start: {}", name, e);
            self.remove_entry(name);
            return Err(e);
        }

        tracing::info!("Registered engine {} ({})", name, engine_type);
        Ok(manager)
    }

    /// Register an engine that shares `target`'s backend but defaults its
    /// handles to `source_uri`.
    pub fn register_delegate(
        &self,
        name: &str,
        target: &str,
        source_uri: &str,
    ) -> DdfResult<Arc<dyn Manager>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DdfError::InvalidArgument(
                "Engine name cannot be empty".to_string(),
            ));
        }
        let inner = self.resolve_engine(target)?;
        let manager: Arc<dyn Manager> = Arc::new(DelegatingManager::new(inner, source_uri));
        self.insert(name, manager.clone(), Some(target))?;

        tracing::info!("Registered engine {} delegating to {} at {}", name, target, source_uri);
        Ok(manager)
    }

    // Duplicate check and insert under one write lock.
    fn insert(&self, name: &str, manager: Arc<dyn Manager>, wraps: Option<&str>) -> DdfResult<()> {
        let mut registry = self.inner.registry.write();
        if registry.managers.contains_key(name) {
            return Err(DdfError::DuplicateEngine(name.to_string()));
        }
        // The target may have been unregistered since it was resolved.
        if let Some(target) = wraps {
            if !registry.managers.contains_key(target) {
                return Err(DdfError::UnknownEngine(target.to_string()));
            }
            registry.delegates.insert(name.to_string(), target.to_string());
        }
        manager.bind(name, self.downgrade());
        registry.managers.insert(name.to_string(), manager);
        registry.order.push(name.to_string());
        Ok(())
    }

    fn remove_entry(&self, name: &str) -> Option<Arc<dyn Manager>> {
        let mut registry = self.inner.registry.write();
        Self::remove_locked(&mut registry, name)
    }

    fn remove_locked(registry: &mut Registry, name: &str) -> Option<Arc<dyn Manager>> {
        let manager = registry.managers.remove(name)?;
        registry.order.retain(|n| n != name);
        registry.delegates.remove(name);
        if registry.default_engine.as_deref() == Some(name) {
            registry.default_engine = None;
        }
        Some(manager)
    }

    /// Remove `name` unless a registered delegating engine still wraps it.
    fn detach(&self, name: &str) -> DdfResult<Arc<dyn Manager>> {
        let mut registry = self.inner.registry.write();
        if !registry.managers.contains_key(name) {
            return Err(DdfError::UnknownEngine(name.to_string()));
        }
        let delegates = registry.delegates_of(name);
        if !delegates.is_empty() {
            return Err(DdfError::EngineInUse {
                engine: name.to_string(),
                delegates,
            });
        }
        Self::remove_locked(&mut registry, name)
            .ok_or_else(|| DdfError::UnknownEngine(name.to_string()))
    }

    /// Tear an engine down.
    ///
    /// The engine leaves the registry (and stops being the default), every
    /// handle it owns is uncached and evicted, then the Manager shuts down.
    /// Returns the number of handles evicted. An engine wrapped by a
    /// registered delegating engine is left untouched and
    /// [`DdfError::EngineInUse`] is returned.
    pub async fn unregister_engine(&self, name: &str) -> DdfResult<usize> {
        let manager = self.detach(name)?;

        let mut evicted = 0;
        for handle in manager.list_handles() {
            // A delegating engine shares the cache of the engine it wraps.
            if handle.engine_name() != name {
                continue;
            }
            match manager.remove_handle(&handle) {
                Ok(()) => evicted += 1,
                Err(e) => tracing::warn!("Failed to evict handle {:?}: {}", handle.id(), e),
            }
        }

        manager.shutdown().await?;
        tracing::info!("Unregistered engine {} ({} handles evicted)", name, evicted);
        Ok(evicted)
    }

    /// The Manager registered under `name`; the same instance on every call.
    pub fn resolve_engine(&self, name: &str) -> DdfResult<Arc<dyn Manager>> {
        self.inner
            .registry
            .read()
            .managers
            .get(name)
            .cloned()
            .ok_or_else(|| DdfError::UnknownEngine(name.to_string()))
    }

    pub fn contains_engine(&self, name: &str) -> bool {
        self.inner.registry.read().managers.contains_key(name)
    }

    /// Registered engine names in registration order.
    pub fn engine_names(&self) -> Vec<String> {
        self.inner.registry.read().order.clone()
    }

    pub fn set_default_engine(&self, name: &str) -> DdfResult<()> {
        let mut registry = self.inner.registry.write();
        if !registry.managers.contains_key(name) {
            return Err(DdfError::UnknownEngine(name.to_string()));
        }
        registry.default_engine = Some(name.to_string());
        Ok(())
    }

    pub fn default_engine(&self) -> Option<String> {
        self.inner.registry.read().default_engine.clone()
    }

    fn target(&self, engine: Option<&str>) -> DdfResult<Arc<dyn Manager>> {
        match engine {
            Some(name) => self.resolve_engine(name),
            None => {
                let name = self.default_engine().ok_or(DdfError::NoDefaultEngine)?;
                self.resolve_engine(&name)
            }
        }
    }

    /// List the tables of one engine.
    pub async fn browse(&self, name: &str) -> DdfResult<SqlResult> {
        let manager = self.resolve_engine(name)?;
        sql::sql(manager.as_ref(), SHOW_TABLES).await
    }

    /// Browse every engine, in registration order.
    pub async fn browse_all(&self) -> DdfResult<Vec<(String, SqlResult)>> {
        let mut results = Vec::new();
        for name in self.engine_names() {
            let result = self.browse(&name).await?;
            results.push((name, result));
        }
        Ok(results)
    }

    /// Run SQL on `engine`, or on the default engine when none is given.
    pub async fn run_sql(&self, command: &str, engine: Option<&str>) -> DdfResult<SqlResult> {
        let manager = self.target(engine)?;
        tracing::debug!("Routing SQL to {}", manager.engine_name());
        sql::sql(manager.as_ref(), command).await
    }

    pub async fn run_sql_to_handle(
        &self,
        command: &str,
        engine: Option<&str>,
    ) -> DdfResult<Arc<DataHandle>> {
        let manager = self.target(engine)?;
        tracing::debug!("Routing SQL to {}", manager.engine_name());
        sql::sql_to_handle(manager.as_ref(), command).await
    }

    /// Pull `uri` from `from_engine` into `to_engine`. The returned handle
    /// is owned by `to_engine`.
    pub async fn transfer(
        &self,
        from_engine: &str,
        to_engine: &str,
        uri: &str,
    ) -> DdfResult<Arc<DataHandle>> {
        self.resolve_engine(from_engine)?;
        let destination = self.resolve_engine(to_engine)?;
        destination.transfer(from_engine, uri).await
    }

    /// Load a persisted object; the URI scheme names the engine.
    pub async fn load_uri(&self, uri: &str) -> DdfResult<Persistible> {
        let parsed = PersistenceUri::parse(uri)?;
        let manager = self.resolve_engine(parsed.engine())?;
        manager.load_uri(uri).await
    }

    /// The Manager owning `handle`.
    pub fn owner_of(&self, handle: &DataHandle) -> DdfResult<Arc<dyn Manager>> {
        self.resolve_engine(handle.engine_name())
    }

    /// Register the engines a configuration declares.
    pub async fn register_declared(&self, config: &EngineConfig) -> DdfResult<()> {
        for declaration in config.engines() {
            let (engine_type, descriptor) = declaration.descriptor()?;
            self.register_engine(&declaration.name, engine_type, descriptor)
                .await?;
            if declaration.default {
                self.set_default_engine(&declaration.name)?;
            }
        }
        Ok(())
    }

    /// Unregister every engine, newest first.
    pub async fn shutdown(&self) -> DdfResult<()> {
        for name in self.engine_names().into_iter().rev() {
            self.unregister_engine(&name).await?;
        }
        Ok(())
    }
}
