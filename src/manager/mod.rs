//! Per-engine Manager contract.
//!
//! A Manager adapts one backend to the coordinator. Implementations embed a
//! [`ManagerCore`] (identity, handle cache, model registry) and supply the
//! backend-specific operations; everything else has a default built on
//! those operations.
//!
//! - **SQL** (`sql`): overload helpers and command preparation
//! - **Handles** (`handles`): handle constructor helpers
//! - **Transfer** (`transfer`): copy and cross-engine pulls
//! - **Persistence** (`persistence`): persistence URIs and restore path
//! - **Export** (`export`): delimited writer
//! - **Factory** (`factory`): registration table of Manager constructors
//! - **Delegating** (`delegating`): source-bound decorator
//!
//! # Example
//!
//! ```ignore
//! use ddf::manager::{sql, Manager};
//!
//! async fn count(manager: &dyn Manager) -> ddf::DdfResult<()> {
//!     let mut result = sql::sql(manager, "SELECT count(*) FROM users").await?;
//!     while result.next() {
//!         println!("{:?}", result.get_string(0));
//!     }
//!     Ok(())
//! }
//! ```

pub mod delegating;
pub mod export;
pub mod factory;
pub mod handles;
pub mod persistence;
pub mod sql;
pub mod transfer;

pub use delegating::DelegatingManager;
pub use export::ExportSource;
pub use factory::{ManagerConstructor, ManagerFactory};
pub use persistence::{PersistenceHandler, PersistenceUri, Persistible};
pub use transfer::TransferSource;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{EngineConfig, KEY_HANDLE};
use crate::content::{Schema, SqlResult, SqlTypedResult};
use crate::coordinator::{Coordinator, CoordinatorRef};
use crate::datasource::{DataFormat, DataSourceDescriptor, EngineType};
use crate::error::{DdfError, DdfResult};
use crate::handle::{
    DataHandle, HandleArgs, HandleCache, HandleFactory, ManagerIdentity, Model, ModelRegistry,
};

/// Everything a Manager constructor receives.
#[derive(Clone)]
pub struct ManagerContext {
    pub engine_type: EngineType,
    /// `None` on the zero-argument construction path
    pub descriptor: Option<DataSourceDescriptor>,
    pub config: Arc<EngineConfig>,
    pub handle_factory: Arc<HandleFactory>,
}

impl ManagerContext {
    pub fn new(engine_type: EngineType, config: Arc<EngineConfig>) -> Self {
        Self {
            engine_type,
            descriptor: None,
            config,
            handle_factory: Arc::new(HandleFactory::new()),
        }
    }

    pub fn with_descriptor(mut self, descriptor: DataSourceDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_handle_factory(mut self, handle_factory: Arc<HandleFactory>) -> Self {
        self.handle_factory = handle_factory;
        self
    }
}

/// State shared by every Manager implementation.
pub struct ManagerCore {
    engine_type: EngineType,
    descriptor: Option<DataSourceDescriptor>,
    config: Arc<EngineConfig>,
    handle_factory: Arc<HandleFactory>,
    engine_name: RwLock<Option<String>>,
    coordinator: RwLock<Option<CoordinatorRef>>,
    handles: HandleCache,
    models: ModelRegistry,
    persistence: RwLock<Option<Arc<dyn PersistenceHandler>>>,
}

impl ManagerCore {
    pub fn new(context: ManagerContext) -> Self {
        Self {
            engine_type: context.engine_type,
            descriptor: context.descriptor,
            config: context.config,
            handle_factory: context.handle_factory,
            engine_name: RwLock::new(None),
            coordinator: RwLock::new(None),
            handles: HandleCache::new(),
            models: ModelRegistry::default(),
            persistence: RwLock::new(None),
        }
    }

    /// Bound engine name, or the engine type tag before registration.
    pub fn engine_name(&self) -> String {
        self.engine_name
            .read()
            .clone()
            .unwrap_or_else(|| self.engine_type.to_string())
    }

    pub fn is_bound(&self) -> bool {
        self.engine_name.read().is_some()
    }

    pub fn bind(&self, engine_name: &str, coordinator: CoordinatorRef) {
        *self.engine_name.write() = Some(engine_name.to_string());
        *self.coordinator.write() = Some(coordinator);
    }

    /// Attach a coordinator without naming the engine.
    pub fn attach_coordinator(&self, coordinator: CoordinatorRef) {
        let mut guard = self.coordinator.write();
        if guard.is_none() {
            *guard = Some(coordinator);
        }
    }

    /// The coordinator this Manager is registered with, if it is still alive.
    pub fn coordinator(&self) -> Option<Coordinator> {
        self.coordinator.read().as_ref().and_then(CoordinatorRef::upgrade)
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    pub fn descriptor(&self) -> Option<&DataSourceDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn handle_factory(&self) -> &HandleFactory {
        &self.handle_factory
    }

    pub fn handles(&self) -> &HandleCache {
        &self.handles
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn set_persistence_handler(&self, handler: Arc<dyn PersistenceHandler>) {
        *self.persistence.write() = Some(handler);
    }

    pub fn persistence_handler(&self) -> Option<Arc<dyn PersistenceHandler>> {
        self.persistence.read().clone()
    }
}

/// Qualifiers of the query family. Omitted qualifiers use backend defaults.
#[derive(Debug, Clone, Default)]
pub struct SqlOptions {
    pub max_rows: Option<usize>,
    pub source: Option<DataSourceDescriptor>,
}

/// Qualifiers of `sql_to_handle`.
#[derive(Debug, Clone, Default)]
pub struct SqlToHandleOptions {
    pub schema: Option<Schema>,
    pub source: Option<DataSourceDescriptor>,
    pub format: Option<DataFormat>,
}

/// Contract every engine backend implements.
///
/// The required methods are the backend-specific ones: the canonical SQL
/// entry points, ingestion, and writing a result set into the engine.
/// Overload conveniences live in [`sql`] as free functions.
#[async_trait]
pub trait Manager: Send + Sync {
    fn core(&self) -> &ManagerCore;

    fn engine_name(&self) -> String {
        self.core().engine_name()
    }

    fn engine_type(&self) -> EngineType {
        self.core().engine_type()
    }

    fn identity(&self) -> ManagerIdentity {
        ManagerIdentity {
            engine_name: self.engine_name(),
            engine_type: self.engine_type(),
        }
    }

    /// Give the Manager its engine name and a back-reference.
    fn bind(&self, engine_name: &str, coordinator: CoordinatorRef) {
        self.core().bind(engine_name, coordinator);
    }

    /// Acquire backend resources. Called once at registration.
    async fn startup(&self) -> DdfResult<()> {
        Ok(())
    }

    /// Release backend resources. Called once at teardown.
    async fn shutdown(&self) -> DdfResult<()> {
        Ok(())
    }

    // ---- query family ----

    async fn sql_with(&self, command: &str, options: SqlOptions) -> DdfResult<SqlResult>;

    async fn sql_to_handle_with(
        &self,
        command: &str,
        options: SqlToHandleOptions,
    ) -> DdfResult<Arc<DataHandle>>;

    /// Like `sql_with`, with cells coerced to their column types.
    async fn sql_typed_with(&self, command: &str, options: SqlOptions) -> DdfResult<SqlTypedResult> {
        let result = self.sql_with(command, options).await?;
        Ok(SqlTypedResult::new(result))
    }

    // ---- handle creation ----

    /// Construct and cache a handle from an explicit argument list, using
    /// the handle implementation configured for this engine type.
    fn construct_handle(&self, args: HandleArgs) -> DdfResult<Arc<DataHandle>> {
        let core = self.core();
        let implementation = core.config().implementation(core.engine_type(), KEY_HANDLE)?;
        let handle = core
            .handle_factory()
            .construct(core.engine_type(), implementation, &args)?;

        let handle = Arc::new(handle);
        self.add_handle(handle.clone())?;
        Ok(handle)
    }

    /// Create a handle from free-form options.
    async fn create_handle(&self, options: HashMap<String, String>) -> DdfResult<Arc<DataHandle>> {
        self.construct_handle(HandleArgs::new().manager(self.identity()).options(options))
    }

    // ---- ingestion ----

    /// Load a delimited file; every record is data.
    async fn load_file(&self, url: &str, separator: &str) -> DdfResult<Arc<DataHandle>>;

    /// Load a delimited table whose first record names the columns.
    async fn load_table(&self, url: &str, separator: &str) -> DdfResult<Arc<DataHandle>>;

    /// Write a result set into a new table of this engine and return its handle.
    async fn materialize(
        &self,
        name: Option<&str>,
        result: SqlResult,
        schema: Option<Schema>,
    ) -> DdfResult<Arc<DataHandle>>;

    // ---- persistence ----

    async fn load(&self, namespace: &str, name: &str) -> DdfResult<Persistible> {
        persistence::load(self, namespace, name).await
    }

    async fn load_uri(&self, uri: &str) -> DdfResult<Persistible> {
        persistence::load_uri(self, uri).await
    }

    async fn unpersist(&self, namespace: &str, name: &str) -> DdfResult<()> {
        persistence::unpersist(self, namespace, name).await
    }

    async fn get_or_restore_handle(&self, id: Uuid) -> DdfResult<Arc<DataHandle>> {
        persistence::get_or_restore(self, id).await
    }

    async fn get_or_restore_handle_uri(&self, uri: &str) -> DdfResult<Arc<DataHandle>> {
        persistence::get_or_restore_uri(self, uri).await
    }

    // ---- export ----

    async fn export(
        &self,
        source: ExportSource,
        url: &str,
        separator: &str,
        has_header: bool,
    ) -> DdfResult<()> {
        export::export(self, source, url, separator, has_header).await
    }

    // ---- copy / transfer ----

    /// Duplicate a handle of this engine under a new name.
    async fn copy_from(&self, handle: &DataHandle, target_name: &str) -> DdfResult<Arc<DataHandle>> {
        transfer::copy_within(self, handle, target_name).await
    }

    /// Copy the handle named `source_name` of another Manager into this one.
    async fn copy_from_manager(
        &self,
        other: &dyn Manager,
        source_name: &str,
        target_name: &str,
    ) -> DdfResult<Arc<DataHandle>> {
        transfer::copy_across(self, other, source_name, target_name).await
    }

    /// Pull the data `source` names on engine `from_engine` into this engine.
    /// `source` is `<from_engine>://<handle id or table>`.
    async fn transfer(&self, from_engine: &str, source: &str) -> DdfResult<Arc<DataHandle>> {
        let source = TransferSource::parse(from_engine, source)?;
        transfer::pull(self, from_engine, source).await
    }

    async fn transfer_by_table(&self, from_engine: &str, table: &str) -> DdfResult<Arc<DataHandle>> {
        transfer::pull(self, from_engine, TransferSource::Table(table.to_string())).await
    }

    /// Best effort; never fails.
    async fn drop_if_exists(&self, table: &str) -> bool {
        let command = format!("DROP TABLE IF EXISTS {}", table);
        match self.sql_with(&command, SqlOptions::default()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("{}: failed to drop {}: {}", self.engine_name(), table, e);
                false
            }
        }
    }

    // ---- handle set ----

    /// Cache a handle owned by this engine.
    fn add_handle(&self, handle: Arc<DataHandle>) -> DdfResult<Uuid> {
        let engine_name = self.core().engine_name();
        if handle.engine_name() != engine_name {
            return Err(DdfError::InvalidArgument(format!(
                "Handle belongs to engine {}, not {}",
                handle.engine_name(),
                engine_name
            )));
        }
        self.core().handles().add(handle)
    }

    /// Invalidate a handle's representations and drop it from the cache.
    fn remove_handle(&self, handle: &DataHandle) -> DdfResult<()> {
        handle.representations().uncache_all();
        handle.representations().reset();
        self.core().handles().remove(handle)?;
        Ok(())
    }

    fn list_handles(&self) -> Vec<Arc<DataHandle>> {
        self.core().handles().list()
    }

    fn get_handle(&self, id: Uuid) -> DdfResult<Arc<DataHandle>> {
        self.core().handles().get(id)
    }

    fn get_handle_by_name(&self, name: &str) -> DdfResult<Arc<DataHandle>> {
        self.core().handles().get_by_name(name)
    }

    fn rename_handle(&self, handle: &DataHandle, new_name: &str) -> DdfResult<()> {
        self.core().handles().rename(handle, new_name)
    }

    fn reassign_identifier(&self, handle: &DataHandle, new_id: Uuid) -> DdfResult<()> {
        self.core().handles().reassign_identifier(handle, new_id)
    }

    // ---- models ----

    fn add_model(&self, model: Arc<dyn Model>) {
        self.core().models().add(model);
    }

    fn get_model(&self, name: &str) -> Option<Arc<dyn Model>> {
        self.core().models().get(name)
    }
}
