//! Source-bound Manager decorator.
//!
//! A `DelegatingManager` shares the backend, handle cache and models of the
//! Manager it wraps but registers under its own engine name. Handles it
//! creates default to its bound source URI.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    ExportSource, Manager, ManagerCore, Persistible, SqlOptions, SqlToHandleOptions,
};
use crate::content::{Schema, SqlResult, SqlTypedResult};
use crate::coordinator::CoordinatorRef;
use crate::error::DdfResult;
use crate::handle::{DataHandle, HandleArgs, ManagerIdentity, SOURCE_URI_OPTION};

pub struct DelegatingManager {
    inner: Arc<dyn Manager>,
    source_uri: String,
    engine_name: RwLock<Option<String>>,
}

impl DelegatingManager {
    pub fn new(inner: Arc<dyn Manager>, source_uri: impl Into<String>) -> Self {
        Self {
            inner,
            source_uri: source_uri.into(),
            engine_name: RwLock::new(None),
        }
    }

    pub fn inner(&self) -> &Arc<dyn Manager> {
        &self.inner
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }
}

#[async_trait]
impl Manager for DelegatingManager {
    fn core(&self) -> &ManagerCore {
        self.inner.core()
    }

    /// Own bound name, or `<inner>@<source uri>` before registration.
    fn engine_name(&self) -> String {
        self.engine_name
            .read()
            .clone()
            .unwrap_or_else(|| format!("{}@{}", self.inner.engine_name(), self.source_uri))
    }

    /// Handles are owned by the wrapped Manager.
    fn identity(&self) -> ManagerIdentity {
        self.inner.identity()
    }

    fn bind(&self, engine_name: &str, coordinator: CoordinatorRef) {
        *self.engine_name.write() = Some(engine_name.to_string());
        // An unregistered inner Manager still needs a coordinator to transfer.
        self.inner.core().attach_coordinator(coordinator);
    }

    // The wrapped Manager owns the backend lifecycle.
    async fn startup(&self) -> DdfResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> DdfResult<()> {
        Ok(())
    }

    async fn sql_with(&self, command: &str, options: SqlOptions) -> DdfResult<SqlResult> {
        self.inner.sql_with(command, options).await
    }

    async fn sql_to_handle_with(
        &self,
        command: &str,
        options: SqlToHandleOptions,
    ) -> DdfResult<Arc<DataHandle>> {
        self.inner.sql_to_handle_with(command, options).await
    }

    async fn sql_typed_with(&self, command: &str, options: SqlOptions) -> DdfResult<SqlTypedResult> {
        self.inner.sql_typed_with(command, options).await
    }

    fn construct_handle(&self, args: HandleArgs) -> DdfResult<Arc<DataHandle>> {
        self.inner.construct_handle(args)
    }

    async fn create_handle(
        &self,
        mut options: HashMap<String, String>,
    ) -> DdfResult<Arc<DataHandle>> {
        options.insert(SOURCE_URI_OPTION.to_string(), self.source_uri.clone());
        self.inner.create_handle(options).await
    }

    async fn load_file(&self, url: &str, separator: &str) -> DdfResult<Arc<DataHandle>> {
        self.inner.load_file(url, separator).await
    }

    async fn load_table(&self, url: &str, separator: &str) -> DdfResult<Arc<DataHandle>> {
        self.inner.load_table(url, separator).await
    }

    async fn materialize(
        &self,
        name: Option<&str>,
        result: SqlResult,
        schema: Option<Schema>,
    ) -> DdfResult<Arc<DataHandle>> {
        self.inner.materialize(name, result, schema).await
    }

    async fn load(&self, namespace: &str, name: &str) -> DdfResult<Persistible> {
        self.inner.load(namespace, name).await
    }

    async fn load_uri(&self, uri: &str) -> DdfResult<Persistible> {
        self.inner.load_uri(uri).await
    }

    async fn unpersist(&self, namespace: &str, name: &str) -> DdfResult<()> {
        self.inner.unpersist(namespace, name).await
    }

    async fn get_or_restore_handle(&self, id: Uuid) -> DdfResult<Arc<DataHandle>> {
        self.inner.get_or_restore_handle(id).await
    }

    async fn get_or_restore_handle_uri(&self, uri: &str) -> DdfResult<Arc<DataHandle>> {
        self.inner.get_or_restore_handle_uri(uri).await
    }

    async fn export(
        &self,
        source: ExportSource,
        url: &str,
        separator: &str,
        has_header: bool,
    ) -> DdfResult<()> {
        self.inner.export(source, url, separator, has_header).await
    }

    async fn copy_from(&self, handle: &DataHandle, target_name: &str) -> DdfResult<Arc<DataHandle>> {
        self.inner.copy_from(handle, target_name).await
    }

    async fn copy_from_manager(
        &self,
        other: &dyn Manager,
        source_name: &str,
        target_name: &str,
    ) -> DdfResult<Arc<DataHandle>> {
        self.inner
            .copy_from_manager(other, source_name, target_name)
            .await
    }

    async fn transfer(&self, from_engine: &str, source: &str) -> DdfResult<Arc<DataHandle>> {
        self.inner.transfer(from_engine, source).await
    }

    async fn transfer_by_table(&self, from_engine: &str, table: &str) -> DdfResult<Arc<DataHandle>> {
        self.inner.transfer_by_table(from_engine, table).await
    }

    async fn drop_if_exists(&self, table: &str) -> bool {
        self.inner.drop_if_exists(table).await
    }

    fn add_handle(&self, handle: Arc<DataHandle>) -> DdfResult<Uuid> {
        self.inner.add_handle(handle)
    }

    fn remove_handle(&self, handle: &DataHandle) -> DdfResult<()> {
        self.inner.remove_handle(handle)
    }
}
