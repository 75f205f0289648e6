//! Distributed data handles.
//!
//! A [`DataHandle`] names one dataset living on exactly one engine. Handles
//! are shared as `Arc<DataHandle>`; the identifier and name sit behind
//! locks so the owning [`HandleCache`] can rename or re-identify a handle
//! in place.
//!
//! - **Args** (`args`): explicit constructor argument lists
//! - **Cache** (`cache`): per-engine identifier/name registry
//! - **Factory** (`factory`): constructor registration table
//! - **Model** (`model`): trained-model registry

pub mod args;
pub mod cache;
pub mod factory;
pub mod model;

pub use args::{ArgKind, HandleArg, HandleArgs, ManagerIdentity, RawData};
pub use cache::HandleCache;
pub use factory::{HandleConstructor, HandleFactory, DEFAULT_HANDLE_CONSTRUCTOR};
pub use model::{Model, ModelRegistry};

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::content::Schema;
use crate::datasource::EngineType;

/// Option key carrying the default source of a handle.
pub const SOURCE_URI_OPTION: &str = "sourceUri";

/// Materialised representations of a handle, keyed by representation type.
#[derive(Default)]
pub struct RepresentationCache {
    entries: Mutex<HashMap<String, RawData>>,
    default_key: Mutex<Option<String>>,
}

impl RepresentationCache {
    pub fn get(&self, key: &str) -> Option<RawData> {
        self.entries.lock().get(key).cloned()
    }

    /// Cache a representation. The first one cached becomes the default.
    pub fn put(&self, key: impl Into<String>, data: RawData) {
        let key = key.into();
        let mut default_key = self.default_key.lock();
        if default_key.is_none() {
            *default_key = Some(key.clone());
        }
        self.entries.lock().insert(key, data);
    }

    pub fn default_representation(&self) -> Option<RawData> {
        let key = self.default_key.lock().clone()?;
        self.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every cached representation.
    pub fn uncache_all(&self) {
        self.entries.lock().clear();
    }

    /// Forget the default representation.
    pub fn reset(&self) {
        *self.default_key.lock() = None;
    }
}

/// One dataset instance owned by one engine.
pub struct DataHandle {
    id: RwLock<Option<Uuid>>,
    name: RwLock<Option<String>>,
    engine_name: String,
    engine_type: EngineType,
    table_name: Option<String>,
    schema: RwLock<Option<Schema>>,
    data: Option<RawData>,
    type_specs: Vec<String>,
    options: HashMap<String, String>,
    persistable: bool,
    representations: RepresentationCache,
}

impl DataHandle {
    /// A bare handle for `engine_name`; fill it in with the `with_*` setters.
    pub fn new(engine_name: impl Into<String>, engine_type: EngineType) -> Self {
        Self {
            id: RwLock::new(None),
            name: RwLock::new(None),
            engine_name: engine_name.into(),
            engine_type,
            table_name: None,
            schema: RwLock::new(None),
            data: None,
            type_specs: Vec::new(),
            options: HashMap::new(),
            persistable: true,
            representations: RepresentationCache::default(),
        }
    }

    pub fn with_id(self, id: Uuid) -> Self {
        *self.id.write() = Some(id);
        self
    }

    pub fn with_name(self, name: Option<String>) -> Self {
        *self.name.write() = name.filter(|n| !n.is_empty());
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_schema(self, schema: Option<Schema>) -> Self {
        *self.schema.write() = schema;
        self
    }

    pub fn with_data(mut self, data: RawData, type_specs: Vec<String>) -> Self {
        self.data = Some(data);
        self.type_specs = type_specs;
        self
    }

    pub fn with_options(mut self, options: HashMap<String, String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_persistable(mut self, persistable: bool) -> Self {
        self.persistable = persistable;
        self
    }

    /// Identifier, unset until the handle is cached.
    pub fn id(&self) -> Option<Uuid> {
        *self.id.read()
    }

    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    /// Table backing this handle in its engine, falling back to the
    /// schema's table name.
    pub fn table_name(&self) -> Option<String> {
        self.table_name
            .clone()
            .or_else(|| self.schema.read().as_ref().and_then(|s| s.table_name.clone()))
    }

    pub fn schema(&self) -> Option<Schema> {
        self.schema.read().clone()
    }

    pub fn set_schema(&self, schema: Option<Schema>) {
        *self.schema.write() = schema;
    }

    pub fn data(&self) -> Option<&RawData> {
        self.data.as_ref()
    }

    pub fn type_specs(&self) -> &[String] {
        &self.type_specs
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    pub fn source_uri(&self) -> Option<&str> {
        self.options.get(SOURCE_URI_OPTION).map(String::as_str)
    }

    pub fn is_persistable(&self) -> bool {
        self.persistable
    }

    pub fn representations(&self) -> &RepresentationCache {
        &self.representations
    }

    /// `<engine>://<id>`, the URI a handle can be restored from.
    pub fn uri(&self) -> Option<String> {
        self.id().map(|id| format!("{}://{}", self.engine_name, id))
    }

    // Only the owning cache changes identity, while holding its write lock.
    pub(crate) fn set_id(&self, id: Uuid) {
        *self.id.write() = Some(id);
    }

    pub(crate) fn set_name(&self, name: Option<String>) {
        *self.name.write() = name;
    }
}

impl fmt::Debug for DataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("engine_name", &self.engine_name)
            .field("engine_type", &self.engine_type)
            .field("table_name", &self.table_name)
            .field("has_data", &self.data.is_some())
            .field("persistable", &self.persistable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_handle_builder() {
        let handle = DataHandle::new("e1", EngineType::Jdbc)
            .with_name(Some("t1".to_string()))
            .with_schema(Some(Schema::parse("id int").with_table_name("ddf_t1")));

        assert_eq!(handle.id(), None);
        assert_eq!(handle.name(), Some("t1".to_string()));
        assert_eq!(handle.table_name(), Some("ddf_t1".to_string()));
        assert_eq!(handle.engine_name(), "e1");
        assert!(handle.uri().is_none());
    }

    #[test]
    fn test_empty_name_is_unnamed() {
        let handle = DataHandle::new("e1", EngineType::Jdbc).with_name(Some(String::new()));
        assert_eq!(handle.name(), None);
    }

    #[test]
    fn test_uri_uses_engine_and_id() {
        let id = Uuid::new_v4();
        let handle = DataHandle::new("e2", EngineType::File).with_id(id);
        assert_eq!(handle.uri(), Some(format!("e2://{}", id)));
    }

    #[test]
    fn test_representation_cache() {
        let cache = RepresentationCache::default();
        cache.put("rows", Arc::new(vec![1, 2, 3]));
        cache.put("count", Arc::new(3usize));
        assert_eq!(cache.len(), 2);
        assert!(cache.default_representation().is_some());

        cache.uncache_all();
        assert!(cache.is_empty());
        assert!(cache.default_representation().is_none());

        cache.reset();
        cache.put("count", Arc::new(3usize));
        let default = cache.default_representation().unwrap();
        assert_eq!(default.downcast_ref::<usize>(), Some(&3));
    }
}
