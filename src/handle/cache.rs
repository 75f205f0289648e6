//! Per-engine handle registry.
//!
//! Both indices live in one structure behind one lock: mutations take the
//! write lock for their whole check-and-update, lookups share the read lock,
//! so no reader can see a half-applied rename.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::DataHandle;
use crate::error::{DdfError, DdfResult};

#[derive(Default)]
struct Indices {
    by_id: HashMap<Uuid, Arc<DataHandle>>,
    by_name: HashMap<String, Uuid>,
    /// Insertion order, for stable listings
    order: Vec<Uuid>,
}

#[derive(Default)]
pub struct HandleCache {
    indices: RwLock<Indices>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle, assigning a fresh identifier if it has none.
    pub fn add(&self, handle: Arc<DataHandle>) -> DdfResult<Uuid> {
        self.insert(handle, None)
    }

    /// Register a handle under `id`, replacing whatever identifier it
    /// carried. The handle is never visible under another identifier.
    pub fn add_with_id(&self, handle: Arc<DataHandle>, id: Uuid) -> DdfResult<Uuid> {
        self.insert(handle, Some(id))
    }

    fn insert(&self, handle: Arc<DataHandle>, forced_id: Option<Uuid>) -> DdfResult<Uuid> {
        let mut indices = self.indices.write();

        let name = handle.name();
        if let Some(name) = &name {
            if indices.by_name.contains_key(name) {
                return Err(DdfError::DuplicateHandleName(name.clone()));
            }
        }

        let id = forced_id.or_else(|| handle.id()).unwrap_or_else(Uuid::new_v4);
        if indices.by_id.contains_key(&id) {
            return Err(DdfError::InvalidArgument(format!(
                "Handle {} is already cached",
                id
            )));
        }
        if handle.id() != Some(id) {
            handle.set_id(id);
        }

        if let Some(name) = name {
            indices.by_name.insert(name, id);
        }
        indices.by_id.insert(id, handle);
        indices.order.push(id);
        Ok(id)
    }

    /// Drop a handle from both indices.
    pub fn remove(&self, handle: &DataHandle) -> DdfResult<Arc<DataHandle>> {
        let id = handle
            .id()
            .ok_or_else(|| DdfError::InvalidArgument("Handle has no identifier".to_string()))?;
        self.remove_by_id(id)
    }

    pub fn remove_by_id(&self, id: Uuid) -> DdfResult<Arc<DataHandle>> {
        let mut indices = self.indices.write();
        let removed = indices
            .by_id
            .remove(&id)
            .ok_or(DdfError::HandleNotFoundById(id))?;
        indices.by_name.retain(|_, v| *v != id);
        indices.order.retain(|v| *v != id);
        Ok(removed)
    }

    pub fn get(&self, id: Uuid) -> DdfResult<Arc<DataHandle>> {
        self.indices
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(DdfError::HandleNotFoundById(id))
    }

    pub fn get_by_name(&self, name: &str) -> DdfResult<Arc<DataHandle>> {
        let indices = self.indices.read();
        indices
            .by_name
            .get(name)
            .and_then(|id| indices.by_id.get(id))
            .cloned()
            .ok_or_else(|| DdfError::HandleNotFoundByName(name.to_string()))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.indices.read().by_id.contains_key(&id)
    }

    /// Rename a cached handle. Fails if another handle already has the name.
    pub fn rename(&self, handle: &DataHandle, new_name: &str) -> DdfResult<()> {
        if new_name.is_empty() {
            return Err(DdfError::InvalidArgument(
                "Handle name cannot be empty".to_string(),
            ));
        }
        let id = handle
            .id()
            .ok_or_else(|| DdfError::InvalidArgument("Handle has no identifier".to_string()))?;

        let mut indices = self.indices.write();
        let cached = indices
            .by_id
            .get(&id)
            .cloned()
            .ok_or(DdfError::HandleNotFoundById(id))?;

        match indices.by_name.get(new_name) {
            Some(owner) if *owner == id => return Ok(()),
            Some(_) => return Err(DdfError::DuplicateHandleName(new_name.to_string())),
            None => {}
        }

        if let Some(old_name) = cached.name() {
            indices.by_name.remove(&old_name);
        }
        indices.by_name.insert(new_name.to_string(), id);
        cached.set_name(Some(new_name.to_string()));
        Ok(())
    }

    /// Move a cached handle to a previously known identifier.
    pub fn reassign_identifier(&self, handle: &DataHandle, new_id: Uuid) -> DdfResult<()> {
        let old_id = handle
            .id()
            .ok_or_else(|| DdfError::InvalidArgument("Handle has no identifier".to_string()))?;
        if old_id == new_id {
            return Ok(());
        }

        let mut indices = self.indices.write();
        if indices.by_id.contains_key(&new_id) {
            return Err(DdfError::InvalidArgument(format!(
                "Identifier {} is already used by another handle",
                new_id
            )));
        }
        let cached = indices
            .by_id
            .remove(&old_id)
            .ok_or(DdfError::HandleNotFoundById(old_id))?;

        for id in indices.by_name.values_mut() {
            if *id == old_id {
                *id = new_id;
            }
        }
        for id in indices.order.iter_mut() {
            if *id == old_id {
                *id = new_id;
            }
        }
        cached.set_id(new_id);
        indices.by_id.insert(new_id, cached);
        Ok(())
    }

    /// Point-in-time snapshot in insertion order.
    pub fn list(&self) -> Vec<Arc<DataHandle>> {
        let indices = self.indices.read();
        indices
            .order
            .iter()
            .filter_map(|id| indices.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.indices.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the cache, returning what it held in insertion order.
    pub fn clear(&self) -> Vec<Arc<DataHandle>> {
        let mut indices = self.indices.write();
        let Indices {
            mut by_id, order, ..
        } = std::mem::take(&mut *indices);
        order.iter().filter_map(|id| by_id.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::EngineType;

    fn handle(name: Option<&str>) -> Arc<DataHandle> {
        Arc::new(DataHandle::new("e1", EngineType::Spark).with_name(name.map(String::from)))
    }

    #[test]
    fn test_add_assigns_identifier() {
        let cache = HandleCache::new();
        let h = handle(None);
        let id = cache.add(h.clone()).unwrap();
        assert_eq!(h.id(), Some(id));
        assert!(Arc::ptr_eq(&cache.get(id).unwrap(), &h));
    }

    #[test]
    fn test_add_keeps_existing_identifier() {
        let cache = HandleCache::new();
        let id = Uuid::new_v4();
        let h = Arc::new(DataHandle::new("e1", EngineType::Spark).with_id(id));
        assert_eq!(cache.add(h).unwrap(), id);
    }

    #[test]
    fn test_add_with_id_overrides_identifier() {
        let cache = HandleCache::new();
        let stale = Uuid::new_v4();
        let wanted = Uuid::new_v4();
        let h = Arc::new(
            DataHandle::new("e1", EngineType::Spark)
                .with_id(stale)
                .with_name(Some("t1".to_string())),
        );

        assert_eq!(cache.add_with_id(h.clone(), wanted).unwrap(), wanted);
        assert_eq!(h.id(), Some(wanted));
        assert!(!cache.contains(stale));
        assert_eq!(cache.get_by_name("t1").unwrap().id(), Some(wanted));

        let other = Arc::new(DataHandle::new("e1", EngineType::Spark));
        assert!(matches!(
            cache.add_with_id(other.clone(), wanted),
            Err(DdfError::InvalidArgument(_))
        ));
        assert_eq!(other.id(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let cache = HandleCache::new();
        cache.add(handle(Some("t1"))).unwrap();
        let err = cache.add(handle(Some("t1"))).unwrap_err();
        assert!(matches!(err, DdfError::DuplicateHandleName(n) if n == "t1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lookups_fail_after_remove() {
        let cache = HandleCache::new();
        let h = handle(Some("t1"));
        let id = cache.add(h.clone()).unwrap();
        assert!(Arc::ptr_eq(&cache.get_by_name("t1").unwrap(), &h));

        cache.remove(&h).unwrap();
        assert!(matches!(cache.get(id), Err(DdfError::HandleNotFoundById(_))));
        assert!(matches!(
            cache.get_by_name("t1"),
            Err(DdfError::HandleNotFoundByName(_))
        ));
        assert!(matches!(cache.remove(&h), Err(DdfError::HandleNotFoundById(_))));
    }

    #[test]
    fn test_rename_collision_leaves_names_unchanged() {
        let cache = HandleCache::new();
        let a = handle(Some("a"));
        let b = handle(Some("b"));
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();

        assert!(matches!(
            cache.rename(&a, "b"),
            Err(DdfError::DuplicateHandleName(_))
        ));
        assert_eq!(a.name(), Some("a".to_string()));
        assert_eq!(b.name(), Some("b".to_string()));
        assert!(Arc::ptr_eq(&cache.get_by_name("a").unwrap(), &a));
        assert!(Arc::ptr_eq(&cache.get_by_name("b").unwrap(), &b));
    }

    #[test]
    fn test_rename_to_unused_name() {
        let cache = HandleCache::new();
        let a = handle(Some("a"));
        cache.add(a.clone()).unwrap();

        cache.rename(&a, "c").unwrap();
        assert_eq!(a.name(), Some("c".to_string()));
        assert!(Arc::ptr_eq(&cache.get_by_name("c").unwrap(), &a));
        assert!(cache.get_by_name("a").is_err());

        // Renaming to its own name is a no-op
        cache.rename(&a, "c").unwrap();
    }

    #[test]
    fn test_rename_unnamed_handle() {
        let cache = HandleCache::new();
        let h = handle(None);
        cache.add(h.clone()).unwrap();
        cache.rename(&h, "named").unwrap();
        assert!(Arc::ptr_eq(&cache.get_by_name("named").unwrap(), &h));
    }

    #[test]
    fn test_reassign_identifier() {
        let cache = HandleCache::new();
        let h = handle(Some("t1"));
        let old_id = cache.add(h.clone()).unwrap();
        let new_id = Uuid::new_v4();

        cache.reassign_identifier(&h, new_id).unwrap();
        assert_eq!(h.id(), Some(new_id));
        assert!(cache.get(old_id).is_err());
        assert!(Arc::ptr_eq(&cache.get(new_id).unwrap(), &h));
        assert!(Arc::ptr_eq(&cache.get_by_name("t1").unwrap(), &h));
        assert_eq!(cache.list().len(), 1);
    }

    #[test]
    fn test_reassign_to_used_identifier_fails() {
        let cache = HandleCache::new();
        let a = handle(None);
        let b = handle(None);
        cache.add(a.clone()).unwrap();
        let b_id = cache.add(b).unwrap();
        assert!(cache.reassign_identifier(&a, b_id).is_err());
        assert_ne!(a.id(), Some(b_id));
    }

    #[test]
    fn test_list_is_snapshot_in_insertion_order() {
        let cache = HandleCache::new();
        let first = handle(Some("first"));
        let second = handle(Some("second"));
        cache.add(first.clone()).unwrap();
        cache.add(second.clone()).unwrap();

        let snapshot = cache.list();
        cache.remove(&first).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(Arc::ptr_eq(&snapshot[0], &first));
        assert_eq!(cache.list().len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = HandleCache::new();
        cache.add(handle(Some("a"))).unwrap();
        cache.add(handle(None)).unwrap();
        assert_eq!(cache.clear().len(), 2);
        assert!(cache.is_empty());
        assert!(cache.get_by_name("a").is_err());
    }

    #[test]
    fn test_concurrent_adds_keep_names_unique() {
        let cache = Arc::new(HandleCache::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.add(handle(Some("shared"))).is_ok())
            })
            .collect();

        let successes = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(cache.len(), 1);
    }
}
