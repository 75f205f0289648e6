//! Trained models registered with a Manager.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A trained model. Its representation is opaque to the coordinator.
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Name → model map; adding under an existing name replaces the model.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<dyn Model>>>,
}

impl ModelRegistry {
    pub fn add(&self, model: Arc<dyn Model>) {
        let name = model.name().to_string();
        if self.models.write().insert(name.clone(), model).is_some() {
            tracing::debug!("Replaced model {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Model>> {
        self.models.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Model>> {
        self.models.write().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }
}
