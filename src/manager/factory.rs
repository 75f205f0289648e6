//! Manager factory.
//!
//! The configuration names a Manager implementation per engine type
//! (`manager` key). The factory keeps a registration table from those names
//! to constructor functions, filled at startup by each backend module.

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Manager, ManagerContext};
use crate::config::{EngineConfig, KEY_MANAGER};
use crate::datasource::{DataSourceDescriptor, EngineType};
use crate::error::{DdfError, DdfResult};
use crate::handle::HandleFactory;

/// Builds a Manager from its context.
pub type ManagerConstructor =
    Arc<dyn Fn(ManagerContext) -> Result<Arc<dyn Manager>> + Send + Sync>;

/// Factory for creating Managers based on configuration.
///
/// # Example
///
/// ```ignore
/// use ddf::config::EngineConfig;
/// use ddf::datasource::{DataSourceDescriptor, EngineType, SourceParams};
/// use ddf::manager::ManagerFactory;
///
/// let factory = ManagerFactory::with_builtin(EngineConfig::builtin());
/// let descriptor = DataSourceDescriptor::new(EngineType::Jdbc, SourceParams::in_memory());
/// let manager = factory.create(EngineType::Jdbc, descriptor)?;
/// ```
pub struct ManagerFactory {
    config: Arc<EngineConfig>,
    handle_factory: Arc<HandleFactory>,
    constructors: RwLock<HashMap<String, ManagerConstructor>>,
}

impl ManagerFactory {
    /// Factory with an empty registration table.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            handle_factory: Arc::new(HandleFactory::new()),
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Factory with the built-in backends registered.
    pub fn with_builtin(config: EngineConfig) -> Self {
        let factory = Self::new(config);
        crate::backends::register_builtin(&factory);
        factory
    }

    pub fn register(
        &self,
        implementation: impl Into<String>,
        constructor: impl Fn(ManagerContext) -> Result<Arc<dyn Manager>> + Send + Sync + 'static,
    ) {
        let implementation = implementation.into();
        tracing::debug!("Registered manager implementation {}", implementation);
        self.constructors
            .write()
            .insert(implementation, Arc::new(constructor));
    }

    pub fn is_supported(&self, implementation: &str) -> bool {
        self.constructors.read().contains_key(implementation)
    }

    /// Registered implementation names, sorted.
    pub fn implementations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn handle_factory(&self) -> &Arc<HandleFactory> {
        &self.handle_factory
    }

    /// Create a Manager for `engine_type`, injecting `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No implementation is configured for the engine type (checked before
    ///   anything is constructed)
    /// - The configured implementation has no registered constructor
    /// - The constructor fails
    pub fn create(
        &self,
        engine_type: EngineType,
        descriptor: DataSourceDescriptor,
    ) -> DdfResult<Arc<dyn Manager>> {
        self.build(engine_type, Some(descriptor))
    }

    /// Zero-argument path for Managers that configure themselves.
    pub fn create_default(&self, engine_type: EngineType) -> DdfResult<Arc<dyn Manager>> {
        self.build(engine_type, None)
    }

    fn build(
        &self,
        engine_type: EngineType,
        descriptor: Option<DataSourceDescriptor>,
    ) -> DdfResult<Arc<dyn Manager>> {
        let implementation = self.config.implementation(engine_type, KEY_MANAGER)?;
        let args = if descriptor.is_some() {
            "[DataSourceDescriptor, EngineType]"
        } else {
            "[]"
        };
        let construction_error = |message: String, source: Option<anyhow::Error>| {
            DdfError::Construction {
                engine_type: engine_type.to_string(),
                kind: "manager",
                implementation: implementation.to_string(),
                args: args.to_string(),
                message,
                source: source.map(Into::into),
            }
        };

        let constructor = self
            .constructors
            .read()
            .get(implementation)
            .cloned()
            .ok_or_else(|| construction_error("no constructor registered".to_string(), None))?;

        let context = ManagerContext {
            engine_type,
            descriptor,
            config: self.config.clone(),
            handle_factory: self.handle_factory.clone(),
        };

        let manager = constructor(context)
            .and_then(|manager| {
                if manager.engine_type() == engine_type {
                    Ok(manager)
                } else {
                    Err(anyhow!(
                        "constructed a {} manager for a {} engine",
                        manager.engine_type(),
                        engine_type
                    ))
                }
            })
            .map_err(|e| construction_error(e.to_string(), Some(e)))?;

        tracing::info!(
            "Created {} manager of implementation {}",
            engine_type,
            implementation
        );
        Ok(manager)
    }
}
