//! Handle constructor registration table.
//!
//! Each engine type names its handle implementation in the configuration
//! (`handle` key). The factory maps that name to a constructor together
//! with the argument shapes the constructor accepts.

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::args::{describe_shape, ArgKind, HandleArgs};
use super::DataHandle;
use crate::datasource::EngineType;
use crate::error::{DdfError, DdfResult};

/// Name of the built-in handle constructor.
pub const DEFAULT_HANDLE_CONSTRUCTOR: &str = "default";

type BuildFn = dyn Fn(&HandleArgs) -> Result<DataHandle> + Send + Sync;

/// A constructor and the argument shapes it accepts.
#[derive(Clone)]
pub struct HandleConstructor {
    signatures: Vec<Vec<ArgKind>>,
    build: Arc<BuildFn>,
}

impl HandleConstructor {
    pub fn new(
        signatures: Vec<Vec<ArgKind>>,
        build: impl Fn(&HandleArgs) -> Result<DataHandle> + Send + Sync + 'static,
    ) -> Self {
        Self {
            signatures,
            build: Arc::new(build),
        }
    }

    pub fn accepts(&self, shape: &[ArgKind]) -> bool {
        self.signatures.iter().any(|s| s.as_slice() == shape)
    }

    pub fn signatures(&self) -> &[Vec<ArgKind>] {
        &self.signatures
    }
}

/// The built-in constructor: every shape the Managers in this crate use.
pub fn default_constructor() -> HandleConstructor {
    use ArgKind::*;

    HandleConstructor::new(
        vec![
            vec![Manager],
            vec![Manager, Data, TypeSpecs, Name, Schema],
            vec![Manager, Table, Name, Schema],
            vec![Manager, Options],
        ],
        build_default,
    )
}

fn build_default(args: &HandleArgs) -> Result<DataHandle> {
    let identity = args
        .manager_identity()
        .ok_or_else(|| anyhow!("A handle needs an owning manager"))?;

    let mut handle = DataHandle::new(identity.engine_name.clone(), identity.engine_type)
        .with_name(args.handle_name().map(String::from))
        .with_schema(args.handle_schema().cloned());

    if let Some(table) = args.table_name() {
        if table.is_empty() {
            return Err(anyhow!("Backing table name cannot be empty"));
        }
        handle = handle.with_table_name(table);
    }
    if let Some(data) = args.raw_data() {
        let specs = args.type_spec_list().map(<[String]>::to_vec).unwrap_or_default();
        handle = handle.with_data(data.clone(), specs);
    }
    if let Some(options) = args.option_map() {
        handle = handle.with_options(options.clone());
    }
    // Handles with nothing behind them yet cannot be persisted.
    if args.len() == 1 {
        handle = handle.with_persistable(false);
    }

    Ok(handle)
}

pub struct HandleFactory {
    constructors: RwLock<HashMap<String, HandleConstructor>>,
}

impl HandleFactory {
    /// Factory with no constructors.
    pub fn empty() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Factory with the built-in `default` constructor registered.
    pub fn new() -> Self {
        let factory = Self::empty();
        factory.register(DEFAULT_HANDLE_CONSTRUCTOR, default_constructor());
        factory
    }

    pub fn register(&self, implementation: impl Into<String>, constructor: HandleConstructor) {
        self.constructors
            .write()
            .insert(implementation.into(), constructor);
    }

    pub fn is_supported(&self, implementation: &str) -> bool {
        self.constructors.read().contains_key(implementation)
    }

    /// Construct a handle with the named implementation.
    pub fn construct(
        &self,
        engine_type: EngineType,
        implementation: &str,
        args: &HandleArgs,
    ) -> DdfResult<DataHandle> {
        let construction_error = |message: String, source: Option<anyhow::Error>| {
            DdfError::Construction {
                engine_type: engine_type.to_string(),
                kind: "handle",
                implementation: implementation.to_string(),
                args: args.describe(),
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

        let shape = args.shape();
        if !constructor.accepts(&shape) {
            let accepted: Vec<String> = constructor
                .signatures()
                .iter()
                .map(|s| describe_shape(s))
                .collect();
            return Err(construction_error(
                format!("no constructor accepting this shape, expected one of {}", accepted.join(" ")),
                None,
            ));
        }

        (constructor.build)(args).map_err(|e| construction_error(e.to_string(), Some(e)))
    }
}

impl Default for HandleFactory {
    fn default() -> Self {
        Self::new()
    }
}
