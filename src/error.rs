//! Error type shared by every layer of the coordinator.
//!
//! Backend drivers and manager constructors are written against
//! `anyhow::Result`; their failures are wrapped here with the cause kept as
//! the error source.

use uuid::Uuid;

/// Boxed cause carried by wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type DdfResult<T> = Result<T, DdfError>;

#[derive(Debug, thiserror::Error)]
pub enum DdfError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("This engine name is already used: {0}")]
    DuplicateEngine(String),

    #[error("There is no engine with name: {0}")]
    UnknownEngine(String),

    #[error("No default engine specified, please specify the default engine or pass the engine name")]
    NoDefaultEngine,

    #[error("Engine {engine} is wrapped by delegating engines {delegates:?}; unregister them first")]
    EngineInUse {
        engine: String,
        delegates: Vec<String>,
    },

    #[error("Unknown engine type: {0}")]
    UnknownEngineType(String),

    #[error("No implementation configured for key '{key}' of engine type {engine_type}")]
    MissingImplementation { engine_type: String, key: String },

    #[error(
        "While instantiating a new {engine_type} {kind} of implementation '{implementation}' with argument shapes {args}: {message}"
    )]
    Construction {
        engine_type: String,
        kind: &'static str,
        implementation: String,
        args: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Cannot find handle with id {0}")]
    HandleNotFoundById(Uuid),

    #[error("Cannot find handle with name {0}")]
    HandleNotFoundByName(String),

    #[error("Handle with name {0} already exists")]
    DuplicateHandleName(String),

    #[error("Engine {engine} failed to {operation}: {source}")]
    Backend {
        engine: String,
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Engine {engine} does not support {operation}")]
    Unsupported { engine: String, operation: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DdfError {
    /// Wrap a backend failure, keeping it as the error source.
    pub fn backend(
        engine: impl Into<String>,
        operation: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        DdfError::Backend {
            engine: engine.into(),
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn unsupported(engine: impl Into<String>, operation: impl Into<String>) -> Self {
        DdfError::Unsupported {
            engine: engine.into(),
            operation: operation.into(),
        }
    }

    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        DdfError::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// True for the lookup failures a caller may want to recover from.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DdfError::UnknownEngine(_)
                | DdfError::HandleNotFoundById(_)
                | DdfError::HandleNotFoundByName(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_backend_error_keeps_cause() {
        let err = DdfError::backend("e1", "run sql", anyhow::anyhow!("no such table: t"));
        assert!(err.to_string().contains("e1"));
        assert_eq!(err.source().unwrap().to_string(), "no such table: t");
    }

    #[test]
    fn test_no_default_distinct_from_unknown_engine() {
        let unknown = DdfError::UnknownEngine("x".to_string());
        assert!(unknown.is_not_found());
        assert!(!DdfError::NoDefaultEngine.is_not_found());
        assert_ne!(unknown.to_string(), DdfError::NoDefaultEngine.to_string());
    }

    #[test]
    fn test_construction_message_lists_arguments() {
        let err = DdfError::Construction {
            engine_type: "jdbc".to_string(),
            kind: "manager",
            implementation: "sqlite".to_string(),
            args: "[DataSourceDescriptor, EngineType]".to_string(),
            message: "bad params".to_string(),
            source: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("sqlite"));
        assert!(msg.contains("jdbc"));
        assert!(msg.contains("[DataSourceDescriptor, EngineType]"));
    }
}
