//! Engine configuration.
//!
//! Maps `(engine type, key)` pairs to implementation identifiers, with a
//! fallback to the `[global]` section. The file format is TOML:
//!
//! ```toml
//! [global]
//! handle = "default"
//!
//! [jdbc]
//! manager = "sqlite"
//!
//! [[engine]]
//! name = "warehouse"
//! type = "jdbc"
//! default = true
//! params = { type = "file", path = "/var/lib/ddf/warehouse.db" }
//! ```
//!
//! Supports configuration via environment variables:
//! - `DDF_CONFIG`: path of the configuration file to load

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::datasource::{DataFormat, DataSourceDescriptor, EngineType, SourceParams};
use crate::error::{DdfError, DdfResult};

/// Section consulted when an engine type has no entry of its own.
pub const GLOBAL_SECTION: &str = "global";
/// Key naming the manager implementation of an engine type.
pub const KEY_MANAGER: &str = "manager";
/// Key naming the handle constructor of an engine type.
pub const KEY_HANDLE: &str = "handle";

pub const CONFIG_ENV_VAR: &str = "DDF_CONFIG";

/// An engine the configuration asks to register at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub engine_type: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub params: SourceParams,
    #[serde(default)]
    pub format: Option<DataFormat>,
    #[serde(default)]
    pub query_on_handles: Option<bool>,
}

impl EngineDeclaration {
    /// Build the descriptor passed to the manager factory.
    pub fn descriptor(&self) -> DdfResult<(EngineType, DataSourceDescriptor)> {
        let engine_type = EngineType::parse(&self.engine_type)?;
        let mut descriptor = DataSourceDescriptor::new(engine_type, self.params.clone());
        descriptor.format = self.format;
        descriptor.query_on_handles = self.query_on_handles;
        Ok((engine_type, descriptor))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default, rename = "engine")]
    engines: Vec<EngineDeclaration>,
    #[serde(flatten)]
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

/// Lookup table of implementation identifiers per engine type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    sections: BTreeMap<String, BTreeMap<String, String>>,
    engines: Vec<EngineDeclaration>,
}

impl EngineConfig {
    /// Empty configuration: every lookup fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Configuration wired to the built-in backends.
    pub fn builtin() -> Self {
        let mut config = Self::empty();
        config.set(GLOBAL_SECTION, KEY_HANDLE, crate::handle::DEFAULT_HANDLE_CONSTRUCTOR);
        for engine_type in [EngineType::Jdbc, EngineType::Postgres, EngineType::Redshift] {
            config.set(engine_type.as_str(), KEY_MANAGER, crate::backends::SQLITE_MANAGER);
        }
        for engine_type in [EngineType::File, EngineType::S3] {
            config.set(engine_type.as_str(), KEY_MANAGER, crate::backends::FILE_MANAGER);
        }
        config
    }

    /// Parse TOML on top of the built-in defaults.
    pub fn from_toml_str(content: &str) -> DdfResult<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| DdfError::Config(format!("Failed to parse configuration: {}", e)))?;

        let mut config = Self::builtin();
        for (section, entries) in file.sections {
            for (key, value) in entries {
                config.set(&section, &key, &value);
            }
        }
        config.engines = file.engines;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> DdfResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DdfError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `DDF_CONFIG`, then the user config directory, else built-ins.
    pub fn from_env() -> DdfResult<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::builtin()),
        }
    }

    /// `<config dir>/ddf/ddf.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ddf").join("ddf.toml"))
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_lowercase())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Engine-specific value; empty strings count as absent.
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_lowercase())
            .and_then(|entries| entries.get(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Engine-specific value, falling back to the global section.
    pub fn value_with_global_default(&self, section: &str, key: &str) -> Option<&str> {
        self.value(section, key)
            .or_else(|| self.value(GLOBAL_SECTION, key))
    }

    /// Resolve an implementation identifier or fail before any construction.
    pub fn implementation(&self, engine_type: EngineType, key: &str) -> DdfResult<&str> {
        self.value_with_global_default(engine_type.as_str(), key)
            .ok_or_else(|| DdfError::MissingImplementation {
                engine_type: engine_type.to_string(),
                key: key.to_string(),
            })
    }

    pub fn engines(&self) -> &[EngineDeclaration] {
        &self.engines
    }

    pub fn add_engine(&mut self, declaration: EngineDeclaration) {
        self.engines.push(declaration);
    }
}
