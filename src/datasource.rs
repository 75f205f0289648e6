//! Data source descriptors and engine type definitions.
//!
//! This module contains:
//! - `EngineType` - Enum of supported engine families
//! - `DataFormat` - Format tag of the underlying data
//! - `SourceParams` - Engine-specific connection parameters
//! - `DataSourceDescriptor` - Immutable description of a data source

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{DdfError, DdfResult};

/// Supported engine families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    /// Distributed compute cluster
    #[default]
    Spark,
    Flink,
    /// Any JDBC-reachable database
    Jdbc,
    Postgres,
    Redshift,
    /// Hive-style warehouse
    Hive,
    Sfdc,
    /// Object store file sets
    S3,
    /// Local file sets
    File,
    Basic,
}

impl EngineType {
    /// Get all engine types
    pub fn all() -> Vec<EngineType> {
        vec![
            Self::Spark,
            Self::Flink,
            Self::Jdbc,
            Self::Postgres,
            Self::Redshift,
            Self::Hive,
            Self::Sfdc,
            Self::S3,
            Self::File,
            Self::Basic,
        ]
    }

    /// Lower-case tag used in configuration sections and URIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spark => "spark",
            Self::Flink => "flink",
            Self::Jdbc => "jdbc",
            Self::Postgres => "postgres",
            Self::Redshift => "redshift",
            Self::Hive => "hive",
            Self::Sfdc => "sfdc",
            Self::S3 => "s3",
            Self::File => "file",
            Self::Basic => "basic",
        }
    }

    /// Parse an engine type tag, ignoring case
    pub fn parse(s: &str) -> DdfResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "spark" => Ok(Self::Spark),
            "flink" => Ok(Self::Flink),
            "jdbc" => Ok(Self::Jdbc),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "redshift" => Ok(Self::Redshift),
            "hive" | "warehouse" => Ok(Self::Hive),
            "sfdc" => Ok(Self::Sfdc),
            "s3" | "aws" | "objectstore" | "object-store" => Ok(Self::S3),
            "file" | "fs" => Ok(Self::File),
            "basic" => Ok(Self::Basic),
            other => Err(DdfError::UnknownEngineType(other.to_string())),
        }
    }

    /// Engines whose data is a set of files rather than a SQL server
    pub fn is_file_based(&self) -> bool {
        matches!(self, Self::S3 | Self::File)
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EngineType {
    type Err = DdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Format tag of the data behind a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Sql,
    Csv,
    Tsv,
    Json,
    Parquet,
    Avro,
    Orc,
}

impl DataFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sql" => Some(Self::Sql),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "parquet" => Some(Self::Parquet),
            "avro" => Some(Self::Avro),
            "orc" => Some(Self::Orc),
            _ => None,
        }
    }

    /// Default field separator for delimited formats
    pub fn field_separator(&self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            _ => None,
        }
    }
}

/// Connection parameters for the different engine families.
///
/// These are opaque to the coordinator; each manager implementation
/// interprets the variant it understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceParams {
    /// Server-based engines (JDBC, Postgres, Spark thrift server)
    Server {
        /// Connection URL, e.g. `jdbc:postgresql://host:5432/db`
        url: String,
        #[serde(default)]
        username: Option<String>,
        /// Password (never serialized)
        #[serde(skip_serializing, default)]
        password: Option<String>,
        #[serde(default)]
        extra_options: HashMap<String, String>,
    },

    /// Local database or directory
    File {
        path: PathBuf,
        #[serde(default)]
        read_only: bool,
        #[serde(default)]
        extra_options: HashMap<String, String>,
    },

    /// Object store bucket
    ObjectStore {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        root: Option<String>,
        #[serde(default)]
        extra_options: HashMap<String, String>,
    },

    /// In-memory engines
    InMemory {
        #[serde(default)]
        extra_options: HashMap<String, String>,
    },
}

impl SourceParams {
    pub fn server(url: impl Into<String>) -> Self {
        Self::Server {
            url: url.into(),
            username: None,
            password: None,
            extra_options: HashMap::new(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, read_only: bool) -> Self {
        Self::File {
            path: path.into(),
            read_only,
            extra_options: HashMap::new(),
        }
    }

    pub fn object_store(bucket: impl Into<String>, region: Option<String>) -> Self {
        Self::ObjectStore {
            bucket: bucket.into(),
            region,
            endpoint: None,
            root: None,
            extra_options: HashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::InMemory {
            extra_options: HashMap::new(),
        }
    }

    /// Driver-specific options of any variant
    pub fn extra_options(&self) -> &HashMap<String, String> {
        match self {
            Self::Server { extra_options, .. }
            | Self::File { extra_options, .. }
            | Self::ObjectStore { extra_options, .. }
            | Self::InMemory { extra_options } => extra_options,
        }
    }

    /// Get the file path if this is a file source
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::File { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        match self {
            Self::File { read_only, .. } => *read_only,
            _ => false,
        }
    }
}

impl Default for SourceParams {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Immutable description of a data source.
///
/// Used both to construct managers and to scope a single SQL call
/// without switching managers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Engine family this source belongs to
    pub engine_type: EngineType,
    /// When set, table identifiers in a command name handles, not backend tables
    #[serde(default)]
    pub query_on_handles: Option<bool>,
    /// Format of the underlying data
    #[serde(default)]
    pub format: Option<DataFormat>,
    /// Connection parameters
    #[serde(default)]
    pub params: SourceParams,
}

impl DataSourceDescriptor {
    pub fn new(engine_type: EngineType, params: SourceParams) -> Self {
        Self {
            engine_type,
            query_on_handles: None,
            format: None,
            params,
        }
    }

    /// Descriptor that only carries the handle-scoping flag.
    pub fn scoped(engine_type: EngineType, query_on_handles: bool) -> Self {
        Self {
            engine_type,
            query_on_handles: Some(query_on_handles),
            format: None,
            params: SourceParams::default(),
        }
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_query_on_handles(mut self, query_on_handles: bool) -> Self {
        self.query_on_handles = Some(query_on_handles);
        self
    }

    pub fn is_query_on_handles(&self) -> bool {
        self.query_on_handles.unwrap_or(false)
    }

    /// Validate that the params match the engine type
    pub fn validate(&self) -> DdfResult<()> {
        match (&self.engine_type, &self.params) {
            (EngineType::S3, SourceParams::ObjectStore { bucket, .. }) if bucket.is_empty() => Err(
                DdfError::Config("S3 bucket name is required".to_string()),
            ),
            (EngineType::S3, SourceParams::Server { .. } | SourceParams::File { .. }) => Err(
                DdfError::Config("s3 requires object store parameters".to_string()),
            ),
            (EngineType::File, SourceParams::Server { .. } | SourceParams::ObjectStore { .. }) => {
                Err(DdfError::Config(
                    "file requires file or in-memory parameters".to_string(),
                ))
            }
            (
                EngineType::Jdbc | EngineType::Postgres | EngineType::Redshift,
                SourceParams::ObjectStore { .. },
            ) => Err(DdfError::Config(format!(
                "{} cannot be backed by an object store",
                self.engine_type
            ))),
            _ => Ok(()),
        }
    }
}
