//! File Manager.
//!
//! Serves `file` and `s3` engines. Delimited files under the engine root
//! are readable as tables; loaded and pulled data lives in in-memory
//! tables. The SQL surface is deliberately small:
//!
//! - `show tables`
//! - `SELECT * FROM <table> [LIMIT n]`
//! - `DROP TABLE [IF EXISTS] <table>`

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use opendal::Operator;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::content::{delimited, ColumnInfo, Row, Schema, SqlResult};
use crate::datasource::{DataFormat, SourceParams};
use crate::error::{DdfError, DdfResult};
use crate::handle::DataHandle;
use crate::manager::handles::{generated_table_name, new_table_handle};
use crate::manager::sql::{is_show_tables, prepare_command};
use crate::manager::{Manager, ManagerContext, ManagerCore, SqlOptions, SqlToHandleOptions};
use crate::storage::{self, Location};

static SELECT_ALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^select\s+\*\s+from\s+("[^"]+"|\S+)(?:\s+limit\s+(\d+))?$"#).unwrap()
});

static DROP_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^drop\s+table\s+(if\s+exists\s+)?("[^"]+"|\S+)$"#).unwrap()
});

#[derive(Debug, Clone)]
struct MemTable {
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
}

pub struct FileManager {
    core: ManagerCore,
    operator: Option<Operator>,
    format: DataFormat,
    tables: RwLock<HashMap<String, MemTable>>,
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("engine", &self.core.engine_name())
            .field("rooted", &self.operator.is_some())
            .field("format", &self.format)
            .field("tables", &self.tables.read().len())
            .finish()
    }
}

fn unquote(identifier: &str) -> &str {
    identifier
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(identifier)
}

impl FileManager {
    pub fn new(context: ManagerContext) -> Result<Self> {
        let (params, format) = match &context.descriptor {
            Some(descriptor) => (
                descriptor.params.clone(),
                descriptor.format.unwrap_or_default(),
            ),
            None => (SourceParams::default(), DataFormat::default()),
        };
        let operator = match &params {
            SourceParams::InMemory { .. } => None,
            SourceParams::Server { .. } => {
                return Err(anyhow!("File engines require file, object store or in-memory parameters"))
            }
            other => Some(storage::operator_for_params(other)?),
        };

        Ok(Self {
            core: ManagerCore::new(context),
            operator,
            format,
            tables: RwLock::new(HashMap::new()),
        })
    }

    fn separator(&self) -> u8 {
        match self.format {
            DataFormat::Sql => b',',
            other => other.field_separator().unwrap_or(b','),
        }
    }

    fn backend_error(&self, operation: &str, error: anyhow::Error) -> DdfError {
        DdfError::backend(self.engine_name(), operation, error)
    }

    /// Names of the in-memory tables and of the files under the root.
    async fn list_tables(&self) -> Result<SqlResult> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        if let Some(op) = &self.operator {
            names.extend(storage::list_files(op, "/").await?);
        }
        Ok(SqlResult::single_column("tableName", names, "show tables"))
    }

    async fn scan(&self, table: &str, limit: Option<usize>, command: &str) -> DdfResult<SqlResult> {
        let start_time = std::time::Instant::now();
        let found = self.tables.read().get(table).cloned();
        let (columns, mut rows) = match found {
            Some(mem) => (mem.columns, mem.rows),
            None => {
                let Some(op) = &self.operator else {
                    return Err(self.backend_error("scan", anyhow!("Table not found: {}", table)));
                };
                if matches!(
                    self.format,
                    DataFormat::Json | DataFormat::Parquet | DataFormat::Avro | DataFormat::Orc
                ) {
                    return Err(DdfError::unsupported(
                        self.engine_name(),
                        format!("scan {:?} files", self.format),
                    ));
                }
                let location = Location {
                    operator: op.clone(),
                    path: table.to_string(),
                };
                let bytes = storage::read(&location)
                    .await
                    .map_err(|e| self.backend_error("scan", e))?;
                let parsed = delimited::read(&bytes, self.separator(), true)
                    .map_err(|e| self.backend_error("scan", e))?;
                let columns = parsed.columns();
                let rows = parsed.rows.into_iter().map(Row::from_text).collect();
                (columns, rows)
            }
        };

        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(SqlResult::new(
            columns,
            rows,
            start_time.elapsed().as_millis(),
            command,
        ))
    }

    fn drop_table(&self, table: &str, if_exists: bool, command: &str) -> DdfResult<SqlResult> {
        let removed = self.tables.write().remove(table).is_some();
        if !removed && !if_exists {
            return Err(self.backend_error("drop table", anyhow!("Table not found: {}", table)));
        }
        Ok(SqlResult::modified(u64::from(removed), 0, command))
    }

    fn locate(&self, url: &str) -> DdfResult<Location> {
        match &self.operator {
            Some(op) if !url.contains("://") && !url.starts_with('/') => Ok(Location {
                operator: op.clone(),
                path: url.to_string(),
            }),
            _ => storage::resolve(url),
        }
    }

    async fn ingest(&self, url: &str, separator: &str, has_header: bool) -> DdfResult<Arc<DataHandle>> {
        let separator = delimited::parse_separator(separator)
            .map_err(|e| DdfError::InvalidArgument(e.to_string()))?;
        let location = self.locate(url)?;
        let bytes = storage::read(&location)
            .await
            .map_err(|e| self.backend_error("load", e))?;
        let table = delimited::read(&bytes, separator, has_header)
            .map_err(|e| self.backend_error("load", e))?;

        tracing::info!(
            "{}: loaded {} rows from {}",
            self.engine_name(),
            table.rows.len(),
            url
        );
        self.materialize(None, table.into_result(url), None).await
    }
}

#[async_trait]
impl Manager for FileManager {
    fn core(&self) -> &ManagerCore {
        &self.core
    }

    async fn startup(&self) -> DdfResult<()> {
        if let Some(op) = &self.operator {
            storage::check(op)
                .await
                .map_err(|e| self.backend_error("connect", e))?;
        }
        tracing::info!("{}: file engine ready", self.engine_name());
        Ok(())
    }

    async fn shutdown(&self) -> DdfResult<()> {
        self.tables.write().clear();
        Ok(())
    }

    async fn sql_with(&self, command: &str, options: SqlOptions) -> DdfResult<SqlResult> {
        let command = prepare_command(self, command, options.source.as_ref());
        if command.is_empty() {
            return Err(DdfError::InvalidArgument("Empty query".to_string()));
        }
        if is_show_tables(&command) {
            return self
                .list_tables()
                .await
                .map_err(|e| self.backend_error("list tables", e));
        }

        if let Some(caps) = SELECT_ALL.captures(&command) {
            let table = unquote(&caps[1]).to_string();
            let limit = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
            let limit = match (limit, options.max_rows) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            return self.scan(&table, limit, &command).await;
        }
        if let Some(caps) = DROP_TABLE.captures(&command) {
            return self.drop_table(unquote(&caps[2]), caps.get(1).is_some(), &command);
        }

        Err(DdfError::unsupported(
            self.engine_name(),
            format!("sql: {}", command),
        ))
    }

    async fn sql_to_handle_with(
        &self,
        command: &str,
        options: SqlToHandleOptions,
    ) -> DdfResult<Arc<DataHandle>> {
        let result = self
            .sql_with(
                command,
                SqlOptions {
                    max_rows: None,
                    source: options.source,
                },
            )
            .await?;
        self.materialize(None, result, options.schema).await
    }

    async fn load_file(&self, url: &str, separator: &str) -> DdfResult<Arc<DataHandle>> {
        self.ingest(url, separator, false).await
    }

    async fn load_table(&self, url: &str, separator: &str) -> DdfResult<Arc<DataHandle>> {
        self.ingest(url, separator, true).await
    }

    async fn materialize(
        &self,
        name: Option<&str>,
        result: SqlResult,
        schema: Option<Schema>,
    ) -> DdfResult<Arc<DataHandle>> {
        if let Some(name) = name {
            if self.get_handle_by_name(name).is_ok() {
                return Err(DdfError::DuplicateHandleName(name.to_string()));
            }
        }
        let columns = result.columns().to_vec();
        if columns.is_empty() {
            return Err(DdfError::InvalidArgument(
                "Cannot materialize a result without columns".to_string(),
            ));
        }

        let schema = schema
            .filter(|s| s.column_count() == columns.len())
            .unwrap_or_else(|| Schema::from_columns(&columns));
        let rows = result
            .into_remaining_rows()
            .into_iter()
            .map(|row| {
                Row::new(
                    row.iter()
                        .zip(&schema.columns)
                        .map(|(value, column)| column.column_type.coerce(value.clone()))
                        .collect(),
                )
            })
            .collect();

        let table = generated_table_name();
        self.tables
            .write()
            .insert(table.clone(), MemTable { columns, rows });

        match new_table_handle(self, &table, name.map(String::from), Some(schema)) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.tables.write().remove(&table);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::datasource::{DataSourceDescriptor, EngineType};

    fn manager_at(path: &std::path::Path) -> FileManager {
        let descriptor =
            DataSourceDescriptor::new(EngineType::File, SourceParams::file(path, false))
                .with_format(DataFormat::Csv);
        let context = ManagerContext::new(EngineType::File, Arc::new(EngineConfig::builtin()))
            .with_descriptor(descriptor);
        FileManager::new(context).unwrap()
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"t1\""), "t1");
        assert_eq!(unquote("t1"), "t1");
    }

    #[test]
    fn test_format_follows_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(manager_at(dir.path()).format, DataFormat::Csv);

        let descriptor =
            DataSourceDescriptor::new(EngineType::File, SourceParams::file(dir.path(), false))
                .with_format(DataFormat::Tsv);
        let context = ManagerContext::new(EngineType::File, Arc::new(EngineConfig::builtin()))
            .with_descriptor(descriptor);
        assert_eq!(FileManager::new(context).unwrap().separator(), b'\t');

        let bare =
            DataSourceDescriptor::new(EngineType::File, SourceParams::file(dir.path(), false));
        let context = ManagerContext::new(EngineType::File, Arc::new(EngineConfig::builtin()))
            .with_descriptor(bare);
        let manager = FileManager::new(context).unwrap();
        assert_eq!(manager.format, DataFormat::default());
        assert_eq!(manager.separator(), b',');
    }

    #[test]
    fn test_server_params_rejected() {
        let descriptor = DataSourceDescriptor::new(
            EngineType::File,
            SourceParams::server("jdbc:postgresql://localhost/db"),
        );
        let context = ManagerContext::new(EngineType::File, Arc::new(EngineConfig::builtin()))
            .with_descriptor(descriptor);
        assert!(FileManager::new(context).is_err());
    }

    #[test]
    fn test_select_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("people.csv"), "id,name\n1,ann\n2,bob\n3,cy\n").unwrap();
        let manager = manager_at(dir.path());

        smol::block_on(async {
            manager.startup().await.unwrap();

            let mut tables = manager.sql_with("show tables", SqlOptions::default()).await.unwrap();
            assert!(tables.next());
            assert_eq!(tables.get_string(0).as_deref(), Some("people.csv"));

            let mut result = manager
                .sql_with("SELECT * FROM people.csv LIMIT 2", SqlOptions::default())
                .await
                .unwrap();
            assert_eq!(result.column_names(), vec!["id", "name"]);
            assert_eq!(result.row_count(), Some(2));
            assert!(result.next());
            assert_eq!(result.get_string(1).as_deref(), Some("ann"));
        });
    }

    #[test]
    fn test_materialize_and_drop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_at(dir.path());

        smol::block_on(async {
            let result = SqlResult::new(
                vec![ColumnInfo::new("n", "bigint", 0)],
                vec![Row::from_text(vec![Some("7")])],
                0,
                "values",
            );
            let handle = manager.materialize(Some("sevens"), result, None).await.unwrap();
            let table = handle.table_name().unwrap();
            assert_eq!(manager.get_handle_by_name("sevens").unwrap().id(), handle.id());

            let mut rows = manager
                .sql_with(&format!("SELECT * FROM {}", table), SqlOptions::default())
                .await
                .unwrap();
            assert!(rows.next());
            assert_eq!(rows.get_value(0), Some(&crate::content::Value::Int64(7)));

            let dropped = manager
                .sql_with(&format!("DROP TABLE {}", table), SqlOptions::default())
                .await
                .unwrap();
            assert_eq!(dropped.rows_affected(), Some(1));
            assert!(manager.drop_if_exists(&table).await);
        });
    }

    #[test]
    fn test_other_sql_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_at(dir.path());

        let err = smol::block_on(manager.sql_with("UPDATE t SET a = 1", SqlOptions::default()))
            .unwrap_err();
        assert!(matches!(err, DdfError::Unsupported { .. }));
    }
}
