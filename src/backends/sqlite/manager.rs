//! SQLite Manager.
//!
//! Serves the JDBC-family engine types from a SQLx `SqlitePool`. Handles
//! are tables of the database; results pulled from other engines are
//! written into fresh `ddf_*` tables.

use anyhow::{anyhow, Result};
use async_lock::RwLock;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::types::{bind_value, column_info, convert_row, quote_identifier, sqlite_type};
use crate::content::{delimited, ColumnInfo, Schema, SqlResult};
use crate::datasource::SourceParams;
use crate::error::{DdfError, DdfResult};
use crate::handle::DataHandle;
use crate::manager::handles::{generated_table_name, new_table_handle};
use crate::manager::sql::{apply_row_limit, is_select_query, is_show_tables, prepare_command};
use crate::manager::{Manager, ManagerContext, ManagerCore, SqlOptions, SqlToHandleOptions};
use crate::storage;

const LIST_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

pub struct SqliteManager {
    core: ManagerCore,
    params: SourceParams,
    pool: RwLock<Option<SqlitePool>>,
}

impl std::fmt::Debug for SqliteManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteManager")
            .field("engine", &self.core.engine_name())
            .field("params", &self.params)
            .field("pool", &"<SqlitePool>")
            .finish()
    }
}

impl SqliteManager {
    /// Create a Manager from its context. Does not connect; `startup` does.
    pub fn new(context: ManagerContext) -> Result<Self> {
        let params = context
            .descriptor
            .as_ref()
            .map(|d| d.params.clone())
            .unwrap_or_default();
        match &params {
            SourceParams::File { .. } | SourceParams::InMemory { .. } => {}
            _ => {
                return Err(anyhow!(
                    "SQLite requires file or in-memory parameters"
                ))
            }
        }

        Ok(Self {
            core: ManagerCore::new(context),
            params,
            pool: RwLock::new(None),
        })
    }

    fn is_in_memory(&self) -> bool {
        matches!(self.params, SourceParams::InMemory { .. })
    }

    fn build_connect_options(&self) -> Result<SqliteConnectOptions> {
        match &self.params {
            SourceParams::File {
                path, read_only, ..
            } => {
                let mut options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(!read_only)
                    .foreign_keys(true);

                if *read_only {
                    options = options.read_only(true);
                } else {
                    options = options.journal_mode(SqliteJournalMode::Wal);
                }

                Ok(options)
            }
            SourceParams::InMemory { .. } => Ok(SqliteConnectOptions::from_str(":memory:")?
                .foreign_keys(true)
                .shared_cache(true)),
            _ => Err(anyhow!(
                "SQLite does not support server-based connections. Use File or InMemory params."
            )),
        }
    }

    async fn get_pool(&self) -> Result<SqlitePool> {
        let guard = self.pool.read().await;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow!("Database not connected"))
    }

    fn backend_error(&self, operation: &str, error: anyhow::Error) -> DdfError {
        DdfError::backend(self.engine_name(), operation, error)
    }

    async fn execute(&self, command: &str) -> Result<SqlResult> {
        let pool = self.get_pool().await?;
        let start_time = std::time::Instant::now();

        if is_select_query(command) {
            let sqlite_rows = sqlx::query(command).fetch_all(&pool).await?;
            let columns = match sqlite_rows.first() {
                Some(first) => column_info(sqlx::Row::columns(first)),
                None => {
                    let described = pool.describe(command).await?;
                    column_info(described.columns())
                }
            };
            let rows = sqlite_rows.iter().map(convert_row).collect();
            Ok(SqlResult::new(
                columns,
                rows,
                start_time.elapsed().as_millis(),
                command,
            ))
        } else {
            let result = sqlx::query(command).execute(&pool).await?;
            Ok(SqlResult::modified(
                result.rows_affected(),
                start_time.elapsed().as_millis(),
                command,
            ))
        }
    }

    async fn list_tables(&self) -> Result<SqlResult> {
        let pool = self.get_pool().await?;
        let names: Vec<String> = sqlx::query_scalar(LIST_TABLES).fetch_all(&pool).await?;
        Ok(SqlResult::single_column("tableName", names, "show tables"))
    }

    async fn table_schema(&self, table: &str) -> Result<Schema> {
        let pool = self.get_pool().await?;
        let described = pool
            .describe(&format!("SELECT * FROM {}", quote_identifier(table)))
            .await?;
        Ok(Schema::from_columns(&column_info(described.columns())).with_table_name(table))
    }

    /// Create `table` with the result's columns and insert its rows.
    async fn write_table(
        &self,
        table: &str,
        columns: &[ColumnInfo],
        schema: &Schema,
        result: SqlResult,
    ) -> Result<()> {
        let definitions: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let column_type = schema
                    .column(i)
                    .map(|col| col.column_type)
                    .unwrap_or_else(|| crate::content::ColumnType::from_type_name(&c.type_name));
                format!("{} {}", quote_identifier(&c.name), sqlite_type(column_type))
            })
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} VALUES ({})",
            quote_identifier(table),
            placeholders
        );

        let pool = self.get_pool().await?;
        let mut tx = pool.begin().await?;
        sqlx::query(&format!(
            "CREATE TABLE {} ({})",
            quote_identifier(table),
            definitions.join(", ")
        ))
        .execute(&mut *tx)
        .await?;

        let mut inserted = 0u64;
        for row in result.into_remaining_rows() {
            let mut query = sqlx::query(&insert);
            for i in 0..columns.len() {
                query = bind_value(query, row.get(i).unwrap_or(&crate::content::Value::Null));
            }
            inserted += query.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        tracing::debug!("{}: wrote {} rows into {}", self.engine_name(), inserted, table);
        Ok(())
    }

    async fn ingest(&self, url: &str, separator: &str, has_header: bool) -> DdfResult<Arc<DataHandle>> {
        let separator = delimited::parse_separator(separator)
            .map_err(|e| DdfError::InvalidArgument(e.to_string()))?;
        let location = storage::resolve(url)?;
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
impl Manager for SqliteManager {
    fn core(&self) -> &ManagerCore {
        &self.core
    }

    async fn startup(&self) -> DdfResult<()> {
        let options = self
            .build_connect_options()
            .map_err(|e| self.backend_error("connect", e))?;

        // SQLite pools should be small due to the single-writer limitation;
        // an in-memory database lives only as long as its one connection.
        let pool_options = if self.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(3)
        };
        let pool = pool_options
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| self.backend_error("connect", e.into()))?;

        let mut guard = self.pool.write().await;
        *guard = Some(pool);

        tracing::info!("{}: connected to SQLite", self.engine_name());
        Ok(())
    }

    async fn shutdown(&self) -> DdfResult<()> {
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
            tracing::info!("{}: disconnected from SQLite", self.engine_name());
        }
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

        let command = apply_row_limit(&command, options.max_rows);
        self.execute(&command)
            .await
            .map_err(|e| self.backend_error("run sql", e))
    }

    async fn sql_to_handle_with(
        &self,
        command: &str,
        options: SqlToHandleOptions,
    ) -> DdfResult<Arc<DataHandle>> {
        let command = prepare_command(self, command, options.source.as_ref());
        if !is_select_query(&command) {
            return Err(DdfError::InvalidArgument(format!(
                "Only queries can produce a handle: {}",
                command
            )));
        }
        if let Some(format) = options.format {
            tracing::debug!("{}: ignoring format {:?} for a table", self.engine_name(), format);
        }

        let table = generated_table_name();
        self.execute(&format!(
            "CREATE TABLE {} AS {}",
            quote_identifier(&table),
            command
        ))
        .await
        .map_err(|e| self.backend_error("create table", e))?;

        let schema = match options.schema {
            Some(schema) => schema,
            None => self
                .table_schema(&table)
                .await
                .map_err(|e| self.backend_error("describe table", e))?,
        };
        match new_table_handle(self, &table, None, Some(schema)) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.drop_if_exists(&quote_identifier(&table)).await;
                Err(e)
            }
        }
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

        let table = generated_table_name();
        let schema = schema
            .filter(|s| s.column_count() == columns.len())
            .unwrap_or_else(|| Schema::from_columns(&columns));
        self.write_table(&table, &columns, &schema, result)
            .await
            .map_err(|e| self.backend_error("write table", e))?;

        match new_table_handle(self, &table, name.map(String::from), Some(schema)) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.drop_if_exists(&quote_identifier(&table)).await;
                Err(e)
            }
        }
    }
}
