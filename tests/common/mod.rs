//! In-process Manager used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ddf::config::{EngineConfig, KEY_MANAGER};
use ddf::content::{ColumnInfo, Row, Schema, SqlResult};
use ddf::datasource::{DataSourceDescriptor, EngineType, SourceParams};
use ddf::error::{DdfError, DdfResult};
use ddf::handle::{DataHandle, Model};
use ddf::manager::handles::{generated_table_name, new_table_handle};
use ddf::manager::sql::{is_show_tables, prepare_command};
use ddf::manager::{
    Manager, ManagerContext, ManagerCore, ManagerFactory, PersistenceHandler, Persistible,
    SqlOptions, SqlToHandleOptions,
};
use uuid::Uuid;
use ddf::Coordinator;

/// Implementation name the mock is registered under.
pub const MOCK_MANAGER: &str = "mock";

/// Table every mock engine starts with.
pub const FIXTURE_TABLE: &str = "db.table";

/// Extra option that makes `startup` fail.
pub const FAIL_STARTUP: &str = "fail_startup";

/// Calls observed across every mock built by one factory.
#[derive(Debug, Default)]
pub struct MockLog {
    pub created: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub queries: AtomicUsize,
}

impl MockLog {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

pub struct MockManager {
    core: ManagerCore,
    log: Arc<MockLog>,
    fail_startup: bool,
    tables: Mutex<HashMap<String, (Vec<ColumnInfo>, Vec<Row>)>>,
}

fn fixture() -> (Vec<ColumnInfo>, Vec<Row>) {
    (
        vec![
            ColumnInfo::new("id", "bigint", 0),
            ColumnInfo::new("name", "string", 1),
        ],
        vec![
            Row::from_text(vec![Some("1"), Some("ann")]),
            Row::from_text(vec![Some("2"), Some("bob")]),
        ],
    )
}

impl MockManager {
    pub fn new(context: ManagerContext, log: Arc<MockLog>) -> Self {
        let fail_startup = context
            .descriptor
            .as_ref()
            .is_some_and(|d| d.params.extra_options().contains_key(FAIL_STARTUP));
        log.created.fetch_add(1, Ordering::SeqCst);

        let mut tables = HashMap::new();
        tables.insert(FIXTURE_TABLE.to_string(), fixture());
        Self {
            core: ManagerCore::new(context),
            log,
            fail_startup,
            tables: Mutex::new(tables),
        }
    }
}

#[async_trait]
impl Manager for MockManager {
    fn core(&self) -> &ManagerCore {
        &self.core
    }

    async fn startup(&self) -> DdfResult<()> {
        self.log.started.fetch_add(1, Ordering::SeqCst);
        if self.fail_startup {
            return Err(DdfError::backend(
                self.engine_name(),
                "connect",
                anyhow::anyhow!("connection refused"),
            ));
        }
        Ok(())
    }

    async fn shutdown(&self) -> DdfResult<()> {
        self.log.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sql_with(&self, command: &str, options: SqlOptions) -> DdfResult<SqlResult> {
        self.log.queries.fetch_add(1, Ordering::SeqCst);
        let command = prepare_command(self, command, options.source.as_ref());
        if is_show_tables(&command) {
            let mut names: Vec<String> = self.tables.lock().keys().cloned().collect();
            names.sort();
            return Ok(SqlResult::single_column("tableName", names, command));
        }

        let table = command
            .strip_prefix("SELECT * FROM ")
            .ok_or_else(|| DdfError::unsupported(self.engine_name(), command.clone()))?;
        let (columns, mut rows) = self
            .tables
            .lock()
            .get(table)
            .cloned()
            .ok_or_else(|| {
                DdfError::backend(
                    self.engine_name(),
                    "run sql",
                    anyhow::anyhow!("no such table: {}", table),
                )
            })?;
        if let Some(max_rows) = options.max_rows {
            rows.truncate(max_rows);
        }
        Ok(SqlResult::new(columns, rows, 0, command.clone()))
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

    async fn load_file(&self, _url: &str, _separator: &str) -> DdfResult<Arc<DataHandle>> {
        Err(DdfError::unsupported(self.engine_name(), "load_file"))
    }

    async fn load_table(&self, _url: &str, _separator: &str) -> DdfResult<Arc<DataHandle>> {
        Err(DdfError::unsupported(self.engine_name(), "load_table"))
    }

    async fn materialize(
        &self,
        name: Option<&str>,
        result: SqlResult,
        schema: Option<Schema>,
    ) -> DdfResult<Arc<DataHandle>> {
        let table = generated_table_name();
        let columns = result.columns().to_vec();
        let schema = schema.unwrap_or_else(|| Schema::from_columns(&columns));
        let rows = result.into_remaining_rows();
        self.tables.lock().insert(table.clone(), (columns, rows));
        new_table_handle(self, &table, name.map(String::from), Some(schema))
    }
}

/// Built-in configuration with `spark` engines served by the mock.
pub fn mock_config() -> EngineConfig {
    let mut config = EngineConfig::builtin();
    config.set(EngineType::Spark.as_str(), KEY_MANAGER, MOCK_MANAGER);
    config
}

/// Factory with the built-in backends plus the mock.
pub fn mock_factory(config: EngineConfig) -> (ManagerFactory, Arc<MockLog>) {
    let log = Arc::new(MockLog::default());
    let factory = ManagerFactory::with_builtin(config);
    let shared = log.clone();
    factory.register(MOCK_MANAGER, move |context| {
        Ok(Arc::new(MockManager::new(context, shared.clone())) as Arc<dyn Manager>)
    });
    (factory, log)
}

pub fn mock_coordinator() -> (Coordinator, Arc<MockLog>) {
    let (factory, log) = mock_factory(mock_config());
    (Coordinator::new(factory), log)
}

/// Spark descriptor pointing at `source`.
pub fn spark_descriptor(source: &str) -> DataSourceDescriptor {
    DataSourceDescriptor::new(EngineType::Spark, SourceParams::server(source))
}

/// Spark descriptor whose Manager refuses to start.
pub fn failing_descriptor() -> DataSourceDescriptor {
    DataSourceDescriptor::new(
        EngineType::Spark,
        SourceParams::Server {
            url: "spark://unreachable".to_string(),
            username: None,
            password: None,
            extra_options: HashMap::from([(FAIL_STARTUP.to_string(), "true".to_string())]),
        },
    )
}

/// Register a mock spark engine.
pub async fn register_mock(coordinator: &Coordinator, name: &str) -> Arc<dyn Manager> {
    coordinator
        .register_engine(name, EngineType::Spark, spark_descriptor("src1"))
        .await
        .unwrap()
}

/// Model with nothing but a name.
pub struct NamedModel(pub String);

impl Model for NamedModel {
    fn name(&self) -> &str {
        &self.0
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Namespace whose entries load back as models.
pub const MODEL_NAMESPACE: &str = "models";

/// In-memory persistence store for one engine.
///
/// Loaded and restored handles point at [`FIXTURE_TABLE`] and are stamped
/// with `owner`.
pub struct MemoryStore {
    owner: String,
    restorable: Mutex<Vec<Uuid>>,
    unpersisted: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            restorable: Mutex::new(Vec::new()),
            unpersisted: Mutex::new(Vec::new()),
        }
    }

    /// Make `id` restorable.
    pub fn persist(&self, id: Uuid) {
        self.restorable.lock().push(id);
    }

    pub fn unpersisted(&self) -> Vec<(String, String)> {
        self.unpersisted.lock().clone()
    }

    fn stored_handle(&self, name: Option<&str>) -> DataHandle {
        DataHandle::new(self.owner.as_str(), EngineType::Spark)
            .with_table_name(FIXTURE_TABLE)
            .with_name(name.map(String::from))
    }
}

#[async_trait]
impl PersistenceHandler for MemoryStore {
    async fn load(&self, namespace: &str, name: &str) -> anyhow::Result<Persistible> {
        if namespace == MODEL_NAMESPACE {
            return Ok(Persistible::Model(Arc::new(NamedModel(name.to_string()))));
        }
        Ok(Persistible::Handle(Arc::new(self.stored_handle(Some(name)))))
    }

    async fn unpersist(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        self.unpersisted
            .lock()
            .push((namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> anyhow::Result<Option<DataHandle>> {
        if !self.restorable.lock().contains(&id) {
            return Ok(None);
        }
        Ok(Some(self.stored_handle(None)))
    }
}
