use std::path::Path;
use std::sync::Arc;

use ddf::datasource::{DataFormat, DataSourceDescriptor, EngineType, SourceParams};
use ddf::error::DdfError;
use ddf::manager::{sql, ExportSource, Manager};
use ddf::{Coordinator, EngineConfig};

async fn file_engine(coordinator: &Coordinator, name: &str, root: &Path) -> Arc<dyn Manager> {
    coordinator
        .register_engine(
            name,
            EngineType::File,
            DataSourceDescriptor::new(EngineType::File, SourceParams::file(root, false))
                .with_format(DataFormat::Csv),
        )
        .await
        .unwrap()
}

async fn sqlite_engine(coordinator: &Coordinator, name: &str) -> Arc<dyn Manager> {
    coordinator
        .register_engine(
            name,
            EngineType::Jdbc,
            DataSourceDescriptor::new(EngineType::Jdbc, SourceParams::in_memory()),
        )
        .await
        .unwrap()
}

fn write_people(dir: &Path) {
    std::fs::write(dir.join("people.csv"), "id,name\n1,ann\n2,bob\n").unwrap();
}

#[test]
fn test_browse_lists_files() {
    let dir = tempfile::tempdir().unwrap();
    write_people(dir.path());
    std::fs::create_dir(dir.path().join("nested")).unwrap();

    smol::block_on(async {
        let coordinator = Coordinator::with_config(EngineConfig::builtin());
        file_engine(&coordinator, "files", dir.path()).await;

        let mut tables = coordinator.browse("files").await.unwrap();
        assert_eq!(tables.row_count(), Some(1));
        assert!(tables.next());
        assert_eq!(tables.get_string(0).as_deref(), Some("people.csv"));
    });
}

#[test]
fn test_transfer_file_to_sqlite_and_back() {
    let dir = tempfile::tempdir().unwrap();
    write_people(dir.path());

    smol::block_on(async {
        let coordinator = Coordinator::with_config(EngineConfig::builtin());
        let files = file_engine(&coordinator, "files", dir.path()).await;
        let db = sqlite_engine(&coordinator, "db").await;

        let in_db = coordinator
            .transfer("files", "db", "files://people.csv")
            .await
            .unwrap();
        assert_eq!(in_db.engine_name(), "db");
        assert!(files.list_handles().is_empty());

        let mut rows = sql::sql(
            db.as_ref(),
            &format!("SELECT name FROM {} WHERE id = '2'", in_db.table_name().unwrap()),
        )
        .await
        .unwrap();
        assert!(rows.next());
        assert_eq!(rows.get_string(0).as_deref(), Some("bob"));

        let back = coordinator
            .transfer("db", "files", &in_db.uri().unwrap())
            .await
            .unwrap();
        assert_eq!(back.engine_name(), "files");
        assert_eq!(back.schema().unwrap().column_names(), vec!["id", "name"]);

        let all = sql::sql(files.as_ref(), &format!("SELECT * FROM {}", back.table_name().unwrap()))
            .await
            .unwrap();
        assert_eq!(all.row_count(), Some(2));
    });
}

#[test]
fn test_load_relative_to_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("raw.txt"), "a|1\nb|2\nc|3\n").unwrap();

    smol::block_on(async {
        let coordinator = Coordinator::with_config(EngineConfig::builtin());
        let files = file_engine(&coordinator, "files", dir.path()).await;

        let handle = files.load_file("raw.txt", "|").await.unwrap();
        assert_eq!(handle.schema().unwrap().column_names(), vec!["v1", "v2"]);

        let limited = sql::sql_max_rows(
            files.as_ref(),
            &format!("SELECT * FROM {}", handle.table_name().unwrap()),
            2,
        )
        .await
        .unwrap();
        assert_eq!(limited.row_count(), Some(2));

        assert!(matches!(
            files.load_file("raw.txt", "::").await,
            Err(DdfError::InvalidArgument(_))
        ));
        assert!(matches!(
            files.load_table("missing.csv", ",").await,
            Err(DdfError::Backend { .. })
        ));
    });
}

#[test]
fn test_export_query_result() {
    let dir = tempfile::tempdir().unwrap();
    write_people(dir.path());
    let output = dir.path().join("people.tsv");

    smol::block_on(async {
        let coordinator = Coordinator::with_config(EngineConfig::builtin());
        let files = file_engine(&coordinator, "files", dir.path()).await;

        let result = sql::sql(files.as_ref(), "SELECT * FROM people.csv").await.unwrap();
        files
            .export(ExportSource::Result(result), output.to_str().unwrap(), "\\t", false)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "1\tann\n2\tbob\n"
        );

        assert!(matches!(
            files
                .export(
                    ExportSource::Result(sql::sql(files.as_ref(), "show tables").await.unwrap()),
                    "ftp://host/out.csv",
                    ",",
                    true,
                )
                .await,
            Err(DdfError::InvalidUri { .. })
        ));
    });
}

#[test]
fn test_in_memory_file_engine() {
    smol::block_on(async {
        let coordinator = Coordinator::with_config(EngineConfig::builtin());
        let mem = coordinator
            .register_engine(
                "mem",
                EngineType::S3,
                DataSourceDescriptor::new(EngineType::S3, SourceParams::in_memory()),
            )
            .await
            .unwrap();
        let db = sqlite_engine(&coordinator, "db").await;
        sql::sql(db.as_ref(), "CREATE TABLE t (x INTEGER)").await.unwrap();
        sql::sql(db.as_ref(), "INSERT INTO t VALUES (10), (20)").await.unwrap();

        let pulled = mem.transfer_by_table("db", "t").await.unwrap();
        assert_eq!(pulled.engine_name(), "mem");

        let mut tables = sql::sql(mem.as_ref(), "show tables").await.unwrap();
        assert!(tables.next());
        assert_eq!(tables.get_string(0), pulled.table_name());

        assert!(matches!(
            sql::sql(mem.as_ref(), "SELECT * FROM nowhere").await,
            Err(DdfError::Backend { .. })
        ));
    });
}
