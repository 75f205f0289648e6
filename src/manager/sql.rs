//! Query-family overloads and command preparation.
//!
//! Every overload funnels into the canonical `Manager::sql_with`,
//! `sql_to_handle_with` or `sql_typed_with` call with the qualifiers it was
//! not given left unset.

use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use super::{Manager, SqlOptions, SqlToHandleOptions};
use crate::content::{Schema, SqlResult, SqlTypedResult};
use crate::datasource::{DataFormat, DataSourceDescriptor};
use crate::error::DdfResult;
use crate::handle::DataHandle;

/// Listing command understood by every engine.
pub const SHOW_TABLES: &str = "show tables";

static TABLE_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(from|join)(\s+)([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

pub async fn sql<M: Manager + ?Sized>(manager: &M, command: &str) -> DdfResult<SqlResult> {
    manager.sql_with(command, SqlOptions::default()).await
}

pub async fn sql_max_rows<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    max_rows: usize,
) -> DdfResult<SqlResult> {
    manager
        .sql_with(
            command,
            SqlOptions {
                max_rows: Some(max_rows),
                source: None,
            },
        )
        .await
}

pub async fn sql_on<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    source: DataSourceDescriptor,
) -> DdfResult<SqlResult> {
    manager
        .sql_with(
            command,
            SqlOptions {
                max_rows: None,
                source: Some(source),
            },
        )
        .await
}

/// Run a command whose table identifiers name this Manager's handles.
pub async fn sql_query_on_handles<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
) -> DdfResult<SqlResult> {
    let source = DataSourceDescriptor::scoped(manager.engine_type(), true);
    sql_on(manager, command, source).await
}

pub async fn sql_to_handle<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
) -> DdfResult<Arc<DataHandle>> {
    manager
        .sql_to_handle_with(command, SqlToHandleOptions::default())
        .await
}

pub async fn sql_to_handle_with_schema<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    schema: Schema,
) -> DdfResult<Arc<DataHandle>> {
    manager
        .sql_to_handle_with(
            command,
            SqlToHandleOptions {
                schema: Some(schema),
                ..Default::default()
            },
        )
        .await
}

pub async fn sql_to_handle_on<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    source: DataSourceDescriptor,
) -> DdfResult<Arc<DataHandle>> {
    manager
        .sql_to_handle_with(
            command,
            SqlToHandleOptions {
                source: Some(source),
                ..Default::default()
            },
        )
        .await
}

pub async fn sql_to_handle_as<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    source: Option<DataSourceDescriptor>,
    format: DataFormat,
) -> DdfResult<Arc<DataHandle>> {
    manager
        .sql_to_handle_with(
            command,
            SqlToHandleOptions {
                schema: None,
                source,
                format: Some(format),
            },
        )
        .await
}

pub async fn sql_typed<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
) -> DdfResult<SqlTypedResult> {
    manager
        .sql_typed_with(command, SqlOptions::default())
        .await
}

pub async fn sql_typed_max_rows<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    max_rows: usize,
) -> DdfResult<SqlTypedResult> {
    manager
        .sql_typed_with(
            command,
            SqlOptions {
                max_rows: Some(max_rows),
                source: None,
            },
        )
        .await
}

pub async fn sql_typed_on<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    source: DataSourceDescriptor,
) -> DdfResult<SqlTypedResult> {
    manager
        .sql_typed_with(
            command,
            SqlOptions {
                max_rows: None,
                source: Some(source),
            },
        )
        .await
}

/// Resolve the command a backend should run.
///
/// With a handle-scoped source, table references naming handles of this
/// Manager (by name or identifier) become their backing tables. Other
/// identifiers are left alone.
pub fn prepare_command<M: Manager + ?Sized>(
    manager: &M,
    command: &str,
    source: Option<&DataSourceDescriptor>,
) -> String {
    let command = command.trim().trim_end_matches(';').trim_end();
    if !source.is_some_and(DataSourceDescriptor::is_query_on_handles) {
        return command.to_string();
    }

    rewrite_handle_refs(command, |identifier| {
        let handle = match Uuid::parse_str(identifier) {
            Ok(id) => manager.get_handle(id).ok(),
            Err(_) => manager.get_handle_by_name(identifier).ok(),
        };
        handle.and_then(|h| h.table_name())
    })
}

/// Rewrite the identifier after each `FROM`/`JOIN` that `resolve` maps.
pub fn rewrite_handle_refs(command: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    TABLE_REF_PATTERN
        .replace_all(command, |caps: &Captures| {
            let identifier = &caps[3];
            match resolve(identifier) {
                Some(table) => format!("{}{}{}", &caps[1], &caps[2], table),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Check if the query is a SELECT-type query.
pub fn is_select_query(command: &str) -> bool {
    let lower = command.to_lowercase();
    let trimmed = lower.trim_start();
    trimmed.starts_with("select") || trimmed.starts_with("with") || trimmed.starts_with("pragma")
}

pub fn is_show_tables(command: &str) -> bool {
    command
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        == ["show", "tables"]
}

/// Append a `LIMIT` to a select that has none.
pub fn apply_row_limit(command: &str, max_rows: Option<usize>) -> String {
    match max_rows {
        Some(n)
            if is_select_query(command)
                && !command.to_lowercase().trim_start().starts_with("pragma")
                && !command.to_lowercase().contains(" limit ") =>
        {
            format!("{} LIMIT {}", command.trim_end().trim_end_matches(';'), n)
        }
        _ => command.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_select_query() {
        assert!(is_select_query("SELECT * FROM users"));
        assert!(is_select_query("  with cte AS (SELECT 1) SELECT * FROM cte"));
        assert!(is_select_query("pragma table_info(users)"));
        assert!(!is_select_query("CREATE TABLE foo (id INT)"));
        assert!(!is_select_query("show tables"));
    }

    #[test]
    fn test_is_show_tables() {
        assert!(is_show_tables("show tables"));
        assert!(is_show_tables("  SHOW   TABLES "));
        assert!(!is_show_tables("show tables like 'x'"));
    }

    #[test]
    fn test_apply_row_limit() {
        assert_eq!(
            apply_row_limit("select * from t;", Some(10)),
            "select * from t LIMIT 10"
        );
        assert_eq!(
            apply_row_limit("select * from t limit 5", Some(10)),
            "select * from t limit 5"
        );
        assert_eq!(apply_row_limit("delete from t", Some(10)), "delete from t");
        assert_eq!(apply_row_limit("select 1", None), "select 1");
    }

    #[test]
    fn test_rewrite_handle_refs() {
        let id = Uuid::new_v4();
        let command = format!(
            "SELECT a.x FROM sales a JOIN {} b ON a.id = b.id where sales = 1",
            id
        );
        let rewritten = rewrite_handle_refs(&command, |ident| match ident {
            "sales" => Some("ddf_sales".to_string()),
            other if other == id.to_string() => Some("ddf_other".to_string()),
            _ => None,
        });
        assert_eq!(
            rewritten,
            "SELECT a.x FROM ddf_sales a JOIN ddf_other b ON a.id = b.id where sales = 1"
        );
    }

    #[test]
    fn test_rewrite_leaves_unknown_identifiers() {
        let rewritten = rewrite_handle_refs("select * from plain_table", |_| None);
        assert_eq!(rewritten, "select * from plain_table");
    }
}
