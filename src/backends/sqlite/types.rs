//! SQLite type conversion utilities.
//!
//! SQLite uses dynamic typing with type affinity:
//! - INTEGER: 64-bit signed integer
//! - REAL: 64-bit floating point
//! - TEXT: UTF-8 string
//! - BLOB: Binary data
//! - NULL: Null value

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteColumn, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};

use crate::content::{ColumnInfo, ColumnType, Row, Value};

/// Convert a SQLite row to a `Row`.
pub fn convert_row(sqlite_row: &SqliteRow) -> Row {
    Row::new(
        sqlite_row
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| extract_value(sqlite_row, col, idx))
            .collect(),
    )
}

/// Column metadata of SQLite result columns.
pub fn column_info(columns: &[SqliteColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| ColumnInfo::new(col.name(), col.type_info().name(), idx))
        .collect()
}

fn extract_value(row: &SqliteRow, column: &SqliteColumn, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        _ => {}
    }

    let type_name = column.type_info().name().to_uppercase();
    decode_by_type(row, index, &type_name)
}

/// Decode a value based on its declared SQLite type name.
fn decode_by_type(row: &SqliteRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "INTEGER" | "INT" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" | "INT2" | "INT8" => {
            row.try_get::<i64, _>(index)
                .map(Value::Int64)
                .unwrap_or_else(|_| decode_any(row, index))
        }

        // SQLite stores booleans as 0/1
        "BOOLEAN" | "BOOL" => row
            .try_get::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or_else(|_| decode_any(row, index)),

        "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => row
            .try_get::<f64, _>(index)
            .map(Value::Float64)
            .unwrap_or_else(|_| decode_any(row, index)),

        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "DATE" => match row.try_get::<String, _>(index) {
            Ok(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(Value::Date)
                .unwrap_or(Value::Text(s)),
            Err(_) => decode_any(row, index),
        },

        "DATETIME" | "TIMESTAMP" => match row.try_get::<String, _>(index) {
            Ok(s) => ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&s, fmt).ok())
                .map(Value::Timestamp)
                .unwrap_or(Value::Text(s)),
            Err(_) => decode_any(row, index),
        },

        // Stored as TEXT or REAL; text keeps precision
        "NUMERIC" | "DECIMAL" => match row.try_get::<String, _>(index) {
            Ok(s) => s.parse::<Decimal>().map(Value::Decimal).unwrap_or(Value::Text(s)),
            Err(_) => decode_any(row, index),
        },

        _ => decode_any(row, index),
    }
}

/// Decode by trying the storage classes in turn.
fn decode_any(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::Int64(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Value::Float64(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::Text(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Value::Bytes(v);
    }
    Value::Null
}

/// Declared SQLite type for a column type.
pub fn sqlite_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Int | ColumnType::BigInt => "INTEGER",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Float | ColumnType::Double => "REAL",
        ColumnType::Decimal => "NUMERIC",
        ColumnType::Date => "DATE",
        ColumnType::Timestamp => "TIMESTAMP",
        ColumnType::Blob => "BLOB",
        ColumnType::String | ColumnType::Array | ColumnType::Struct => "TEXT",
    }
}

/// Double-quote an identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Bind a cell as a statement parameter.
pub fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::Float32(v) => query.bind(*v as f64),
        Value::Float64(v) => query.bind(*v),
        Value::Bytes(v) => query.bind(v.clone()),
        other => query.bind(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_type_mapping() {
        assert_eq!(sqlite_type(ColumnType::BigInt), "INTEGER");
        assert_eq!(sqlite_type(ColumnType::Double), "REAL");
        assert_eq!(sqlite_type(ColumnType::Struct), "TEXT");

        // Declared types read back through the same column-type mapping
        for column_type in [ColumnType::Int, ColumnType::Double, ColumnType::Date, ColumnType::Blob] {
            let round = ColumnType::from_type_name(sqlite_type(column_type));
            assert_eq!(sqlite_type(round), sqlite_type(column_type));
        }
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("t1"), "\"t1\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
