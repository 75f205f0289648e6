//! Table schemas attached to handles and typed results.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::row::{ColumnInfo, Value};

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
    Date,
    Timestamp,
    Blob,
    Array,
    Struct,
}

impl ColumnType {
    /// Map an engine type name onto a column type.
    ///
    /// Qualified names (`java.lang.Integer`) are matched on their last
    /// segment and parameterised names (`decimal(10,2)`, `varchar(32)`) on
    /// their base. Anything unrecognised is treated as a string.
    pub fn from_type_name(name: &str) -> Self {
        let last = name.rsplit('.').next().unwrap_or(name);
        let base = last
            .split('(')
            .next()
            .unwrap_or(last)
            .trim()
            .to_lowercase();

        match base.as_str() {
            "int" | "integer" | "tinyint" | "smallint" | "int2" | "int4" | "mediumint" => {
                Self::Int
            }
            "bigint" | "long" | "int8" => Self::BigInt,
            "float" | "real" | "float4" => Self::Float,
            "double" | "double precision" | "float8" => Self::Double,
            "decimal" | "numeric" => Self::Decimal,
            "boolean" | "bool" | "logical" => Self::Boolean,
            "date" => Self::Date,
            "timestamp" | "datetime" => Self::Timestamp,
            "blob" | "binary" | "bytea" => Self::Blob,
            "array" => Self::Array,
            "struct" | "map" | "json" => Self::Struct,
            _ => Self::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Blob => "blob",
            Self::Array => "array",
            Self::Struct => "struct",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int | Self::BigInt | Self::Float | Self::Double | Self::Decimal
        )
    }

    /// Coerce a cell to this type.
    ///
    /// Values already of a compatible type pass through; text is parsed.
    /// A cell that cannot be coerced is returned unchanged so no data is lost.
    pub fn coerce(&self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        match (self, value) {
            (Self::Int, Value::Int64(v)) => i32::try_from(v)
                .map(Value::Int32)
                .unwrap_or(Value::Int64(v)),
            (Self::Int, Value::Text(s)) => parse_or_text(s, |t| t.parse::<i32>().map(Value::Int32)),
            (Self::BigInt, Value::Int32(v)) => Value::Int64(v as i64),
            (Self::BigInt, Value::Text(s)) => {
                parse_or_text(s, |t| t.parse::<i64>().map(Value::Int64))
            }
            (Self::Float, Value::Float64(v)) => Value::Float32(v as f32),
            (Self::Float, Value::Text(s)) => {
                parse_or_text(s, |t| t.parse::<f32>().map(Value::Float32))
            }
            (Self::Double, Value::Float32(v)) => Value::Float64(v as f64),
            (Self::Double, Value::Int32(v)) => Value::Float64(v as f64),
            (Self::Double, Value::Int64(v)) => Value::Float64(v as f64),
            (Self::Double, Value::Text(s)) => {
                parse_or_text(s, |t| t.parse::<f64>().map(Value::Float64))
            }
            (Self::Decimal, Value::Text(s)) => {
                parse_or_text(s, |t| Decimal::from_str(t).map(Value::Decimal))
            }
            (Self::Decimal, Value::Int64(v)) => Value::Decimal(Decimal::from(v)),
            (Self::Decimal, Value::Float64(v)) => Decimal::try_from(v)
                .map(Value::Decimal)
                .unwrap_or(Value::Float64(v)),
            (Self::Boolean, Value::Int32(v)) => Value::Bool(v != 0),
            (Self::Boolean, Value::Int64(v)) => Value::Bool(v != 0),
            (Self::Boolean, Value::Text(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "t" | "1" => Value::Bool(true),
                "false" | "no" | "f" | "0" => Value::Bool(false),
                _ => Value::Text(s),
            },
            (Self::Date, Value::Text(s)) => parse_or_text(s, |t| {
                NaiveDate::parse_from_str(t, "%Y-%m-%d").map(Value::Date)
            }),
            (Self::Timestamp, Value::Text(s)) => parse_or_text(s, |t| {
                NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map(Value::Timestamp)
            }),
            (Self::Struct, Value::Text(s)) => {
                parse_or_text(s, |t| serde_json::from_str(t).map(Value::Json))
            }
            (Self::String, v @ Value::Text(_)) => v,
            (Self::String, v) => Value::Text(v.to_string()),
            (_, v) => v,
        }
    }
}

fn parse_or_text<E>(s: String, parse: impl FnOnce(&str) -> Result<Value, E>) -> Value {
    parse(s.trim()).unwrap_or(Value::Text(s))
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Schema of a handle: its backing table name and ordered columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub table_name: Option<String>,
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(table_name: Option<String>, columns: Vec<Column>) -> Self {
        Self {
            table_name,
            columns,
        }
    }

    /// Parse a `name type, name type` column list.
    pub fn parse(spec: &str) -> Self {
        let columns = spec
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split_whitespace();
                let name = pieces.next()?;
                let type_name = pieces.collect::<Vec<_>>().join(" ");
                Some(Column::new(name, ColumnType::from_type_name(&type_name)))
            })
            .collect();
        Self::new(None, columns)
    }

    /// Derive a schema from result-set column metadata.
    pub fn from_columns(columns: &[ColumnInfo]) -> Self {
        Self::new(
            None,
            columns
                .iter()
                .map(|c| Column::new(c.name.clone(), ColumnType::from_type_name(&c.type_name)))
                .collect(),
        )
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}
