//! Uniform SQL result contract returned by every engine.
//!
//! `SqlResult` is a forward-only cursor: `next()` advances to the next row
//! and returns `false` once the rows are exhausted. It cannot be reset;
//! callers that need the rows again must re-run the query.

use serde::{Deserialize, Serialize};

use super::row::{ColumnInfo, Row, Value};
use super::schema::{ColumnType, Schema};

/// Result of a SQL command against one engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlResult {
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
    /// Row count when the engine reports one
    row_count: Option<usize>,
    /// Rows affected by a modification command
    rows_affected: Option<u64>,
    /// Cursor position, `None` before the first `next()`
    #[serde(skip)]
    position: Option<usize>,
    /// Execution time in milliseconds
    pub execution_time_ms: u128,
    /// The command that produced this result
    pub original_query: String,
}

impl SqlResult {
    /// Create a result over materialised rows
    pub fn new(
        columns: Vec<ColumnInfo>,
        rows: Vec<Row>,
        execution_time_ms: u128,
        original_query: impl Into<String>,
    ) -> Self {
        let row_count = Some(rows.len());
        Self {
            columns,
            rows,
            row_count,
            rows_affected: None,
            position: None,
            execution_time_ms,
            original_query: original_query.into(),
        }
    }

    /// Result of a statement that returns no rows
    pub fn modified(
        rows_affected: u64,
        execution_time_ms: u128,
        original_query: impl Into<String>,
    ) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: None,
            rows_affected: Some(rows_affected),
            position: None,
            execution_time_ms,
            original_query: original_query.into(),
        }
    }

    /// Single text column result, as produced by listing commands.
    pub fn single_column(
        name: &str,
        values: impl IntoIterator<Item = String>,
        original_query: impl Into<String>,
    ) -> Self {
        let rows = values
            .into_iter()
            .map(|v| Row::new(vec![Value::Text(v)]))
            .collect();
        Self::new(
            vec![ColumnInfo::new(name, "string", 0)],
            rows,
            0,
            original_query,
        )
    }

    /// Forget the row count, for engines that stream without counting.
    pub fn without_row_count(mut self) -> Self {
        self.row_count = None;
        self
    }

    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }

    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Advance to the next row. Returns `false` at the end.
    pub fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.rows.len());
            false
        }
    }

    fn current(&self) -> Option<&Row> {
        self.position.and_then(|p| self.rows.get(p))
    }

    /// Value of the current row at `index`
    pub fn get_value(&self, index: usize) -> Option<&Value> {
        self.current().and_then(|r| r.get(index))
    }

    /// String form of the current row's cell; NULL is `None`
    pub fn get_string(&self, index: usize) -> Option<String> {
        self.get_value(index).and_then(Value::to_text)
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.get_value(index).is_none_or(Value::is_null)
    }

    /// Consume the cursor and return the rows it has not yet visited.
    pub fn into_remaining_rows(self) -> Vec<Row> {
        let start = self.position.map_or(0, |p| p + 1);
        self.rows.into_iter().skip(start).collect()
    }

    /// Split into column metadata and the rows not yet visited.
    pub fn into_parts(self) -> (Vec<ColumnInfo>, Vec<Row>) {
        let columns = self.columns.clone();
        (columns, self.into_remaining_rows())
    }

    /// Render every unvisited row as text, one `Vec` per row.
    pub fn to_text_rows(&self) -> Vec<Vec<Option<String>>> {
        let start = self.position.map_or(0, |p| p + 1);
        self.rows
            .iter()
            .skip(start)
            .map(|r| r.iter().map(Value::to_text).collect())
            .collect()
    }
}

/// SQL result whose cells are coerced to the declared column types.
#[derive(Debug, Clone)]
pub struct SqlTypedResult {
    inner: SqlResult,
    schema: Schema,
}

impl SqlTypedResult {
    /// Wrap a result, deriving the schema from its column metadata.
    pub fn new(result: SqlResult) -> Self {
        let schema = Schema::from_columns(result.columns());
        Self::with_schema(result, schema)
    }

    /// Wrap a result with an explicit schema. Columns beyond the schema are
    /// typed from the result's own metadata.
    pub fn with_schema(result: SqlResult, schema: Schema) -> Self {
        let mut schema = schema;
        if schema.column_count() < result.column_count() {
            let derived = Schema::from_columns(result.columns());
            schema
                .columns
                .extend(derived.columns.into_iter().skip(schema.column_count()));
        }
        Self {
            inner: result,
            schema,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> Option<usize> {
        self.inner.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.inner.column_names()
    }

    pub fn next(&mut self) -> bool {
        self.inner.next()
    }

    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.schema.column(index).map(|c| c.column_type)
    }

    /// Current row's value at `index`, coerced to the column's type
    pub fn get_value(&self, index: usize) -> Option<Value> {
        let raw = self.inner.get_value(index)?.clone();
        Some(match self.column_type(index) {
            Some(column_type) => column_type.coerce(raw),
            None => raw,
        })
    }

    pub fn get_string(&self, index: usize) -> Option<String> {
        self.inner.get_string(index)
    }

    pub fn into_inner(self) -> SqlResult {
        self.inner
    }
}

impl From<SqlResult> for SqlTypedResult {
    fn from(result: SqlResult) -> Self {
        Self::new(result)
    }
}
