//! Delimiter-separated text, the interchange format of load and export.

use anyhow::{anyhow, Result};

use super::result::SqlResult;
use super::row::{ColumnInfo, Row};

/// Parse a field separator argument.
///
/// Accepts a single byte (`","`, `"|"`) or the escaped forms `"\t"` and
/// `"tab"`; an empty separator defaults to a comma.
pub fn parse_separator(separator: &str) -> Result<u8> {
    match separator {
        "" => Ok(b','),
        "\\t" | "tab" => Ok(b'\t'),
        s if s.len() == 1 => Ok(s.as_bytes()[0]),
        s => Err(anyhow!("Field separator must be a single character, got '{}'", s)),
    }
}

/// Rows read from a delimited file.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedTable {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl DelimitedTable {
    /// Column metadata, every column typed as text.
    pub fn columns(&self) -> Vec<ColumnInfo> {
        self.column_names
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnInfo::new(name.clone(), "string", i))
            .collect()
    }

    pub fn into_result(self, original_query: impl Into<String>) -> SqlResult {
        let columns = self.columns();
        let rows = self.rows.into_iter().map(Row::from_text).collect();
        SqlResult::new(columns, rows, 0, original_query)
    }
}

/// Parse delimited bytes.
///
/// With `has_header` the first record names the columns. Otherwise every
/// record is data and columns are named `v1..vN`. Empty cells become NULL
/// and short records are padded with NULL.
pub fn read(data: &[u8], separator: u8, has_header: bool) -> Result<DelimitedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect::<Vec<_>>(),
        );
    }

    let mut column_names = Vec::new();
    if has_header && !records.is_empty() {
        let header = records.remove(0);
        column_names = header
            .into_iter()
            .enumerate()
            .map(|(i, name)| name.unwrap_or_else(|| format!("v{}", i + 1)))
            .collect();
    }

    let width = records
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(column_names.len());
    for i in column_names.len()..width {
        column_names.push(format!("v{}", i + 1));
    }
    for record in &mut records {
        record.resize(width, None);
    }

    Ok(DelimitedTable {
        column_names,
        rows: records,
    })
}

/// Render the unvisited rows of a result as delimited text. NULL is written
/// as an empty cell.
pub fn write(result: &SqlResult, separator: u8, has_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(separator)
        .from_writer(Vec::new());

    if has_header {
        writer.write_record(result.column_names())?;
    }
    for row in result.to_text_rows() {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush delimited output: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::row::Value;

    #[test]
    fn test_parse_separator() {
        assert_eq!(parse_separator(",").unwrap(), b',');
        assert_eq!(parse_separator("\\t").unwrap(), b'\t');
        assert_eq!(parse_separator("\t").unwrap(), b'\t');
        assert_eq!(parse_separator("").unwrap(), b',');
        assert!(parse_separator("::").is_err());
    }

    #[test]
    fn test_read_without_header() {
        let table = read(b"1,a\n2,\n3,c,extra\n", b',', false).unwrap();
        assert_eq!(table.column_names, vec!["v1", "v2", "v3"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], vec![Some("2".to_string()), None, None]);
    }

    #[test]
    fn test_read_with_header() {
        let table = read(b"id|name\n1|x\n", b'|', true).unwrap();
        assert_eq!(table.column_names, vec!["id", "name"]);
        assert_eq!(table.rows, vec![vec![Some("1".to_string()), Some("x".to_string())]]);
    }

    #[test]
    fn test_write_result() {
        let result = SqlResult::new(
            vec![ColumnInfo::new("id", "int", 0), ColumnInfo::new("name", "text", 1)],
            vec![
                Row::new(vec![Value::Int32(1), Value::Text("a".to_string())]),
                Row::new(vec![Value::Int32(2), Value::Null]),
            ],
            0,
            "select",
        );

        let bytes = write(&result, b'\t', true).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "id\tname\n1\ta\n2\t\n");
    }
}
