//! Query results and result-stream processing.

use crate::database::types::{SqlValue, TypeMapper};
use crate::error::ServerError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tiberius::QueryStream;

/// A single row of query results, keeping the column order of the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    values: Vec<(String, SqlValue)>,
}

impl ResultRow {
    /// Create a new result row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Append a value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.push((column.into(), value));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value.into());
        self
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Information about a result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// SQL type name.
    pub sql_type: String,
}

/// Result of a query execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Columns in result-set order.
    pub columns: Vec<ColumnInfo>,

    /// Result rows.
    pub rows: Vec<ResultRow>,

    /// Whether rows were dropped because of the row limit.
    pub truncated: bool,
}

impl QueryResult {
    /// Create an empty query result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a result from rows, deriving no column metadata.
    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        Self {
            columns: Vec::new(),
            rows,
            truncated: false,
        }
    }
}

/// Drain a tiberius result stream into a [`QueryResult`], keeping at most `max_rows` rows.
///
/// Only the first result set's metadata is retained; later result sets keep
/// contributing rows until the limit is reached.
pub(crate) async fn collect_rows(
    mut stream: QueryStream<'_>,
    max_rows: usize,
) -> Result<QueryResult, ServerError> {
    use futures_util::stream::TryStreamExt;

    let mut result = QueryResult::empty();

    while let Some(item) = stream.try_next().await? {
        match item {
            tiberius::QueryItem::Metadata(meta) => {
                if result.columns.is_empty() {
                    result.columns = meta
                        .columns()
                        .iter()
                        .map(|col| ColumnInfo {
                            name: col.name().to_string(),
                            sql_type: TypeMapper::sql_type_name(col).to_string(),
                        })
                        .collect();
                }
            }
            tiberius::QueryItem::Row(row) => {
                if result.rows.len() >= max_rows {
                    // Keep draining so the connection is returned clean
                    result.truncated = true;
                    continue;
                }

                let mut result_row = ResultRow::new();
                for (idx, col) in row.columns().iter().enumerate() {
                    result_row.insert(col.name(), TypeMapper::extract_column(&row, idx));
                }
                result.rows.push(result_row);
            }
        }
    }

    Ok(result)
}

/// Truncate a string for logging purposes.
pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
