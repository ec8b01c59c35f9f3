// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query executor contract
//!
//! The catalog never talks to the network itself. It hands query text to a
//! [`QueryExecutor`] and gets back the first result table of the response;
//! auxiliary status tables are the executor's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure reported by a [`QueryExecutor`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The credential expired or was rejected; a refresh may fix it
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other remote failure
    #[error("{0}")]
    Failed(String),

    /// The executor observed the cancellation token
    #[error("Query was cancelled")]
    Cancelled,
}

/// Executes queries against a remote cluster
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `query` against `database` (or the connection default when `None`)
    /// and return the first result table.
    ///
    /// Implementations should stop promptly once `cancel` fires.
    async fn execute(
        &self,
        query: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResultTable, ExecutorError>;

    /// Replace the credential used for subsequent requests
    async fn update_token(&self, token: &str);
}

/// A fully materialised tabular result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builder method: append a row
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            table: self,
            values,
        })
    }

    /// First cell of the first row
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Borrowed view of one row, addressed by column name
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a ResultTable,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.table
            .column_index(column)
            .and_then(|idx| self.values.get(idx))
    }

    /// String cell; missing columns and nulls read as `None`
    pub fn get_str(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(Value::as_str)
    }

    /// String cell with missing/null mapped to the empty string
    pub fn get_str_or_empty(&self, column: &str) -> &'a str {
        self.get_str(column).unwrap_or_default()
    }

    /// Integer cell; numeric strings are accepted
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The row as a `{column: value}` object
    pub fn to_object(&self) -> Map<String, Value> {
        self.table
            .columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResultTable {
        ResultTable::new(["TableName", "Count", "Folder"])
            .with_row(vec![json!("Events"), json!(3), Value::Null])
            .with_row(vec![json!("Logs"), json!("7"), json!("Diagnostics")])
    }

    #[test]
    fn test_row_access_by_name() {
        let table = sample();
        let rows: Vec<_> = table.rows().collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_str("TableName"), Some("Events"));
        assert_eq!(rows[0].get_str("Folder"), None);
        assert_eq!(rows[0].get_str_or_empty("Folder"), "");
        assert_eq!(rows[1].get_str("Folder"), Some("Diagnostics"));
        assert_eq!(rows[0].get_str("Missing"), None);
    }

    #[test]
    fn test_get_i64_accepts_numbers_and_numeric_strings() {
        let table = sample();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0].get_i64("Count"), Some(3));
        assert_eq!(rows[1].get_i64("Count"), Some(7));
        assert_eq!(rows[0].get_i64("TableName"), None);
    }

    #[test]
    fn test_scalar_and_object() {
        let table = sample();
        assert_eq!(table.scalar(), Some(&json!("Events")));

        let row = table.rows().next().map(|r| r.to_object());
        let row = row.unwrap_or_default();
        assert_eq!(row.get("Count"), Some(&json!(3)));
    }

    #[test]
    fn test_empty_table() {
        let table = ResultTable::new(["Count"]);
        assert!(table.is_empty());
        assert_eq!(table.scalar(), None);
    }
}
