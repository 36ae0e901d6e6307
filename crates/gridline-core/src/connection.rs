//! Connection trait used by SQL-backed data sources

use crate::{Result, Row, Value};
use async_trait::async_trait;

/// A named parameter bound into a statement.
///
/// `name` is the placeholder exactly as it appears in the SQL text
/// (for example `:qwer0`), so drivers can bind it without re-parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Value,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Column metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Data type (database-specific string)
    pub data_type: String,
    /// Column ordinal position (0-based)
    pub ordinal: usize,
}

/// Query result
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column metadata
    pub columns: Vec<ColumnMeta>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Rows affected (for DML statements)
    pub affected_rows: u64,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new empty query result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the result has rows
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First value of the first row, as returned by `COUNT(*)` style queries
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(0))
    }
}

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Quote an identifier for this dialect.
    ///
    /// Dotted names (`alias.column`) are quoted per segment.
    fn quote_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Binding]) -> Result<QueryResult>;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE/DDL)
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, sql: &str, params: &[Binding]) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Row;

    struct Dummy;

    #[async_trait]
    impl Connection for Dummy {
        fn driver_name(&self) -> &str {
            "dummy"
        }

        async fn query(&self, _sql: &str, _params: &[Binding]) -> Result<QueryResult> {
            Ok(QueryResult {
                rows: vec![Row::from_pairs([("count", Value::Int(7))])],
                ..QueryResult::default()
            })
        }

        async fn execute(&self, _sql: &str, _params: &[Binding]) -> Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_quote_identifier_per_segment() {
        assert_eq!(Dummy.quote_identifier("u.name"), "\"u\".\"name\"");
        assert_eq!(Dummy.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_scalar() {
        let result = Dummy.query("SELECT COUNT(*)", &[]).await.unwrap();
        assert_eq!(result.scalar(), Some(&Value::Int(7)));
    }
}
