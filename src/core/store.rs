//! Storage trait for the six universal tables

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

use super::table::{Row, Table};

/// Equality filter plus paging for a select
///
/// Results are always ordered by `created_at`, newest first.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    /// Column → value; a row matches when every column is equal
    pub filter: Row,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SelectQuery {
    pub fn new(filter: Row) -> Self {
        Self {
            filter,
            limit: None,
            offset: 0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Add an equality condition
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter.insert(column.to_string(), value.into());
        self
    }
}

/// Pass-through storage for the universal tables
///
/// Implementations perform one backend call per method; nothing here spans
/// several statements.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert a fully prepared row and return it as stored
    async fn insert(&self, table: Table, row: Row) -> Result<Row>;

    /// Select rows matching the query
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Row>>;

    /// Merge `changes` into the row with this id that also matches `scope`
    ///
    /// Returns `None` when no such row exists.
    async fn update(&self, table: Table, id: &Uuid, scope: &Row, changes: Row)
    -> Result<Option<Row>>;

    /// Delete the row with this id that also matches `scope`
    async fn delete(&self, table: Table, id: &Uuid, scope: &Row) -> Result<Option<Row>>;

    /// Delete every row matching `filter`, returning the count
    async fn delete_where(&self, table: Table, filter: &Row) -> Result<usize>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}

/// Whether a row satisfies an equality filter
///
/// Values compare as JSON, except that numbers compare numerically and a
/// string filter matches a number or boolean with the same text (query
/// strings arrive untyped).
pub fn matches_filter(row: &Row, filter: &Row) -> bool {
    filter.iter().all(|(column, expected)| match row.get(column) {
        Some(actual) => values_equal(actual, expected),
        None => expected.is_null(),
    })
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(a), Value::String(b)) => b.parse::<f64>().ok() == a.as_f64(),
        (Value::Bool(a), Value::String(b)) => b.parse::<bool>().ok() == Some(*a),
        _ => actual == expected,
    }
}

/// Newest first by `created_at`; rows without a timestamp sort last
pub fn compare_created_desc(a: &Row, b: &Row) -> Ordering {
    let key = |row: &Row| {
        row.get("created_at")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
    };
    key(b).cmp(&key(a))
}
