//! In-memory implementation of TableStore for development and tests

use crate::core::store::{SelectQuery, TableStore, compare_created_desc, matches_filter};
use crate::core::table::{Row, Table, row_id};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory table store
///
/// Uses RwLock for thread-safe access. Clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<Table, Vec<Row>>>>,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table
    pub fn len(&self, table: Table) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(&table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Whether a table holds no rows
    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        let id = row_id(&row).ok_or_else(|| anyhow!("{} row has no valid id", table))?;

        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let rows = tables.entry(table).or_default();
        if rows.iter().any(|r| row_id(r) == Some(id)) {
            return Err(anyhow!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                table
            ));
        }
        rows.push(row.clone());

        Ok(row)
    }

    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Row>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut rows: Vec<Row> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filter(row, &query.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Stored in insertion order; reverse first so equal timestamps keep newest first
        rows.reverse();
        rows.sort_by(compare_created_desc);

        Ok(rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn update(
        &self,
        table: Table,
        id: &Uuid,
        scope: &Row,
        changes: Row,
    ) -> Result<Option<Row>> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(row) = tables.get_mut(&table).and_then(|rows| {
            rows.iter_mut()
                .find(|row| row_id(row) == Some(*id) && matches_filter(row, scope))
        }) else {
            return Ok(None);
        };

        for (column, value) in changes {
            row.insert(column, value);
        }

        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: Table, id: &Uuid, scope: &Row) -> Result<Option<Row>> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(rows) = tables.get_mut(&table) else {
            return Ok(None);
        };

        let position = rows
            .iter()
            .position(|row| row_id(row) == Some(*id) && matches_filter(row, scope));

        Ok(position.map(|index| rows.remove(index)))
    }

    async fn delete_where(&self, table: Table, filter: &Row) -> Result<usize> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(rows) = tables.get_mut(&table) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|row| !matches_filter(row, filter));

        Ok(before - rows.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
