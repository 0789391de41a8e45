//! PostgreSQL storage backend using sqlx.
//!
//! Rows travel as JSONB: filters use `to_jsonb(t) @> $filter` and writes go
//! through `jsonb_populate_record`, so every value is a bound parameter.
//! String filter values on number and boolean columns are typed first, since
//! JSONB containment never equates `"1"` with `1`.
//! Column names are the only identifiers spliced into SQL and each one is
//! checked against the table descriptor first.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! hera-rs = { version = "0.1", features = ["postgres"] }
//! ```

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use uuid::Uuid;

use crate::core::store::{SelectQuery, TableStore};
use crate::core::table::{Row, Table, typed_filter};

/// Table store backed by a PostgreSQL connection pool
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new `PostgresStore` with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a fresh pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        tracing::info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Apply the bundled migrations that create the six tables
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("universal schema migrations applied");
        Ok(())
    }

    /// Validated, quoted column list for the keys of a row
    fn columns(table: Table, row: &Row) -> Result<Vec<String>> {
        let descriptor = table.descriptor();
        row.keys()
            .map(|column| {
                if descriptor.is_column(column) {
                    Ok(format!("\"{}\"", column))
                } else {
                    Err(anyhow!(
                        "column \"{}\" of relation \"{}\" does not exist",
                        column,
                        table
                    ))
                }
            })
            .collect()
    }

    fn decode(value: Value) -> Result<Row> {
        match value {
            Value::Object(row) => Ok(row),
            other => Err(anyhow!("expected a JSON row, got {}", other)),
        }
    }
}

#[async_trait]
impl TableStore for PostgresStore {
    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        let columns = Self::columns(table, &row)?.join(", ");
        let sql = format!(
            "INSERT INTO {table} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING to_jsonb(t)"
        );

        let stored: Value = sqlx::query_scalar(&sql)
            .bind(Json(Value::Object(row)))
            .fetch_one(&self.pool)
            .await?;

        Self::decode(stored)
    }

    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Row>> {
        // Filter columns must exist so a typo fails loudly instead of matching nothing
        Self::columns(table, &query.filter)?;

        let sql = format!(
            "SELECT to_jsonb(t) FROM {table} t \
             WHERE to_jsonb(t) @> $1 \
             ORDER BY t.created_at DESC \
             LIMIT $2 OFFSET $3"
        );

        let limit = query.limit.map(|l| l as i64);
        let rows: Vec<Value> = sqlx::query_scalar(&sql)
            .bind(Json(Value::Object(typed_filter(&query.filter))))
            .bind(limit)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::decode).collect()
    }

    async fn update(
        &self,
        table: Table,
        id: &Uuid,
        scope: &Row,
        changes: Row,
    ) -> Result<Option<Row>> {
        if changes.is_empty() {
            let query = SelectQuery::new(scope.clone()).eq("id", id.to_string());
            return Ok(self.select(table, &query).await?.into_iter().next());
        }

        let assignments = Self::columns(table, &changes)?
            .iter()
            .map(|column| format!("{column} = r.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {table} AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::{table}, $1) AS r \
             WHERE t.id = $2 AND to_jsonb(t) @> $3 \
             RETURNING to_jsonb(t)"
        );

        let updated: Option<Value> = sqlx::query_scalar(&sql)
            .bind(Json(Value::Object(changes)))
            .bind(id)
            .bind(Json(Value::Object(scope.clone())))
            .fetch_optional(&self.pool)
            .await?;

        updated.map(Self::decode).transpose()
    }

    async fn delete(&self, table: Table, id: &Uuid, scope: &Row) -> Result<Option<Row>> {
        let sql = format!(
            "DELETE FROM {table} AS t WHERE t.id = $1 AND to_jsonb(t) @> $2 RETURNING to_jsonb(t)"
        );

        let deleted: Option<Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(Json(Value::Object(scope.clone())))
            .fetch_optional(&self.pool)
            .await?;

        deleted.map(Self::decode).transpose()
    }

    async fn delete_where(&self, table: Table, filter: &Row) -> Result<usize> {
        Self::columns(table, filter)?;
        let sql = format!("DELETE FROM {table} AS t WHERE to_jsonb(t) @> $1");

        let result = sqlx::query(&sql)
            .bind(Json(Value::Object(typed_filter(filter))))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
