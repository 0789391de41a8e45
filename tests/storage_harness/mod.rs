//! Shared test harness for storage backend testing
//!
//! Provides row builders for the six tables and the `table_store_tests!`
//! macro, which checks any `TableStore` against the storage contract.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//!
//! table_store_tests!(InMemoryStore::new());
//! ```

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use hera::core::model::{CoreEntity, DynamicField, TableRecord, TransactionLine};
use hera::core::table::{Row, Table};
use serde_json::Value;
use uuid::Uuid;

/// A prepared entity row with a fixed creation time
pub fn entity_row(org: Uuid, entity_type: &str, name: &str, created_at: DateTime<Utc>) -> Row {
    let entity = CoreEntity::new(org, entity_type, name, "HERA.TEST.ENTITY.ROW.STD.v1");
    let mut row = entity.to_row().unwrap();
    row.insert("created_at".into(), Value::String(created_at.to_rfc3339()));
    Table::CoreEntities.descriptor().prepare_insert(row, created_at)
}

/// Entity rows created one minute apart, oldest first
pub fn entity_rows(org: Uuid, entity_type: &str, count: usize) -> Vec<Row> {
    let start = Utc::now() - Duration::hours(1);
    (0..count)
        .map(|i| {
            entity_row(
                org,
                entity_type,
                &format!("{} {}", entity_type, i),
                start + Duration::minutes(i as i64),
            )
        })
        .collect()
}

/// A prepared numeric dynamic field row
pub fn number_field_row(org: Uuid, entity_id: Uuid, name: &str, value: f64) -> Row {
    let field = DynamicField {
        id: Uuid::new_v4(),
        organization_id: org,
        entity_id,
        field_name: name.to_string(),
        smart_code: "HERA.TEST.FIELD.NUMBER.STD.v1".to_string(),
        field_type: Some("number".to_string()),
    };
    let mut row = field.to_row().unwrap();
    row.insert("field_value_number".into(), serde_json::json!(value));
    Table::CoreDynamicData
        .descriptor()
        .prepare_insert(row, Utc::now())
}

/// A prepared boolean dynamic field row
pub fn flag_field_row(org: Uuid, entity_id: Uuid, name: &str, value: bool) -> Row {
    let field = DynamicField {
        id: Uuid::new_v4(),
        organization_id: org,
        entity_id,
        field_name: name.to_string(),
        smart_code: "HERA.TEST.FIELD.FLAG.STD.v1".to_string(),
        field_type: Some("boolean".to_string()),
    };
    let mut row = field.to_row().unwrap();
    row.insert("field_value_boolean".into(), Value::Bool(value));
    Table::CoreDynamicData
        .descriptor()
        .prepare_insert(row, Utc::now())
}

/// A prepared transaction line row
pub fn line_row(org: Uuid, transaction_id: Uuid, line_number: u32, amount: f64) -> Row {
    let line = TransactionLine {
        id: Uuid::new_v4(),
        organization_id: org,
        transaction_id,
        line_number,
        smart_code: "HERA.TEST.TXN.LINE.STD.v1".to_string(),
        entity_id: None,
        line_type: Some("item".to_string()),
        description: None,
        quantity: 1.0,
        unit_amount: amount,
        line_amount: amount,
        line_data: None,
    };
    Table::UniversalTransactionLines
        .descriptor()
        .prepare_insert(line.to_row().unwrap(), Utc::now())
}

/// The `id` of a row
pub fn id_of(row: &Row) -> Uuid {
    hera::core::table::row_id(row).expect("row has a UUID id")
}

/// A JSON object literal as a `Row`
pub fn json_row(value: Value) -> Row {
    value.as_object().cloned().expect("row literal is an object")
}

/// Generate a `TableStore` conformance test suite.
///
/// `$factory` must evaluate to a value implementing `TableStore` with empty
/// tables. It is re-evaluated for each test and may contain `.await`.
#[macro_export]
macro_rules! table_store_tests {
    ($factory:expr) => {
        mod table_store_contract_tests {
            use super::*;
            use hera::core::store::{SelectQuery, TableStore};
            use hera::core::table::{Table, org_scope};
            use serde_json::json;
            use uuid::Uuid;

            // ==================================================================
            // Insert & Select
            // ==================================================================

            #[tokio::test]
            async fn test_insert_and_select_by_id() {
                let store = $factory;
                let org = Uuid::new_v4();
                let row = entity_row(org, "customer", "Acme", chrono::Utc::now());
                let id = id_of(&row);

                let stored = store.insert(Table::CoreEntities, row).await.unwrap();
                assert_eq!(id_of(&stored), id);
                assert_eq!(stored["entity_name"], "Acme");
                assert_eq!(stored["status"], "active");

                let query = SelectQuery::default().eq("id", id.to_string());
                let found = store.select(Table::CoreEntities, &query).await.unwrap();
                assert_eq!(found.len(), 1);
                assert_eq!(found[0]["entity_type"], "customer");
            }

            #[tokio::test]
            async fn test_select_empty_table() {
                let store = $factory;
                let rows = store
                    .select(Table::CoreRelationships, &SelectQuery::default())
                    .await
                    .unwrap();
                assert!(rows.is_empty());
            }

            #[tokio::test]
            async fn test_duplicate_id_is_rejected() {
                let store = $factory;
                let row = entity_row(Uuid::new_v4(), "customer", "Twice", chrono::Utc::now());

                store.insert(Table::CoreEntities, row.clone()).await.unwrap();
                assert!(store.insert(Table::CoreEntities, row).await.is_err());
            }

            // ==================================================================
            // Filtering & Paging
            // ==================================================================

            #[tokio::test]
            async fn test_select_is_scoped_to_organization() {
                let store = $factory;
                let (org_a, org_b) = (Uuid::new_v4(), Uuid::new_v4());
                for row in entity_rows(org_a, "customer", 3) {
                    store.insert(Table::CoreEntities, row).await.unwrap();
                }
                for row in entity_rows(org_b, "customer", 2) {
                    store.insert(Table::CoreEntities, row).await.unwrap();
                }

                let query = SelectQuery::new(org_scope(Table::CoreEntities, Some(org_b)));
                let rows = store.select(Table::CoreEntities, &query).await.unwrap();
                assert_eq!(rows.len(), 2);
                assert!(rows.iter().all(|r| r["organization_id"] == org_b.to_string()));
            }

            #[tokio::test]
            async fn test_select_newest_first() {
                let store = $factory;
                let org = Uuid::new_v4();
                for row in entity_rows(org, "vendor", 3) {
                    store.insert(Table::CoreEntities, row).await.unwrap();
                }

                let rows = store
                    .select(Table::CoreEntities, &SelectQuery::default())
                    .await
                    .unwrap();
                let names: Vec<&str> = rows
                    .iter()
                    .map(|r| r["entity_name"].as_str().unwrap())
                    .collect();
                assert_eq!(names, vec!["vendor 2", "vendor 1", "vendor 0"]);
            }

            #[tokio::test]
            async fn test_limit_and_offset() {
                let store = $factory;
                let org = Uuid::new_v4();
                for row in entity_rows(org, "product", 5) {
                    store.insert(Table::CoreEntities, row).await.unwrap();
                }

                let query = SelectQuery::default().with_limit(2).with_offset(1);
                let rows = store.select(Table::CoreEntities, &query).await.unwrap();
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0]["entity_name"], "product 3");
                assert_eq!(rows[1]["entity_name"], "product 2");
            }

            #[tokio::test]
            async fn test_filter_on_several_columns() {
                let store = $factory;
                let org = Uuid::new_v4();
                for row in entity_rows(org, "customer", 2) {
                    store.insert(Table::CoreEntities, row).await.unwrap();
                }
                for row in entity_rows(org, "vendor", 2) {
                    store.insert(Table::CoreEntities, row).await.unwrap();
                }

                let query = SelectQuery::default()
                    .eq("organization_id", org.to_string())
                    .eq("entity_type", "vendor")
                    .eq("entity_name", "vendor 1");
                let rows = store.select(Table::CoreEntities, &query).await.unwrap();
                assert_eq!(rows.len(), 1);
            }

            #[tokio::test]
            async fn test_filter_on_typed_values() {
                let store = $factory;
                let org = Uuid::new_v4();
                let entity_id = Uuid::new_v4();
                let transaction_id = Uuid::new_v4();
                store
                    .insert(
                        Table::CoreDynamicData,
                        number_field_row(org, entity_id, "credit_limit", 2500.5),
                    )
                    .await
                    .unwrap();
                for (number, amount) in [(1, 10.0), (2, 20.0)] {
                    store
                        .insert(
                            Table::UniversalTransactionLines,
                            line_row(org, transaction_id, number, amount),
                        )
                        .await
                        .unwrap();
                }

                let query = SelectQuery::default().eq("field_value_number", json!(2500.5));
                let fields = store.select(Table::CoreDynamicData, &query).await.unwrap();
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0]["field_name"], "credit_limit");

                let query = SelectQuery::default()
                    .eq("transaction_id", transaction_id.to_string())
                    .eq("line_number", json!(2));
                let lines = store
                    .select(Table::UniversalTransactionLines, &query)
                    .await
                    .unwrap();
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0]["line_amount"].as_f64(), Some(20.0));
            }

            #[tokio::test]
            async fn test_filter_with_untyped_strings() {
                let store = $factory;
                let org = Uuid::new_v4();
                let entity_id = Uuid::new_v4();
                let transaction_id = Uuid::new_v4();
                for (number, amount) in [(1, 10.0), (2, 20.0)] {
                    store
                        .insert(
                            Table::UniversalTransactionLines,
                            line_row(org, transaction_id, number, amount),
                        )
                        .await
                        .unwrap();
                }
                store
                    .insert(Table::CoreDynamicData, flag_field_row(org, entity_id, "vip", true))
                    .await
                    .unwrap();
                store
                    .insert(
                        Table::CoreDynamicData,
                        number_field_row(org, entity_id, "credit_limit", 100.0),
                    )
                    .await
                    .unwrap();

                // Query strings arrive as text whatever the column type
                let query = SelectQuery::default()
                    .eq("line_number", "2")
                    .eq("line_amount", "20");
                let lines = store
                    .select(Table::UniversalTransactionLines, &query)
                    .await
                    .unwrap();
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0]["line_number"], json!(2));

                let query = SelectQuery::default().eq("field_value_boolean", "true");
                let flags = store.select(Table::CoreDynamicData, &query).await.unwrap();
                assert_eq!(flags.len(), 1);
                assert_eq!(flags[0]["field_name"], "vip");

                let filter = json_row(json!({ "field_value_number": "100" }));
                let removed = store
                    .delete_where(Table::CoreDynamicData, &filter)
                    .await
                    .unwrap();
                assert_eq!(removed, 1);
            }

            // ==================================================================
            // Update
            // ==================================================================

            #[tokio::test]
            async fn test_update_merges_changes() {
                let store = $factory;
                let org = Uuid::new_v4();
                let row = entity_row(org, "customer", "Before", chrono::Utc::now());
                let id = id_of(&row);
                store.insert(Table::CoreEntities, row).await.unwrap();

                let updated = store
                    .update(
                        Table::CoreEntities,
                        &id,
                        &org_scope(Table::CoreEntities, Some(org)),
                        json_row(json!({ "entity_name": "After", "status": "inactive" })),
                    )
                    .await
                    .unwrap()
                    .expect("row is in scope");
                assert_eq!(updated["entity_name"], "After");
                assert_eq!(updated["status"], "inactive");
                assert_eq!(updated["entity_type"], "customer");
            }

            #[tokio::test]
            async fn test_update_outside_scope_is_none() {
                let store = $factory;
                let row = entity_row(Uuid::new_v4(), "customer", "Owned", chrono::Utc::now());
                let id = id_of(&row);
                store.insert(Table::CoreEntities, row).await.unwrap();

                let other = org_scope(Table::CoreEntities, Some(Uuid::new_v4()));
                let result = store
                    .update(
                        Table::CoreEntities,
                        &id,
                        &other,
                        json_row(json!({ "entity_name": "Hijacked" })),
                    )
                    .await
                    .unwrap();
                assert!(result.is_none());

                let query = SelectQuery::default().eq("id", id.to_string());
                let rows = store.select(Table::CoreEntities, &query).await.unwrap();
                assert_eq!(rows[0]["entity_name"], "Owned");
            }

            #[tokio::test]
            async fn test_update_nonexistent_is_none() {
                let store = $factory;
                let result = store
                    .update(
                        Table::CoreEntities,
                        &Uuid::new_v4(),
                        &hera::core::table::Row::new(),
                        json_row(json!({ "entity_name": "Ghost" })),
                    )
                    .await
                    .unwrap();
                assert!(result.is_none());
            }

            // ==================================================================
            // Delete
            // ==================================================================

            #[tokio::test]
            async fn test_delete_returns_row() {
                let store = $factory;
                let org = Uuid::new_v4();
                let row = entity_row(org, "customer", "Doomed", chrono::Utc::now());
                let id = id_of(&row);
                store.insert(Table::CoreEntities, row).await.unwrap();

                let scope = org_scope(Table::CoreEntities, Some(org));
                let deleted = store
                    .delete(Table::CoreEntities, &id, &scope)
                    .await
                    .unwrap()
                    .expect("row existed");
                assert_eq!(deleted["entity_name"], "Doomed");

                let again = store.delete(Table::CoreEntities, &id, &scope).await.unwrap();
                assert!(again.is_none());
            }

            #[tokio::test]
            async fn test_delete_outside_scope_keeps_row() {
                let store = $factory;
                let row = entity_row(Uuid::new_v4(), "customer", "Kept", chrono::Utc::now());
                let id = id_of(&row);
                store.insert(Table::CoreEntities, row).await.unwrap();

                let other = org_scope(Table::CoreEntities, Some(Uuid::new_v4()));
                let deleted = store.delete(Table::CoreEntities, &id, &other).await.unwrap();
                assert!(deleted.is_none());

                let rows = store
                    .select(Table::CoreEntities, &SelectQuery::default())
                    .await
                    .unwrap();
                assert_eq!(rows.len(), 1);
            }

            #[tokio::test]
            async fn test_delete_where_counts_rows() {
                let store = $factory;
                let org = Uuid::new_v4();
                let (keep, purge) = (Uuid::new_v4(), Uuid::new_v4());
                for name in ["email", "phone", "tier"] {
                    store
                        .insert(Table::CoreDynamicData, number_field_row(org, purge, name, 1.0))
                        .await
                        .unwrap();
                }
                store
                    .insert(Table::CoreDynamicData, number_field_row(org, keep, "tier", 2.0))
                    .await
                    .unwrap();

                let filter = json_row(json!({ "entity_id": purge.to_string() }));
                let removed = store
                    .delete_where(Table::CoreDynamicData, &filter)
                    .await
                    .unwrap();
                assert_eq!(removed, 3);

                let left = store
                    .select(Table::CoreDynamicData, &SelectQuery::default())
                    .await
                    .unwrap();
                assert_eq!(left.len(), 1);
                assert_eq!(left[0]["entity_id"], keep.to_string());
            }

            // ==================================================================
            // Edge Cases
            // ==================================================================

            #[tokio::test]
            async fn test_backend_has_a_name() {
                let store = $factory;
                assert!(!store.backend().is_empty());
            }
        }
    };
}
