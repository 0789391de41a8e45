//! Static demo rows served when no database is configured
//!
//! Front-ends can be developed against the universal API without any
//! database: reads come from this fixed data set and writes are echoed back
//! unpersisted.

use serde_json::{Value, json};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::core::store::{SelectQuery, compare_created_desc, matches_filter};
use crate::core::table::{Row, Table};

/// Organization owning every mock row
pub const MOCK_ORGANIZATION_ID: Uuid = Uuid::from_u128(0x6f1c_2a4e_0000_4000_8000_00000000d3e0);

const ACCOUNT_ID: &str = "0b7b3d38-5d0e-4f6e-9a51-000000000001";
const CONTACT_ID: &str = "0b7b3d38-5d0e-4f6e-9a51-000000000002";
const PRODUCT_ID: &str = "0b7b3d38-5d0e-4f6e-9a51-000000000003";
const ORDER_ID: &str = "0b7b3d38-5d0e-4f6e-9a51-000000000010";

fn dataset() -> &'static Vec<(Table, Row)> {
    static DATASET: OnceLock<Vec<(Table, Row)>> = OnceLock::new();
    DATASET.get_or_init(|| {
        let org = MOCK_ORGANIZATION_ID.to_string();
        let rows = vec![
            (
                Table::CoreOrganizations,
                json!({
                    "id": org,
                    "organization_name": "Mock Trading LLC",
                    "organization_code": "MOCK",
                    "organization_type": "business_unit",
                    "status": "active",
                    "created_at": "2024-01-01T00:00:00+00:00"
                }),
            ),
            (
                Table::CoreEntities,
                json!({
                    "id": ACCOUNT_ID,
                    "organization_id": org,
                    "entity_type": "account",
                    "entity_name": "Global Tech Solutions",
                    "entity_code": "ACC-001",
                    "smart_code": "HERA.CRM.ACCOUNT.ENTERPRISE.ACTIVE.v1",
                    "status": "active",
                    "created_at": "2024-01-02T09:00:00+00:00"
                }),
            ),
            (
                Table::CoreEntities,
                json!({
                    "id": CONTACT_ID,
                    "organization_id": org,
                    "entity_type": "contact",
                    "entity_name": "Sarah Johnson",
                    "entity_code": "CON-001",
                    "smart_code": "HERA.CRM.CONTACT.DECISION_MAKER.v1",
                    "status": "active",
                    "created_at": "2024-01-02T09:05:00+00:00"
                }),
            ),
            (
                Table::CoreEntities,
                json!({
                    "id": PRODUCT_ID,
                    "organization_id": org,
                    "entity_type": "product",
                    "entity_name": "Ergonomic Office Chair",
                    "entity_code": "PRD-001",
                    "smart_code": "HERA.FURNITURE.PRODUCT.CHAIR.v1",
                    "status": "active",
                    "created_at": "2024-01-03T10:00:00+00:00"
                }),
            ),
            (
                Table::CoreDynamicData,
                json!({
                    "id": "0b7b3d38-5d0e-4f6e-9a51-000000000101",
                    "organization_id": org,
                    "entity_id": ACCOUNT_ID,
                    "field_name": "annual_revenue",
                    "field_type": "number",
                    "field_value_number": 2500000.0,
                    "smart_code": "HERA.CRM.ACCOUNT.FIELD.REVENUE.v1",
                    "created_at": "2024-01-02T09:01:00+00:00"
                }),
            ),
            (
                Table::CoreRelationships,
                json!({
                    "id": "0b7b3d38-5d0e-4f6e-9a51-000000000201",
                    "organization_id": org,
                    "from_entity_id": ACCOUNT_ID,
                    "to_entity_id": CONTACT_ID,
                    "relationship_type": "account_has_contact",
                    "smart_code": "HERA.CRM.REL.ACCOUNT_CONTACT.v1",
                    "is_bidirectional": false,
                    "created_at": "2024-01-02T09:06:00+00:00"
                }),
            ),
            (
                Table::UniversalTransactions,
                json!({
                    "id": ORDER_ID,
                    "organization_id": org,
                    "transaction_type": "sales_order",
                    "transaction_code": "SO-2024-001",
                    "smart_code": "HERA.FURNITURE.SALES.ORDER.v1",
                    "source_entity_id": ACCOUNT_ID,
                    "total_amount": 1798.0,
                    "transaction_currency_code": "USD",
                    "transaction_status": "confirmed",
                    "created_at": "2024-01-04T14:30:00+00:00"
                }),
            ),
            (
                Table::UniversalTransactionLines,
                json!({
                    "id": "0b7b3d38-5d0e-4f6e-9a51-000000000301",
                    "organization_id": org,
                    "transaction_id": ORDER_ID,
                    "line_number": 1,
                    "entity_id": PRODUCT_ID,
                    "description": "Ergonomic Office Chair",
                    "quantity": 2.0,
                    "unit_amount": 899.0,
                    "line_amount": 1798.0,
                    "smart_code": "HERA.FURNITURE.SALES.ORDER.LINE.v1",
                    "created_at": "2024-01-04T14:30:00+00:00"
                }),
            ),
        ];

        rows.into_iter()
            .filter_map(|(table, value)| match value {
                Value::Object(row) => Some((table, row)),
                _ => None,
            })
            .collect()
    })
}

/// Mock rows of a table matching the query
pub fn select(table: Table, query: &SelectQuery) -> Vec<Row> {
    let mut rows: Vec<Row> = dataset()
        .iter()
        .filter(|(t, row)| *t == table && matches_filter(row, &query.filter))
        .map(|(_, row)| row.clone())
        .collect();
    rows.sort_by(compare_created_desc);
    rows.into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect()
}
