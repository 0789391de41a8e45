//! End-to-end tests for `/api/v1/universal`
//!
//! Every test drives the full router over an in-memory store, or over no
//! store at all for the mock fallback.

use axum::http::StatusCode;
use axum_test::TestServer;
use hera::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

const UNIVERSAL: &str = "/api/v1/universal";

fn create_test_server() -> (TestServer, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let app = ServerBuilder::new(HeraConfig::default())
        .with_store(Some(store.clone() as Arc<dyn TableStore>))
        .build()
        .expect("Failed to build router");
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, store)
}

fn create_mock_server() -> TestServer {
    let app = ServerBuilder::new(HeraConfig::default())
        .build()
        .expect("Failed to build router");
    TestServer::new(app).expect("Failed to create test server")
}

async fn create_entity(server: &TestServer, org: Uuid, name: &str, entity_type: &str) -> Value {
    let response = server
        .post(UNIVERSAL)
        .json(&json!({
            "table": "core_entities",
            "organization_id": org,
            "data": {
                "entity_type": entity_type,
                "entity_name": name,
                "smart_code": "HERA.CRM.CUSTOMER.RETAIL.ACTIVE.v1"
            }
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"].clone()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_backend() {
        let (server, _) = create_test_server();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "memory");

        server.get("/healthz").await.assert_status_ok();
    }
}

mod schema {
    use super::*;

    #[tokio::test]
    async fn test_catalog_lists_six_tables() {
        let (server, _) = create_test_server();

        let response = server.get(&format!("{}?action=schema", UNIVERSAL)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], 6);
        assert_eq!(body["data"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_table_schema_names_required_fields() {
        let (server, _) = create_test_server();

        let response = server
            .get(&format!("{}?action=schema&table=core_entities", UNIVERSAL))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        let required = body["data"]["required_fields"].as_array().unwrap();
        assert!(required.contains(&json!("entity_name")));
        assert!(required.contains(&json!("smart_code")));
    }
}

mod crud {
    use super::*;

    #[tokio::test]
    async fn test_create_fills_system_columns() {
        let (server, store) = create_test_server();
        let org = Uuid::new_v4();

        let row = create_entity(&server, org, "Acme Retail", "customer").await;

        assert!(row["id"].as_str().unwrap().parse::<Uuid>().is_ok());
        assert_eq!(row["organization_id"], org.to_string());
        assert_eq!(row["status"], "active");
        assert!(row["created_at"].is_string());
        assert_eq!(store.len(Table::CoreEntities), 1);
    }

    #[tokio::test]
    async fn test_read_is_scoped_to_organization() {
        let (server, _) = create_test_server();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();

        create_entity(&server, org_a, "Alpha", "customer").await;
        create_entity(&server, org_a, "Beta", "customer").await;
        create_entity(&server, org_b, "Gamma", "customer").await;

        let response = server
            .get(&format!(
                "{}?table=core_entities&organization_id={}",
                UNIVERSAL, org_a
            ))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], 2);
        for row in body["data"].as_array().unwrap() {
            assert_eq!(row["organization_id"], org_a.to_string());
        }
    }

    #[tokio::test]
    async fn test_read_applies_column_filters_and_limit() {
        let (server, _) = create_test_server();
        let org = Uuid::new_v4();

        create_entity(&server, org, "Alpha", "customer").await;
        create_entity(&server, org, "Beta", "vendor").await;
        create_entity(&server, org, "Gamma", "customer").await;

        let response = server
            .get(&format!(
                "{}?table=core_entities&organization_id={}&entity_type=customer",
                UNIVERSAL, org
            ))
            .await;
        let body: Value = response.json();
        assert_eq!(body["count"], 2);

        let response = server
            .get(&format!(
                "{}?table=core_entities&organization_id={}&limit=1",
                UNIVERSAL, org
            ))
            .await;
        let body: Value = response.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_changes() {
        let (server, _) = create_test_server();
        let org = Uuid::new_v4();
        let row = create_entity(&server, org, "Acme", "customer").await;

        let response = server
            .put(UNIVERSAL)
            .json(&json!({
                "table": "core_entities",
                "organization_id": org,
                "id": row["id"],
                "data": { "entity_name": "Acme Holdings" }
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["entity_name"], "Acme Holdings");
        assert_eq!(body["data"]["entity_type"], "customer");
        assert!(body["data"]["updated_at"].is_string());
    }

    #[tokio::test]
    async fn test_update_in_other_organization_is_not_found() {
        let (server, _) = create_test_server();
        let row = create_entity(&server, Uuid::new_v4(), "Acme", "customer").await;

        let response = server
            .put(UNIVERSAL)
            .json(&json!({
                "table": "core_entities",
                "organization_id": Uuid::new_v4(),
                "id": row["id"],
                "data": { "entity_name": "Stolen" }
            }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_without_organization_is_rejected() {
        let (server, store) = create_test_server();
        let org = Uuid::new_v4();
        let row = create_entity(&server, org, "Acme", "customer").await;

        let response = server
            .put(UNIVERSAL)
            .json(&json!({
                "table": "core_entities",
                "id": row["id"],
                "data": { "entity_name": "Unscoped" }
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "MISSING_ORGANIZATION");

        let rows = store
            .select(Table::CoreEntities, &SelectQuery::default())
            .await
            .unwrap();
        assert_eq!(rows[0]["entity_name"], "Acme");
    }

    #[tokio::test]
    async fn test_delete_without_organization_is_rejected() {
        let (server, store) = create_test_server();
        let org = Uuid::new_v4();
        let row = create_entity(&server, org, "Acme", "customer").await;

        let response = server
            .delete(&format!(
                "{}?table=core_entities&id={}",
                UNIVERSAL,
                row["id"].as_str().unwrap()
            ))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "MISSING_ORGANIZATION");
        assert_eq!(store.len(Table::CoreEntities), 1);
    }

    #[tokio::test]
    async fn test_hard_delete_in_other_organization_keeps_row() {
        let (server, store) = create_test_server();
        let owner = Uuid::new_v4();
        let row = create_entity(&server, owner, "Acme", "customer").await;

        let response = server
            .delete(&format!(
                "{}?table=core_entities&organization_id={}&id={}",
                UNIVERSAL,
                Uuid::new_v4(),
                row["id"].as_str().unwrap()
            ))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
        assert_eq!(store.len(Table::CoreEntities), 1);
    }

    #[tokio::test]
    async fn test_read_filters_on_typed_columns() {
        let (server, _) = create_test_server();
        let org = Uuid::new_v4();
        let transaction_id = Uuid::new_v4();
        for number in 1..=2 {
            server
                .post(UNIVERSAL)
                .json(&json!({
                    "table": "universal_transaction_lines",
                    "organization_id": org,
                    "data": {
                        "transaction_id": transaction_id,
                        "line_number": number,
                        "smart_code": "HERA.P2P.PO.LINE.ITEM.v1",
                        "line_amount": 50.0 * number as f64
                    }
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server
            .get(&format!(
                "{}?table=universal_transaction_lines&organization_id={}&line_number=2",
                UNIVERSAL, org
            ))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["line_amount"], 100.0);

        let response = server
            .get(&format!(
                "{}?table=universal_transaction_lines&organization_id={}&line_number=second",
                UNIVERSAL, org
            ))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_PAYLOAD");
    }

    #[tokio::test]
    async fn test_soft_delete_archives() {
        let (server, _) = create_test_server();
        let org = Uuid::new_v4();
        let row = create_entity(&server, org, "Acme", "customer").await;
        let id = row["id"].as_str().unwrap();

        let response = server
            .delete(&format!(
                "{}?table=core_entities&organization_id={}&id={}&mode=soft",
                UNIVERSAL, org, id
            ))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["data"]["mode"], "soft");

        let response = server
            .get(&format!(
                "{}?table=core_entities&organization_id={}&id={}",
                UNIVERSAL, org, id
            ))
            .await;
        let body: Value = response.json();
        assert_eq!(body["data"][0]["status"], "archived");
    }

    #[tokio::test]
    async fn test_hard_delete_removes_entity_and_fields() {
        let (server, store) = create_test_server();
        let org = Uuid::new_v4();
        let row = create_entity(&server, org, "Acme", "customer").await;
        let id = row["id"].as_str().unwrap();

        server
            .post(UNIVERSAL)
            .json(&json!({
                "table": "core_dynamic_data",
                "organization_id": org,
                "data": {
                    "entity_id": id,
                    "field_name": "credit_limit",
                    "field_type": "number",
                    "field_value_number": 5000,
                    "smart_code": "HERA.CRM.CUSTOMER.FIELD.CREDIT.v1"
                }
            }))
            .await
            .assert_status(StatusCode::CREATED);
        assert_eq!(store.len(Table::CoreDynamicData), 1);

        let response = server
            .delete(&format!(
                "{}?table=core_entities&organization_id={}&id={}",
                UNIVERSAL, org, id
            ))
            .await;
        response.assert_status_ok();
        assert_eq!(store.len(Table::CoreEntities), 0);
        assert_eq!(store.len(Table::CoreDynamicData), 0);
    }

    #[tokio::test]
    async fn test_batch_create_inserts_every_row() {
        let (server, store) = create_test_server();
        let org = Uuid::new_v4();

        let response = server
            .post(UNIVERSAL)
            .json(&json!({
                "action": "batch_create",
                "table": "core_entities",
                "organization_id": org,
                "data": [
                    { "entity_type": "product", "entity_name": "Widget", "smart_code": "HERA.INV.PRODUCT.ITEM.STD.v1" },
                    { "entity_type": "product", "entity_name": "Gadget", "smart_code": "HERA.INV.PRODUCT.ITEM.STD.v1" }
                ]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Value>()["count"], 2);
        assert_eq!(store.len(Table::CoreEntities), 2);
    }

    #[tokio::test]
    async fn test_organizations_need_no_scope() {
        let (server, _) = create_test_server();

        server
            .post(UNIVERSAL)
            .json(&json!({
                "table": "core_organizations",
                "data": { "organization_name": "Acme Group", "organization_code": "ACME" }
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get(&format!("{}?table=core_organizations", UNIVERSAL))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["count"], 1);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_validate_reports_without_writing() {
        let (server, store) = create_test_server();

        let response = server
            .post(UNIVERSAL)
            .json(&json!({
                "action": "validate",
                "table": "core_entities",
                "organization_id": Uuid::new_v4(),
                "data": { "entity_type": "customer", "colour": "blue" }
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["valid"], false);
        assert!(
            body["data"]["missing_fields"]
                .as_array()
                .unwrap()
                .contains(&json!("entity_name"))
        );
        assert_eq!(body["data"]["unknown_fields"], json!(["colour"]));
        assert_eq!(store.len(Table::CoreEntities), 0);
    }

    #[tokio::test]
    async fn test_batch_reports_missing_fields_per_row() {
        let (server, store) = create_test_server();

        let response = server
            .post(UNIVERSAL)
            .json(&json!({
                "action": "batch_create",
                "table": "core_entities",
                "organization_id": Uuid::new_v4(),
                "data": [
                    { "entity_type": "product", "entity_name": "Widget", "smart_code": "HERA.INV.PRODUCT.ITEM.STD.v1" },
                    { "entity_type": "product" }
                ]
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "MISSING_FIELDS");
        assert_eq!(body["details"]["rows"][0]["index"], 1);
        assert_eq!(store.len(Table::CoreEntities), 0);
    }

    #[tokio::test]
    async fn test_soft_delete_without_status_column_is_rejected() {
        let (server, _) = create_test_server();

        let response = server
            .delete(&format!(
                "{}?table=universal_transaction_lines&organization_id={}&id={}&mode=soft",
                UNIVERSAL,
                Uuid::new_v4(),
                Uuid::new_v4()
            ))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_PAYLOAD");
    }
}

mod mock_fallback {
    use super::*;

    #[tokio::test]
    async fn test_read_serves_mock_rows() {
        let server = create_mock_server();

        let response = server
            .get(&format!(
                "{}?table=core_entities&organization_id={}",
                UNIVERSAL,
                hera::storage::mock::MOCK_ORGANIZATION_ID
            ))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["mock"], true);
        assert!(body["count"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_create_echoes_prepared_row() {
        let server = create_mock_server();
        let org = Uuid::new_v4();

        let response = server
            .post(UNIVERSAL)
            .json(&json!({
                "table": "core_entities",
                "organization_id": org,
                "data": {
                    "entity_type": "customer",
                    "entity_name": "Echo",
                    "smart_code": "HERA.CRM.CUSTOMER.RETAIL.ACTIVE.v1"
                }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["mock"], true);
        assert_eq!(body["data"]["entity_name"], "Echo");
        assert!(body["data"]["id"].is_string());
    }
}
