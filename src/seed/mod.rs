//! Demo data for a fresh store
//!
//! One organization with a small CRM book (accounts, contacts and the
//! `account_has_contact` edges between them) and one procure-to-pay chain
//! run through the P2P tools: supplier, purchase order, goods receipt and a
//! matched invoice.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::field::DynamicValue;
use crate::core::model::{Organization, Relationship, TableRecord};
use crate::core::store::{SelectQuery, TableStore};
use crate::core::table::Table;
use crate::mcp::{LocalP2pEngine, P2pTools};
use crate::procedures::{EntityProcedures, StoreProcedures, UpsertEntity};

/// What a seed run produced
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub organization_id: Uuid,
    pub organization_code: String,
    /// `false` when the organization already existed and nothing was written
    pub created: bool,
    pub entities: usize,
    pub dynamic_fields: usize,
    pub relationships: usize,
    pub transactions: usize,
}

struct DemoAccount {
    name: &'static str,
    code: &'static str,
    smart_code: &'static str,
    industry: &'static str,
    annual_revenue: f64,
    contacts: &'static [(&'static str, &'static str, &'static str)],
}

const ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        name: "Northwind Traders",
        code: "ACC-NORTHWIND",
        smart_code: "HERA.CRM.ACCOUNT.ENTERPRISE.ACTIVE.v1",
        industry: "Distribution",
        annual_revenue: 12_500_000.0,
        contacts: &[
            ("Dana Whitfield", "dana@northwind.example", "Procurement Lead"),
            ("Ravi Menon", "ravi@northwind.example", "CFO"),
        ],
    },
    DemoAccount {
        name: "Blue Harbor Clinics",
        code: "ACC-BLUEHARBOR",
        smart_code: "HERA.CRM.ACCOUNT.MIDMARKET.ACTIVE.v1",
        industry: "Healthcare",
        annual_revenue: 3_200_000.0,
        contacts: &[("Sam Okafor", "sam@blueharbor.example", "Operations Manager")],
    },
];

async fn find_organization(store: &dyn TableStore, code: &str) -> Result<Option<Uuid>> {
    let rows = store
        .select(
            Table::CoreOrganizations,
            &SelectQuery::default()
                .eq("organization_code", code)
                .with_limit(1),
        )
        .await?;
    Ok(rows
        .into_iter()
        .next()
        .and_then(|row| row.get("id").and_then(Value::as_str)?.parse().ok()))
}

fn tool_id(result: &Value, key: &str) -> Result<Uuid> {
    result
        .get(key)
        .and_then(Value::as_str)
        .and_then(|id| id.parse().ok())
        .with_context(|| format!("tool result has no {}", key))
}

/// Seed the demo organization `org_code`; a no-op when it already exists
pub async fn seed_demo(store: Arc<dyn TableStore>, org_code: &str) -> Result<SeedReport> {
    if let Some(organization_id) = find_organization(store.as_ref(), org_code).await? {
        tracing::info!(%organization_id, org_code, "demo organization already seeded");
        return Ok(SeedReport {
            organization_id,
            organization_code: org_code.to_string(),
            created: false,
            entities: 0,
            dynamic_fields: 0,
            relationships: 0,
            transactions: 0,
        });
    }

    let organization = Organization {
        id: Uuid::new_v4(),
        organization_name: format!("{} Demo Company", org_code),
        organization_code: org_code.to_string(),
        organization_type: Some("demo".to_string()),
        industry_classification: Some("services".to_string()),
        settings: Some(json!({ "currency": "USD" })),
        status: Some("active".to_string()),
        created_at: None,
    };
    let row = Table::CoreOrganizations
        .descriptor()
        .prepare_insert(organization.to_row()?, Utc::now());
    store.insert(Table::CoreOrganizations, row).await?;
    let org = organization.id;

    let mut report = SeedReport {
        organization_id: org,
        organization_code: org_code.to_string(),
        created: true,
        entities: 0,
        dynamic_fields: 0,
        relationships: 0,
        transactions: 0,
    };

    seed_crm(&store, org, &mut report).await?;
    seed_p2p(&store, org, &mut report).await?;

    tracing::info!(
        organization_id = %org,
        org_code,
        entities = report.entities,
        relationships = report.relationships,
        transactions = report.transactions,
        "demo data seeded"
    );
    Ok(report)
}

async fn seed_crm(store: &Arc<dyn TableStore>, org: Uuid, report: &mut SeedReport) -> Result<()> {
    let procedures = StoreProcedures::new(store.clone());

    for account in ACCOUNTS {
        let account_id = procedures
            .entity_upsert(
                org,
                UpsertEntity {
                    entity_type: "account".to_string(),
                    entity_name: account.name.to_string(),
                    smart_code: account.smart_code.to_string(),
                    entity_code: Some(account.code.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        report.entities += 1;

        procedures
            .dynamic_data_set(
                org,
                account_id,
                "industry",
                &DynamicValue::Text(account.industry.to_string()),
                "HERA.CRM.ACCOUNT.FIELD.INDUSTRY.v1",
            )
            .await?;
        procedures
            .dynamic_data_set(
                org,
                account_id,
                "annual_revenue",
                &DynamicValue::Number(account.annual_revenue),
                "HERA.CRM.ACCOUNT.FIELD.REVENUE.v1",
            )
            .await?;
        report.dynamic_fields += 2;

        for (name, email, title) in account.contacts {
            let contact_id = procedures
                .entity_upsert(
                    org,
                    UpsertEntity {
                        entity_type: "contact".to_string(),
                        entity_name: name.to_string(),
                        smart_code: "HERA.CRM.CONTACT.PERSON.ACTIVE.v1".to_string(),
                        parent_entity_id: Some(account_id),
                        ..Default::default()
                    },
                )
                .await?;
            report.entities += 1;

            for (field, value) in [("email", email), ("job_title", title)] {
                procedures
                    .dynamic_data_set(
                        org,
                        contact_id,
                        field,
                        &DynamicValue::Text(value.to_string()),
                        &format!("HERA.CRM.CONTACT.FIELD.{}.v1", field.to_uppercase()),
                    )
                    .await?;
                report.dynamic_fields += 1;
            }

            let mut edge = Relationship::new(
                org,
                account_id,
                contact_id,
                "account_has_contact",
                "HERA.CRM.REL.ACCOUNT.CONTACT.v1",
            );
            edge.relationship_data = Some(json!({ "role": title }));
            let row = Table::CoreRelationships
                .descriptor()
                .prepare_insert(edge.to_row()?, Utc::now());
            store.insert(Table::CoreRelationships, row).await?;
            report.relationships += 1;
        }
    }
    Ok(())
}

async fn seed_p2p(store: &Arc<dyn TableStore>, org: Uuid, report: &mut SeedReport) -> Result<()> {
    let tools = P2pTools::new(store.clone(), Arc::new(LocalP2pEngine::default()), 2.0);

    let supplier = tools
        .call(
            "p2p.create_supplier",
            json!({
                "organization_id": org,
                "supplier_name": "Summit Office Supply",
                "supplier_code": "SUP-SUMMIT",
                "payment_terms": "NET30",
                "email": "ap@summit.example"
            }),
        )
        .await?;
    let supplier_id = tool_id(&supplier, "supplier_id")?;
    report.entities += 1;
    report.dynamic_fields += 2;

    let po = tools
        .call(
            "p2p.create_po",
            json!({
                "organization_id": org,
                "supplier_id": supplier_id,
                "lines": [
                    { "description": "Ergonomic chair", "quantity": 10, "unit_price": 240.0 },
                    { "description": "Standing desk", "quantity": 4, "unit_price": 610.0 }
                ]
            }),
        )
        .await?;
    let po_id = tool_id(&po, "po_id")?;

    tools
        .call(
            "p2p.post_grn",
            json!({
                "organization_id": org,
                "po_id": po_id,
                "lines": [
                    { "line_number": 1, "quantity_received": 10 },
                    { "line_number": 2, "quantity_received": 4 }
                ]
            }),
        )
        .await?;

    tools
        .call(
            "p2p.match_invoice",
            json!({
                "organization_id": org,
                "po_id": po_id,
                "invoice_number": "INV-SUMMIT-1001",
                "invoice_amount": 4840.0
            }),
        )
        .await?;
    report.transactions += 3;

    Ok(())
}
