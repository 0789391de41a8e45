//! Typed views over the six universal tables
//!
//! The stores speak untyped [`Row`]s. The service code that builds rows
//! itself (seed data, P2P tools, procedures) goes through these structs so
//! column names live in one place.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::table::{Row, Table};

/// A struct mapped onto one of the six tables
pub trait TableRecord: Serialize + DeserializeOwned {
    const TABLE: Table;

    /// Convert into a row, dropping `None` columns
    fn to_row(&self) -> anyhow::Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
            other => Err(anyhow::anyhow!(
                "{} record serialized to non-object: {}",
                Self::TABLE,
                other
            )),
        }
    }

    /// Build from a stored row
    fn from_row(row: Row) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

/// Tenant boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub organization_name: String,
    pub organization_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TableRecord for Organization {
    const TABLE: Table = Table::CoreOrganizations;
}

/// A typed, named business object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreEntity {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub entity_type: String,
    pub entity_name: String,
    pub smart_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_entity_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TableRecord for CoreEntity {
    const TABLE: Table = Table::CoreEntities;
}

impl CoreEntity {
    pub fn new(
        organization_id: Uuid,
        entity_type: impl Into<String>,
        entity_name: impl Into<String>,
        smart_code: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            entity_type: entity_type.into(),
            entity_name: entity_name.into(),
            smart_code: smart_code.into(),
            entity_code: None,
            entity_description: None,
            parent_entity_id: None,
            status: None,
            metadata: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// A typed attribute attached to one entity
///
/// The value columns are written by [`DynamicValue::write_columns`](super::field::DynamicValue::write_columns).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicField {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub entity_id: Uuid,
    pub field_name: String,
    pub smart_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

impl TableRecord for DynamicField {
    const TABLE: Table = Table::CoreDynamicData;
}

/// A typed, directed edge between two entities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub from_entity_id: Uuid,
    pub to_entity_id: Uuid,
    pub relationship_type: String,
    pub smart_code: String,
    #[serde(default)]
    pub is_bidirectional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_data: Option<Value>,
}

impl TableRecord for Relationship {
    const TABLE: Table = Table::CoreRelationships;
}

impl Relationship {
    pub fn new(
        organization_id: Uuid,
        from_entity_id: Uuid,
        to_entity_id: Uuid,
        relationship_type: impl Into<String>,
        smart_code: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            from_entity_id,
            to_entity_id,
            relationship_type: relationship_type.into(),
            smart_code: smart_code.into(),
            is_bidirectional: false,
            workflow_state: None,
            relationship_data: None,
        }
    }
}

/// A business event header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub transaction_type: String,
    pub smart_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity_id: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_currency_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TableRecord for Transaction {
    const TABLE: Table = Table::UniversalTransactions;
}

impl Transaction {
    pub fn new(
        organization_id: Uuid,
        transaction_type: impl Into<String>,
        smart_code: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            transaction_type: transaction_type.into(),
            smart_code: smart_code.into(),
            transaction_code: None,
            transaction_date: Some(Utc::now()),
            source_entity_id: None,
            target_entity_id: None,
            total_amount: 0.0,
            transaction_currency_code: None,
            transaction_status: None,
            metadata: None,
            created_at: None,
        }
    }

    /// Read a string from the metadata object
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// Read a UUID from the metadata object
    pub fn metadata_uuid(&self, key: &str) -> Option<Uuid> {
        self.metadata_str(key).and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// A line item of a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLine {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub transaction_id: Uuid,
    pub line_number: u32,
    pub smart_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub unit_amount: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub line_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_data: Option<Value>,
}

impl TableRecord for TransactionLine {
    const TABLE: Table = Table::UniversalTransactionLines;
}

/// Amount columns are nullable; a stored null reads as zero
fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}
