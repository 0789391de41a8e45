//! The named entity procedures behind the v2 entity API
//!
//! The hosted platform ships these as database functions. Here they are a
//! trait so the HTTP layer does not care where they run; [`StoreProcedures`]
//! implements them on top of any [`TableStore`](crate::core::TableStore).
//!
//! | Procedure | Method |
//! |---|---|
//! | `hera_entity_upsert_v1` | [`EntityProcedures::entity_upsert`] |
//! | `hera_dynamic_data_set_v1` | [`EntityProcedures::dynamic_data_set`] |
//! | `hera_entity_read_v1` | [`EntityProcedures::entity_read`] |
//! | `hera_entity_delete_v1` | [`EntityProcedures::entity_delete`] |

pub mod lifecycle;
pub mod store;

pub use store::StoreProcedures;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::error::ProcedureError;
use crate::core::field::DynamicValue;
use crate::core::table::Row;

pub const ENTITY_UPSERT: &str = "hera_entity_upsert_v1";
pub const DYNAMIC_DATA_SET: &str = "hera_dynamic_data_set_v1";
pub const ENTITY_READ: &str = "hera_entity_read_v1";
pub const ENTITY_DELETE: &str = "hera_entity_delete_v1";

/// Status matching every entity in a read
pub const ANY_STATUS: &str = "all";

/// Entity columns accepted by an upsert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertEntity {
    /// Update this entity when it exists in the organization
    pub entity_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_name: String,
    pub smart_code: String,
    pub entity_code: Option<String>,
    pub entity_description: Option<String>,
    pub parent_entity_id: Option<Uuid>,
    pub status: Option<String>,
    pub metadata: Option<Value>,
}

/// Parameters of an entity read
#[derive(Debug, Clone)]
pub struct EntityReadQuery {
    pub entity_id: Option<Uuid>,
    pub entity_type: Option<String>,
    /// `None` reads active entities; [`ANY_STATUS`] disables the status filter
    pub status: Option<String>,
    pub include_dynamic_data: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for EntityReadQuery {
    fn default() -> Self {
        Self {
            entity_id: None,
            entity_type: None,
            status: None,
            include_dynamic_data: false,
            limit: 100,
            offset: 0,
        }
    }
}

/// A dynamic field as returned by reads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicFieldView {
    pub value: Value,
    pub field_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_code: Option<String>,
}

impl DynamicFieldView {
    pub fn new(value: &DynamicValue, smart_code: Option<String>) -> Self {
        Self {
            value: value.to_json(),
            field_type: value.field_type().as_str(),
            smart_code,
        }
    }
}

/// An entity row, optionally with its dynamic fields keyed by name
#[derive(Debug, Clone, Serialize)]
pub struct EntityWithDynamicData {
    #[serde(flatten)]
    pub entity: Row,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_data: Option<IndexMap<String, DynamicFieldView>>,
}

/// How to delete an entity
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeleteOptions {
    /// Remove rows instead of archiving
    #[serde(default)]
    pub hard_delete: bool,
    /// With a hard delete, also remove relationships touching the entity
    #[serde(default)]
    pub cascade_relationships: bool,
}

/// What a delete did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub entity_id: Uuid,
    pub mode: DeleteMode,
    pub dynamic_fields_removed: usize,
    pub relationships_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    Soft,
    Hard,
}

/// The four entity procedures
#[async_trait]
pub trait EntityProcedures: Send + Sync {
    /// `hera_entity_upsert_v1`: returns the entity id
    async fn entity_upsert(
        &self,
        organization_id: Uuid,
        input: UpsertEntity,
    ) -> Result<Uuid, ProcedureError>;

    /// `hera_dynamic_data_set_v1`: returns the dynamic data row id
    async fn dynamic_data_set(
        &self,
        organization_id: Uuid,
        entity_id: Uuid,
        field_name: &str,
        value: &DynamicValue,
        smart_code: &str,
    ) -> Result<Uuid, ProcedureError>;

    /// `hera_entity_read_v1`
    async fn entity_read(
        &self,
        organization_id: Uuid,
        query: &EntityReadQuery,
    ) -> Result<Vec<EntityWithDynamicData>, ProcedureError>;

    /// `hera_entity_delete_v1`
    async fn entity_delete(
        &self,
        organization_id: Uuid,
        entity_id: Uuid,
        options: DeleteOptions,
    ) -> Result<DeleteOutcome, ProcedureError>;
}
