//! Entity procedures implemented over a TableStore

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    ANY_STATUS, DYNAMIC_DATA_SET, DeleteOptions, DeleteOutcome, ENTITY_DELETE, ENTITY_READ,
    ENTITY_UPSERT, EntityProcedures, EntityReadQuery, EntityWithDynamicData, UpsertEntity,
    lifecycle,
};
use crate::core::error::ProcedureError;
use crate::core::field::DynamicValue;
use crate::core::model::{CoreEntity, DynamicField, TableRecord};
use crate::core::store::{SelectQuery, TableStore};
use crate::core::table::{Row, Table, org_scope, row_id};

/// Runs the entity procedures against a table store
#[derive(Clone)]
pub struct StoreProcedures {
    store: Arc<dyn TableStore>,
    disabled: Arc<HashSet<String>>,
}

impl StoreProcedures {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            disabled: Arc::new(HashSet::new()),
        }
    }

    /// Treat the named procedures as not installed
    pub fn with_disabled(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.disabled = Arc::new(names.into_iter().collect());
        self
    }

    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    fn ensure_available(&self, procedure: &'static str) -> Result<(), ProcedureError> {
        if self.disabled.contains(procedure) {
            Err(ProcedureError::Unavailable(procedure))
        } else {
            Ok(())
        }
    }
}

fn failed(procedure: &'static str) -> impl Fn(anyhow::Error) -> ProcedureError {
    move |err| ProcedureError::Failed {
        procedure,
        message: err.to_string(),
    }
}

#[async_trait]
impl EntityProcedures for StoreProcedures {
    async fn entity_upsert(
        &self,
        organization_id: Uuid,
        input: UpsertEntity,
    ) -> Result<Uuid, ProcedureError> {
        self.ensure_available(ENTITY_UPSERT)?;
        let store = self.store.as_ref();
        let descriptor = Table::CoreEntities.descriptor();
        let now = Utc::now();

        if let Some(entity_id) = input.entity_id {
            let existing = lifecycle::find_entity(store, organization_id, entity_id)
                .await
                .map_err(failed(ENTITY_UPSERT))?;

            if existing.is_some() {
                let mut changes = Row::new();
                changes.insert("entity_type".into(), Value::String(input.entity_type));
                changes.insert("entity_name".into(), Value::String(input.entity_name));
                changes.insert("smart_code".into(), Value::String(input.smart_code));
                let optional = [
                    ("entity_code", input.entity_code.map(Value::String)),
                    (
                        "entity_description",
                        input.entity_description.map(Value::String),
                    ),
                    (
                        "parent_entity_id",
                        input.parent_entity_id.map(|id| Value::String(id.to_string())),
                    ),
                    ("status", input.status.map(Value::String)),
                    ("metadata", input.metadata),
                ];
                for (column, value) in optional {
                    if let Some(value) = value {
                        changes.insert(column.into(), value);
                    }
                }

                store
                    .update(
                        Table::CoreEntities,
                        &entity_id,
                        &org_scope(Table::CoreEntities, Some(organization_id)),
                        descriptor.prepare_update(changes, now),
                    )
                    .await
                    .map_err(failed(ENTITY_UPSERT))?;

                tracing::debug!(%organization_id, %entity_id, "entity updated");
                return Ok(entity_id);
            }
        }

        let mut entity = CoreEntity::new(
            organization_id,
            input.entity_type,
            input.entity_name,
            input.smart_code,
        );
        if let Some(entity_id) = input.entity_id {
            entity.id = entity_id;
        }
        entity.entity_code = input.entity_code;
        entity.entity_description = input.entity_description;
        entity.parent_entity_id = input.parent_entity_id;
        entity.status = input.status;
        entity.metadata = input.metadata;

        let row = entity.to_row().map_err(failed(ENTITY_UPSERT))?;
        store
            .insert(Table::CoreEntities, descriptor.prepare_insert(row, now))
            .await
            .map_err(failed(ENTITY_UPSERT))?;

        tracing::debug!(%organization_id, entity_id = %entity.id, "entity created");
        Ok(entity.id)
    }

    async fn dynamic_data_set(
        &self,
        organization_id: Uuid,
        entity_id: Uuid,
        field_name: &str,
        value: &DynamicValue,
        smart_code: &str,
    ) -> Result<Uuid, ProcedureError> {
        self.ensure_available(DYNAMIC_DATA_SET)?;
        let store = self.store.as_ref();
        let descriptor = Table::CoreDynamicData.descriptor();
        let now = Utc::now();

        if lifecycle::find_entity(store, organization_id, entity_id)
            .await
            .map_err(failed(DYNAMIC_DATA_SET))?
            .is_none()
        {
            return Err(ProcedureError::EntityNotFound(entity_id));
        }

        let query = SelectQuery::default()
            .eq("organization_id", organization_id.to_string())
            .eq("entity_id", entity_id.to_string())
            .eq("field_name", field_name)
            .with_limit(1);
        let existing = store
            .select(Table::CoreDynamicData, &query)
            .await
            .map_err(failed(DYNAMIC_DATA_SET))?
            .into_iter()
            .next();

        if let Some(field_id) = existing.as_ref().and_then(row_id) {
            let mut changes = Row::new();
            value.write_columns(&mut changes);
            changes.insert("smart_code".into(), Value::String(smart_code.to_string()));

            store
                .update(
                    Table::CoreDynamicData,
                    &field_id,
                    &org_scope(Table::CoreDynamicData, Some(organization_id)),
                    descriptor.prepare_update(changes, now),
                )
                .await
                .map_err(failed(DYNAMIC_DATA_SET))?;
            return Ok(field_id);
        }

        let field = DynamicField {
            id: Uuid::new_v4(),
            organization_id,
            entity_id,
            field_name: field_name.to_string(),
            smart_code: smart_code.to_string(),
            field_type: None,
        };
        let mut row = field.to_row().map_err(failed(DYNAMIC_DATA_SET))?;
        value.write_columns(&mut row);

        store
            .insert(Table::CoreDynamicData, descriptor.prepare_insert(row, now))
            .await
            .map_err(failed(DYNAMIC_DATA_SET))?;
        Ok(field.id)
    }

    async fn entity_read(
        &self,
        organization_id: Uuid,
        query: &EntityReadQuery,
    ) -> Result<Vec<EntityWithDynamicData>, ProcedureError> {
        self.ensure_available(ENTITY_READ)?;
        let store = self.store.as_ref();

        let mut select = SelectQuery::default()
            .eq("organization_id", organization_id.to_string())
            .with_limit(query.limit)
            .with_offset(query.offset);
        if let Some(id) = query.entity_id {
            select = select.eq("id", id.to_string());
        }
        if let Some(entity_type) = &query.entity_type {
            select = select.eq("entity_type", entity_type.as_str());
        }
        match query.status.as_deref() {
            None => select = select.eq("status", "active"),
            Some(ANY_STATUS) => {}
            Some(status) => select = select.eq("status", status),
        }

        let rows = store
            .select(Table::CoreEntities, &select)
            .await
            .map_err(failed(ENTITY_READ))?;

        let mut entities = Vec::with_capacity(rows.len());
        for entity in rows {
            let dynamic_data = match (query.include_dynamic_data, row_id(&entity)) {
                (true, Some(entity_id)) => Some(
                    lifecycle::dynamic_fields(store, organization_id, entity_id)
                        .await
                        .map_err(failed(ENTITY_READ))?,
                ),
                _ => None,
            };
            entities.push(EntityWithDynamicData {
                entity,
                dynamic_data,
            });
        }

        Ok(entities)
    }

    async fn entity_delete(
        &self,
        organization_id: Uuid,
        entity_id: Uuid,
        options: DeleteOptions,
    ) -> Result<DeleteOutcome, ProcedureError> {
        self.ensure_available(ENTITY_DELETE)?;

        lifecycle::delete_entity(self.store.as_ref(), organization_id, entity_id, options)
            .await
            .map_err(failed(ENTITY_DELETE))?
            .ok_or(ProcedureError::EntityNotFound(entity_id))
    }
}
