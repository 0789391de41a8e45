//! Entity lifecycle steps shared by the procedures and the API's fallback path

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use super::{DeleteMode, DeleteOptions, DeleteOutcome, DynamicFieldView};
use crate::core::field::DynamicValue;
use crate::core::store::{SelectQuery, TableStore};
use crate::core::table::{ARCHIVED_STATUS, Row, Table, org_scope};

fn org_filter(organization_id: Uuid) -> SelectQuery {
    SelectQuery::default().eq("organization_id", organization_id.to_string())
}

/// Fetch one entity of the organization
pub async fn find_entity(
    store: &dyn TableStore,
    organization_id: Uuid,
    entity_id: Uuid,
) -> Result<Option<Row>> {
    let query = org_filter(organization_id)
        .eq("id", entity_id.to_string())
        .with_limit(1);
    Ok(store
        .select(Table::CoreEntities, &query)
        .await?
        .into_iter()
        .next())
}

/// Dynamic field rows of an entity
pub async fn dynamic_rows(
    store: &dyn TableStore,
    organization_id: Uuid,
    entity_id: Uuid,
) -> Result<Vec<Row>> {
    let query = org_filter(organization_id).eq("entity_id", entity_id.to_string());
    store.select(Table::CoreDynamicData, &query).await
}

/// Dynamic fields of an entity keyed by name, oldest first
pub async fn dynamic_fields(
    store: &dyn TableStore,
    organization_id: Uuid,
    entity_id: Uuid,
) -> Result<IndexMap<String, DynamicFieldView>> {
    let mut rows = dynamic_rows(store, organization_id, entity_id).await?;
    rows.reverse();

    Ok(rows
        .iter()
        .filter_map(|row| {
            let name = row.get("field_name")?.as_str()?.to_string();
            let value = DynamicValue::read_columns(row)?;
            let smart_code = row
                .get("smart_code")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some((name, DynamicFieldView::new(&value, smart_code)))
        })
        .collect())
}

/// Set `status = archived`
pub async fn archive_entity(
    store: &dyn TableStore,
    organization_id: Uuid,
    entity_id: Uuid,
) -> Result<Option<Row>> {
    let descriptor = Table::CoreEntities.descriptor();
    let mut changes = Row::new();
    changes.insert("status".into(), Value::String(ARCHIVED_STATUS.to_string()));
    let changes = descriptor.prepare_update(changes, chrono::Utc::now());

    store
        .update(
            Table::CoreEntities,
            &entity_id,
            &org_scope(Table::CoreEntities, Some(organization_id)),
            changes,
        )
        .await
}

/// Remove the entity row, its dynamic fields and optionally its relationships
///
/// Returns `None` when the entity does not exist in the organization.
pub async fn purge_entity(
    store: &dyn TableStore,
    organization_id: Uuid,
    entity_id: Uuid,
    cascade_relationships: bool,
) -> Result<Option<(usize, usize)>> {
    let scope = org_scope(Table::CoreEntities, Some(organization_id));
    if store
        .delete(Table::CoreEntities, &entity_id, &scope)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    let mut fields = scope.clone();
    fields.insert("entity_id".into(), Value::String(entity_id.to_string()));
    let dynamic_removed = store.delete_where(Table::CoreDynamicData, &fields).await?;

    let mut relationships_removed = 0;
    if cascade_relationships {
        for column in ["from_entity_id", "to_entity_id"] {
            let mut filter = scope.clone();
            filter.insert(column.into(), Value::String(entity_id.to_string()));
            relationships_removed += store
                .delete_where(Table::CoreRelationships, &filter)
                .await?;
        }
    }

    Ok(Some((dynamic_removed, relationships_removed)))
}

/// Soft or hard delete per `options`
pub async fn delete_entity(
    store: &dyn TableStore,
    organization_id: Uuid,
    entity_id: Uuid,
    options: DeleteOptions,
) -> Result<Option<DeleteOutcome>> {
    if options.hard_delete {
        let purged = purge_entity(
            store,
            organization_id,
            entity_id,
            options.cascade_relationships,
        )
        .await?;
        Ok(purged.map(|(dynamic, relationships)| DeleteOutcome {
            entity_id,
            mode: DeleteMode::Hard,
            dynamic_fields_removed: dynamic,
            relationships_removed: relationships,
        }))
    } else {
        let archived = archive_entity(store, organization_id, entity_id).await?;
        Ok(archived.map(|_| DeleteOutcome {
            entity_id,
            mode: DeleteMode::Soft,
            dynamic_fields_removed: 0,
            relationships_removed: 0,
        }))
    }
}
