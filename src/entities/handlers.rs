//! HTTP handlers for `/api/v2/entities`
//!
//! The organization always comes from the caller's [`AuthContext`], never
//! from the request body.
//!
//! [`AuthContext`]: crate::core::AuthContext

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

use super::request::{EntityRequest, ListEntitiesParams, TypedField};
use crate::core::error::{HeraError, HeraResult, ProcedureError, ValidationError};
use crate::core::query::ApiResponse;
use crate::procedures::{
    ANY_STATUS, DeleteOptions, DeleteOutcome, EntityProcedures, EntityReadQuery, lifecycle,
};
use crate::server::AppState;

/// Result of a create or update
#[derive(Debug, Serialize)]
pub struct EntityWriteResult {
    pub entity_id: Uuid,
    pub dynamic_fields_written: usize,
    /// Dynamic fields that could not be written; the entity itself was saved
    pub warnings: Vec<String>,
}

/// Result of a delete
#[derive(Debug, Serialize)]
pub struct EntityDeleteResult {
    #[serde(flatten)]
    pub outcome: DeleteOutcome,
    /// Set when the delete procedure was unavailable and the store was used directly
    pub fallback: bool,
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> HeraResult<Uuid> {
    state.auth.verify(headers).await?.require_organization()
}

fn body_or_reject(body: Result<Json<EntityRequest>, JsonRejection>) -> HeraResult<EntityRequest> {
    body.map(|Json(body)| body)
        .map_err(|rejection| ValidationError::InvalidPayload(rejection.body_text()).into())
}

fn id_or_reject(path: Result<Path<Uuid>, PathRejection>) -> HeraResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ValidationError::InvalidUuid(rejection.body_text()).into())
}

fn query_or_reject<T>(query: Result<Query<T>, QueryRejection>) -> HeraResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ValidationError::InvalidPayload(rejection.body_text()).into())
}

/// Write each field on its own; failures become warnings
async fn write_dynamic_fields(
    procedures: &dyn EntityProcedures,
    organization_id: Uuid,
    entity_id: Uuid,
    fields: &[TypedField],
) -> (usize, Vec<String>) {
    let mut written = 0;
    let mut warnings = Vec::new();

    for field in fields {
        match procedures
            .dynamic_data_set(
                organization_id,
                entity_id,
                &field.field_name,
                &field.value,
                &field.smart_code,
            )
            .await
        {
            Ok(_) => written += 1,
            Err(e) => {
                tracing::warn!(
                    %organization_id,
                    %entity_id,
                    field_name = %field.field_name,
                    error = %e,
                    "dynamic field write failed"
                );
                warnings.push(format!("{}: {}", field.field_name, e));
            }
        }
    }

    (written, warnings)
}

async fn save_entity(
    state: &AppState,
    organization_id: Uuid,
    entity_id: Option<Uuid>,
    request: EntityRequest,
) -> HeraResult<EntityWriteResult> {
    let procedures = state.require_procedures()?;
    let fields = request.typed_fields()?;

    let entity_id = procedures
        .entity_upsert(organization_id, request.to_upsert(entity_id))
        .await?;
    let (dynamic_fields_written, warnings) =
        write_dynamic_fields(procedures.as_ref(), organization_id, entity_id, &fields).await;

    Ok(EntityWriteResult {
        entity_id,
        dynamic_fields_written,
        warnings,
    })
}

/// POST /api/v2/entities
pub async fn create_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<EntityRequest>, JsonRejection>,
) -> HeraResult<Response> {
    let organization_id = authorize(&state, &headers).await?;
    let request = body_or_reject(body)?;

    let result = save_entity(&state, organization_id, None, request).await?;
    tracing::info!(%organization_id, entity_id = %result.entity_id, "entity created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(result))).into_response())
}

/// GET /api/v2/entities
pub async fn list_entities(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<ListEntitiesParams>, QueryRejection>,
) -> HeraResult<Response> {
    let organization_id = authorize(&state, &headers).await?;
    let params = query_or_reject(params)?;
    let procedures = state.require_procedures()?;

    let entities = procedures
        .entity_read(organization_id, &params.to_query(state.max_rows()))
        .await?;
    let count = entities.len();

    Ok(Json(ApiResponse::ok(entities).with_count(count)).into_response())
}

/// GET /api/v2/entities/{id}
pub async fn get_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> HeraResult<Response> {
    let organization_id = authorize(&state, &headers).await?;
    let id = id_or_reject(id)?;
    let procedures = state.require_procedures()?;

    let query = EntityReadQuery {
        entity_id: Some(id),
        status: Some(ANY_STATUS.to_string()),
        include_dynamic_data: true,
        limit: 1,
        ..Default::default()
    };
    let entity = procedures
        .entity_read(organization_id, &query)
        .await?
        .into_iter()
        .next()
        .ok_or(ProcedureError::EntityNotFound(id))?;

    Ok(Json(ApiResponse::ok(entity)).into_response())
}

/// PUT /api/v2/entities/{id}
pub async fn update_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<EntityRequest>, JsonRejection>,
) -> HeraResult<Response> {
    let organization_id = authorize(&state, &headers).await?;
    let id = id_or_reject(id)?;
    let request = body_or_reject(body)?;

    let store = state.require_store()?;
    if lifecycle::find_entity(store.as_ref(), organization_id, id)
        .await
        .map_err(HeraError::storage)?
        .is_none()
    {
        return Err(ProcedureError::EntityNotFound(id).into());
    }

    let result = save_entity(&state, organization_id, Some(id), request).await?;
    tracing::info!(%organization_id, entity_id = %id, "entity updated");

    Ok(Json(ApiResponse::ok(result)).into_response())
}

/// DELETE /api/v2/entities/{id}
///
/// Runs `hera_entity_delete_v1`; when the procedure is unavailable the same
/// lifecycle runs directly against the store.
pub async fn delete_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    options: Result<Query<DeleteOptions>, QueryRejection>,
) -> HeraResult<Response> {
    let organization_id = authorize(&state, &headers).await?;
    let id = id_or_reject(id)?;
    let options = query_or_reject(options)?;
    let procedures = state.require_procedures()?;

    let (outcome, fallback) = match procedures
        .entity_delete(organization_id, id, options)
        .await
    {
        Ok(outcome) => (outcome, false),
        Err(ProcedureError::Unavailable(procedure)) => {
            tracing::warn!(procedure, entity_id = %id, "delete procedure unavailable, using fallback");
            let store = state.require_store()?;
            let outcome = lifecycle::delete_entity(store.as_ref(), organization_id, id, options)
                .await
                .map_err(HeraError::storage)?
                .ok_or(ProcedureError::EntityNotFound(id))?;
            (outcome, true)
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(%organization_id, entity_id = %id, mode = ?outcome.mode, fallback, "entity deleted");
    Ok(Json(ApiResponse::ok(EntityDeleteResult { outcome, fallback })).into_response())
}
