//! HTTP handlers for `/api/v1/universal`
//!
//! Each method parses its request into a [`UniversalRequest`] and hands it to
//! [`dispatch`]. Without a database every read is answered from the mock
//! dataset and every write is validated, prepared and echoed back unsaved.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;

use super::request::{Action, DeleteMode, UniversalBody, UniversalRequest};
use crate::core::error::{HeraError, HeraResult, RowValidation, ValidationError};
use crate::core::query::ApiResponse;
use crate::core::store::SelectQuery;
use crate::core::table::{ARCHIVED_STATUS, Row, Table, catalog, org_scope};
use crate::procedures::lifecycle;
use crate::server::AppState;
use crate::storage::mock;

fn respond<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

fn body_or_reject(body: Result<Json<UniversalBody>, JsonRejection>) -> HeraResult<UniversalBody> {
    body.map(|Json(body)| body)
        .map_err(|rejection| ValidationError::InvalidPayload(rejection.body_text()).into())
}

/// GET handler: `read` unless another action is named
pub async fn get_universal(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> HeraResult<Response> {
    let request = UniversalRequest::from_query(&params, Action::Read)?;
    dispatch(&state, request).await
}

/// POST handler: `create` unless another action is named
pub async fn post_universal(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Result<Json<UniversalBody>, JsonRejection>,
) -> HeraResult<Response> {
    let request = UniversalRequest::from_body(&params, body_or_reject(body)?, Action::Create)?;
    dispatch(&state, request).await
}

/// PUT handler: `update` unless another action is named
pub async fn put_universal(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Result<Json<UniversalBody>, JsonRejection>,
) -> HeraResult<Response> {
    let request = UniversalRequest::from_body(&params, body_or_reject(body)?, Action::Update)?;
    dispatch(&state, request).await
}

/// DELETE handler
pub async fn delete_universal(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> HeraResult<Response> {
    let request = UniversalRequest::from_query(&params, Action::Delete)?;
    dispatch(&state, request).await
}

/// Run one universal action
pub async fn dispatch(state: &AppState, request: UniversalRequest) -> HeraResult<Response> {
    tracing::debug!(
        action = request.action.as_str(),
        table = ?request.table,
        organization_id = ?request.organization_id,
        "universal request"
    );

    match request.action {
        Action::Schema => schema(&request),
        Action::Read => read(state, &request).await,
        Action::Create => create(state, &request).await,
        Action::BatchCreate => batch_create(state, &request).await,
        Action::Validate => validate(&request),
        Action::Update => update(state, &request).await,
        Action::Delete => delete(state, &request).await,
    }
}

fn schema(request: &UniversalRequest) -> HeraResult<Response> {
    let body = match request.table {
        Some(table) => ApiResponse::ok(json!(table.descriptor())),
        None => ApiResponse::ok(json!(catalog())).with_count(catalog().len()),
    };
    Ok(respond(StatusCode::OK, body))
}

async fn read(state: &AppState, request: &UniversalRequest) -> HeraResult<Response> {
    let table = request.require_table()?;
    let organization_id = request.require_org_for(table)?;

    let mut filter = request.filters.clone();
    filter.extend(org_scope(table, organization_id));
    let query = SelectQuery::new(filter)
        .with_limit(request.page.limit(state.max_rows()))
        .with_offset(request.page.offset);

    match &state.store {
        Some(store) => {
            let rows = store.select(table, &query).await.map_err(HeraError::storage)?;
            let count = rows.len();
            Ok(respond(StatusCode::OK, ApiResponse::ok(rows).with_count(count)))
        }
        None => {
            let rows = mock::select(table, &query);
            let count = rows.len();
            Ok(respond(
                StatusCode::OK,
                ApiResponse::ok(rows).with_count(count).mocked(),
            ))
        }
    }
}

fn reject_unknown_columns(table: Table, row: &Row) -> HeraResult<()> {
    let unknown = table.descriptor().unknown_fields(row);
    if unknown.is_empty() {
        return Ok(());
    }
    Err(ValidationError::InvalidPayload(format!(
        "unknown columns for {}: {}",
        table,
        unknown.join(", ")
    ))
    .into())
}

fn check_insert(table: Table, row: &Row) -> HeraResult<()> {
    let missing = table.descriptor().missing_fields(row);
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields {
            table: table.name().to_string(),
            fields: missing,
        }
        .into());
    }
    reject_unknown_columns(table, row)
}

async fn create(state: &AppState, request: &UniversalRequest) -> HeraResult<Response> {
    let table = request.require_table()?;
    let row = request.data_row(table)?;
    check_insert(table, &row)?;
    let row = table.descriptor().prepare_insert(row, Utc::now());

    match &state.store {
        Some(store) => {
            let stored = store.insert(table, row).await.map_err(HeraError::storage)?;
            tracing::info!(table = %table, id = ?stored.get("id"), "row created");
            Ok(respond(StatusCode::CREATED, ApiResponse::ok(stored)))
        }
        None => Ok(respond(StatusCode::CREATED, ApiResponse::ok(row).mocked())),
    }
}

async fn batch_create(state: &AppState, request: &UniversalRequest) -> HeraResult<Response> {
    let table = request.require_table()?;
    let descriptor = table.descriptor();
    let rows = request.data_rows(table)?;

    let invalid: Vec<RowValidation> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let missing_fields = descriptor.missing_fields(row);
            (!missing_fields.is_empty()).then_some(RowValidation {
                index,
                missing_fields,
            })
        })
        .collect();
    if !invalid.is_empty() {
        return Err(ValidationError::BatchMissingFields {
            table: table.name().to_string(),
            rows: invalid,
        }
        .into());
    }
    for row in &rows {
        reject_unknown_columns(table, row)?;
    }

    let now = Utc::now();
    let prepared: Vec<Row> = rows
        .into_iter()
        .map(|row| descriptor.prepare_insert(row, now))
        .collect();
    let count = prepared.len();

    let Some(store) = &state.store else {
        return Ok(respond(
            StatusCode::CREATED,
            ApiResponse::ok(prepared).with_count(count).mocked(),
        ));
    };

    let mut stored = Vec::with_capacity(count);
    for row in prepared {
        stored.push(store.insert(table, row).await.map_err(HeraError::storage)?);
    }
    tracing::info!(table = %table, count, "batch created");
    Ok(respond(
        StatusCode::CREATED,
        ApiResponse::ok(stored).with_count(count),
    ))
}

fn validate(request: &UniversalRequest) -> HeraResult<Response> {
    let table = request.require_table()?;
    let descriptor = table.descriptor();
    let row = request.data_row(table)?;

    let missing_fields = descriptor.missing_fields(&row);
    let unknown_fields = descriptor.unknown_fields(&row);
    Ok(respond(
        StatusCode::OK,
        ApiResponse::ok(json!({
            "table": table.name(),
            "valid": missing_fields.is_empty() && unknown_fields.is_empty(),
            "missing_fields": missing_fields,
            "unknown_fields": unknown_fields,
        })),
    ))
}

async fn update(state: &AppState, request: &UniversalRequest) -> HeraResult<Response> {
    let table = request.require_table()?;
    let id = request.require_id()?;
    let organization_id = request.require_org_for(table)?;

    let Value::Object(changes) = &request.data else {
        return Err(
            ValidationError::InvalidPayload("data must be a JSON object".to_string()).into(),
        );
    };
    reject_unknown_columns(table, changes)?;
    let changes = table.descriptor().prepare_update(changes.clone(), Utc::now());

    let Some(store) = &state.store else {
        let mut echo = changes;
        echo.insert("id".into(), Value::String(id.to_string()));
        return Ok(respond(StatusCode::OK, ApiResponse::ok(echo).mocked()));
    };

    let updated = store
        .update(table, &id, &org_scope(table, organization_id), changes)
        .await
        .map_err(HeraError::storage)?
        .ok_or_else(|| HeraError::NotFound {
            table: table.name().to_string(),
            id,
        })?;

    tracing::info!(table = %table, id = %id, "row updated");
    Ok(respond(StatusCode::OK, ApiResponse::ok(updated)))
}

async fn delete(state: &AppState, request: &UniversalRequest) -> HeraResult<Response> {
    let table = request.require_table()?;
    let id = request.require_id()?;
    let organization_id = request.require_org_for(table)?;
    let descriptor = table.descriptor();

    if request.mode == DeleteMode::Soft && !descriptor.is_column("status") {
        return Err(ValidationError::InvalidPayload(format!(
            "{} has no status column; use mode=hard",
            table
        ))
        .into());
    }

    let mode = match request.mode {
        DeleteMode::Hard => "hard",
        DeleteMode::Soft => "soft",
    };
    let body = json!({ "id": id, "mode": mode, "deleted": true });

    let Some(store) = &state.store else {
        return Ok(respond(StatusCode::OK, ApiResponse::ok(body).mocked()));
    };
    let store = store.as_ref();
    let scope = org_scope(table, organization_id);
    let not_found = || HeraError::NotFound {
        table: table.name().to_string(),
        id,
    };

    match (request.mode, table, organization_id) {
        (DeleteMode::Soft, _, _) => {
            let mut changes = Row::new();
            changes.insert("status".into(), Value::String(ARCHIVED_STATUS.to_string()));
            let changes = descriptor.prepare_update(changes, Utc::now());
            store
                .update(table, &id, &scope, changes)
                .await
                .map_err(HeraError::storage)?
                .ok_or_else(not_found)?;
        }
        // Dynamic fields go with their entity
        (DeleteMode::Hard, Table::CoreEntities, Some(organization_id)) => {
            lifecycle::purge_entity(store, organization_id, id, false)
                .await
                .map_err(HeraError::storage)?
                .ok_or_else(not_found)?;
        }
        (DeleteMode::Hard, _, _) => {
            store
                .delete(table, &id, &scope)
                .await
                .map_err(HeraError::storage)?
                .ok_or_else(not_found)?;
        }
    }

    tracing::info!(table = %table, id = %id, mode, "row deleted");
    Ok(respond(StatusCode::OK, ApiResponse::ok(body)))
}
