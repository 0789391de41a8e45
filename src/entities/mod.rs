//! The v2 entity API
//!
//! Entities and their dynamic fields are written through the named
//! [procedures](crate::procedures); every route needs an authenticated
//! organization.

pub mod handlers;
pub mod request;

use axum::{Router, routing::get};

use crate::server::AppState;
use handlers::{create_entity, delete_entity, get_entity, list_entities, update_entity};

pub use request::{DynamicFieldInput, EntityRequest, ListEntitiesParams};

/// Routes of the entity API
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v2/entities", get(list_entities).post(create_entity))
        .route(
            "/api/v2/entities/{id}",
            get(get_entity).put(update_entity).delete(delete_entity),
        )
}
