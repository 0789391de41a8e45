//! The universal table API: one endpoint, seven actions, six tables
//!
//! ```text
//! GET    /api/v1/universal?action=schema[&table=...]
//! GET    /api/v1/universal?table=core_entities&organization_id=...&entity_type=customer
//! POST   /api/v1/universal  {"action": "create", "table": "...", "data": {...}}
//! POST   /api/v1/universal  {"action": "batch_create", "table": "...", "data": [...]}
//! POST   /api/v1/universal  {"action": "validate", "table": "...", "data": {...}}
//! PUT    /api/v1/universal  {"table": "...", "id": "...", "organization_id": "...", "data": {...}}
//! DELETE /api/v1/universal?table=...&id=...&organization_id=...[&mode=soft]
//! ```

pub mod handlers;
pub mod request;

use axum::{Router, routing::get};

use crate::server::AppState;
use handlers::{delete_universal, get_universal, post_universal, put_universal};

pub use request::{Action, UniversalRequest};

/// Routes of the universal API
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/universal",
        get(get_universal)
            .post(post_universal)
            .put(put_universal)
            .delete(delete_universal),
    )
}
