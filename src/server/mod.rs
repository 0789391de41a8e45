//! HTTP server: shared state, routing and lifecycle
//!
//! `ServerBuilder` mounts:
//! - `/health`, `/healthz`
//! - the universal table API (`/api/v1/universal`)
//! - the entity API (`/api/v2/entities`)

pub mod builder;
pub mod state;

pub use builder::ServerBuilder;
pub use state::AppState;
