//! ServerBuilder for fluent API to build the HTTP server

use anyhow::Result;
use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::state::AppState;
use crate::config::HeraConfig;
use crate::core::auth::AuthVerifier;
use crate::core::store::TableStore;
use crate::procedures::EntityProcedures;
use crate::{entities, universal};

/// Builder for the HERA HTTP server
///
/// # Example
///
/// ```ignore
/// let config = HeraConfig::load(Some("hera.yaml"))?;
/// let store = storage::open_store(&config.storage).await?;
/// ServerBuilder::new(config)
///     .with_store(store)
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: HeraConfig,
    store: Option<Arc<dyn TableStore>>,
    auth: Option<Arc<dyn AuthVerifier>>,
    procedures: Option<Arc<dyn EntityProcedures>>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder; without a store the server runs on mock data
    pub fn new(config: HeraConfig) -> Self {
        Self {
            config,
            store: None,
            auth: None,
            procedures: None,
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn TableStore>>) -> Self {
        self.store = store;
        self
    }

    /// Replace the token verifier built from `auth` configuration
    pub fn with_auth(mut self, auth: Arc<dyn AuthVerifier>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Replace the store-backed procedures
    pub fn with_procedures(mut self, procedures: Arc<dyn EntityProcedures>) -> Self {
        self.procedures = Some(procedures);
        self
    }

    /// Build the application state
    pub fn build_state(self) -> AppState {
        let mut state = AppState::new(self.config, self.store);
        if let Some(auth) = self.auth {
            state = state.with_auth(auth);
        }
        if let Some(procedures) = self.procedures {
            state = state.with_procedures(procedures);
        }
        state
    }

    /// Build the router
    pub fn build(self) -> Result<Router> {
        let state = self.build_state();
        let permissive_cors = state.config.server.permissive_cors;

        let mut router = health_routes()
            .merge(universal::routes())
            .merge(entities::routes())
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));
        if permissive_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }
        Ok(router)
    }

    /// Serve on `server.bind` with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.bind.clone();
        let app = self.build()?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Health check routes
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let storage = state.store.as_ref().map_or("mock", |store| store.backend());
    Json(json!({
        "status": "ok",
        "service": "hera",
        "storage": storage
    }))
}

/// Wait for a shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
