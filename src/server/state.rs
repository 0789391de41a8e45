//! Application state shared across handlers

use std::sync::Arc;

use crate::config::HeraConfig;
use crate::core::auth::{AuthVerifier, StaticTokenVerifier};
use crate::core::error::{HeraError, HeraResult};
use crate::core::store::TableStore;
use crate::procedures::{EntityProcedures, StoreProcedures};

#[derive(Clone)]
pub struct AppState {
    /// `None` when running on mock data
    pub store: Option<Arc<dyn TableStore>>,
    pub procedures: Option<Arc<dyn EntityProcedures>>,
    pub auth: Arc<dyn AuthVerifier>,
    pub config: Arc<HeraConfig>,
}

impl AppState {
    /// Wire the default procedures and token verifier for a store
    pub fn new(config: HeraConfig, store: Option<Arc<dyn TableStore>>) -> Self {
        let procedures = store.as_ref().map(|store| {
            let procedures = StoreProcedures::new(store.clone())
                .with_disabled(config.procedures.disabled.iter().cloned());
            Arc::new(procedures) as Arc<dyn EntityProcedures>
        });
        let auth = Arc::new(StaticTokenVerifier::from_config(&config.auth));

        Self {
            store,
            procedures,
            auth,
            config: Arc::new(config),
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthVerifier>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_procedures(mut self, procedures: Arc<dyn EntityProcedures>) -> Self {
        self.procedures = Some(procedures);
        self
    }

    pub fn max_rows(&self) -> usize {
        self.config.server.max_rows
    }

    /// The store, or 503 when serving mock data
    pub fn require_store(&self) -> HeraResult<&Arc<dyn TableStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| HeraError::Unavailable("no database configured".to_string()))
    }

    pub fn require_procedures(&self) -> HeraResult<&Arc<dyn EntityProcedures>> {
        self.procedures
            .as_ref()
            .ok_or_else(|| HeraError::Unavailable("no database configured".to_string()))
    }
}
