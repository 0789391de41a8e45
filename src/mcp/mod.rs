//! MCP server exposing procure-to-pay tools
//!
//! Agents speak JSON-RPC over stdio ([`McpServer`]); each tool reads and
//! writes the universal tables through [`P2pTools`]. Matching, anomaly and
//! batch rules live behind [`P2pEngine`] so they can run in process or on
//! hosted edge functions.

pub mod engine;
pub mod p2p;
pub mod protocol;
pub mod server;
pub mod tools;

#[cfg(feature = "edge-functions")]
pub mod edge;

pub use engine::{LocalP2pEngine, P2pEngine};
pub use p2p::P2pTools;
pub use server::McpServer;

use std::sync::Arc;

use crate::config::P2pConfig;
use crate::core::error::ProcedureError;

/// Failure of a single tool call
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments missing or malformed; reported as JSON-RPC -32602
    #[error("{0}")]
    InvalidParams(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Business rule refused the call; reported as a tool result with `isError`
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Procedure(#[from] ProcedureError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Pick the rule engine for the configured P2P settings
pub fn engine_from_config(config: &P2pConfig) -> Arc<dyn P2pEngine> {
    let local = || Arc::new(LocalP2pEngine::new(config.match_tolerance_pct)) as Arc<dyn P2pEngine>;

    match &config.edge_function_url {
        #[cfg(feature = "edge-functions")]
        Some(url) => {
            tracing::info!(url = %url, "using edge function P2P engine");
            Arc::new(edge::EdgeFunctionEngine::new(
                url.clone(),
                config.edge_function_key.clone(),
            ))
        }
        #[cfg(not(feature = "edge-functions"))]
        Some(url) => {
            tracing::warn!(
                url = %url,
                "edge function URL set but the edge-functions feature is disabled; using local engine"
            );
            local()
        }
        None => local(),
    }
}
