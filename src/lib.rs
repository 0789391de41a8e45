//! # HERA
//!
//! A multi-tenant business data service built on six universal tables.
//!
//! Every business object lives in the same six tables:
//!
//! - `core_organizations`: the tenant boundary
//! - `core_entities`: typed, named objects (customers, products, suppliers...)
//! - `core_dynamic_data`: typed attributes attached to entities
//! - `core_relationships`: directed edges between entities
//! - `universal_transactions` / `universal_transaction_lines`: business events
//!
//! Each row carries a smart code (`HERA.CRM.ACCOUNT.ENTERPRISE.ACTIVE.v1`)
//! and, except for organizations, the owning `organization_id`. Every query
//! on an org-owned table is scoped to one organization.
//!
//! ## Surfaces
//!
//! - **Universal API** (`/api/v1/universal`): generic CRUD over any table
//! - **Entity API** (`/api/v2/entities`): entities with dynamic fields
//!   through the named procedures
//! - **MCP server**: procure-to-pay tools for agents over JSON-RPC stdio
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hera::prelude::*;
//!
//! let config = HeraConfig::load(Some("hera.yaml"))?;
//! let store = open_store(&config.storage).await?;
//! ServerBuilder::new(config).with_store(store).serve().await?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod mcp;
pub mod procedures;
pub mod seed;
pub mod server;
pub mod storage;
pub mod universal;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ApiResponse, AuthContext, AuthVerifier, CoreEntity, DynamicField, DynamicValue,
        FieldType, HeraError, HeraResult, Organization, PageParams, ProcedureError,
        Relationship, Row, SelectQuery, StaticTokenVerifier, Table, TableDescriptor,
        TableRecord, TableStore, Transaction, TransactionLine, ValidationError,
    };

    // === Procedures ===
    pub use crate::procedures::{EntityProcedures, StoreProcedures, UpsertEntity};

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresStore;
    pub use crate::storage::open_store;

    // === Config ===
    pub use crate::config::HeraConfig;

    // === Server ===
    pub use crate::server::{AppState, ServerBuilder};

    // === MCP ===
    pub use crate::mcp::{LocalP2pEngine, McpServer, P2pEngine, P2pTools};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
