//! Configuration loading and management
//!
//! Configuration comes from a YAML file (every section optional) and is then
//! overridden by `HERA_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub procedures: ProceduresConfig,
    pub p2p: P2pConfig,
    pub seed: SeedConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. "0.0.0.0:3000"
    pub bind: String,

    /// Hard cap on rows returned by a single read
    pub max_rows: usize,

    /// Allow any origin (development front-ends)
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            max_rows: 100,
            permissive_cors: true,
        }
    }
}

/// Which storage backend serves the tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local tables
    #[default]
    Memory,
    /// Hosted Postgres-compatible database
    Postgres,
    /// No database: reads return static demo rows, writes are echoed
    Mock,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            "mock" => Ok(StorageBackend::Mock),
            other => Err(anyhow::anyhow!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Connection URL (postgres backend only)
    pub url: Option<String>,
    /// Pool size (postgres backend only)
    pub max_connections: Option<u32>,
    /// Apply the bundled migrations on startup (postgres backend only)
    pub run_migrations: bool,
}

/// A bearer token accepted by the static verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenGrant>,

    /// Accept `X-Organization-Id` without a token (development only)
    pub allow_org_header: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProceduresConfig {
    /// Procedure names treated as not installed, e.g. `hera_entity_delete_v1`
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    /// Default three-way match tolerance in percent
    pub match_tolerance_pct: f64,

    /// Base URL of the hosted edge functions; local engine when unset
    pub edge_function_url: Option<String>,

    pub edge_function_key: Option<String>,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            match_tolerance_pct: 2.0,
            edge_function_url: None,
            edge_function_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Seed demo data when the server starts
    pub on_startup: bool,
    pub organization_code: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            on_startup: false,
            organization_code: "DEMO".to_string(),
        }
    }
}

impl HeraConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("failed to parse '{}'", path))
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `HERA_*` overrides read through `lookup`
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(bind) = lookup("HERA_BIND") {
            self.server.bind = bind;
        }
        if let Some(max_rows) = lookup("HERA_MAX_ROWS") {
            self.server.max_rows = max_rows
                .parse()
                .with_context(|| format!("HERA_MAX_ROWS is not a number: {}", max_rows))?;
        }
        if let Some(backend) = lookup("HERA_STORAGE") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(url) = lookup("HERA_DATABASE_URL") {
            self.storage.url = Some(url);
            if lookup("HERA_STORAGE").is_none() {
                self.storage.backend = StorageBackend::Postgres;
            }
        }
        if let Some(url) = lookup("HERA_EDGE_FUNCTION_URL") {
            self.p2p.edge_function_url = Some(url);
        }
        if let Some(key) = lookup("HERA_EDGE_FUNCTION_KEY") {
            self.p2p.edge_function_key = Some(key);
        }
        Ok(self)
    }
}
