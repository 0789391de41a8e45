//! Storage implementations for different backends

#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod mock;
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::core::store::TableStore;

/// Open the configured backend
///
/// Returns `None` for the mock backend: callers fall back to static data.
pub async fn open_store(config: &StorageConfig) -> Result<Option<Arc<dyn TableStore>>> {
    match config.backend {
        StorageBackend::Mock => {
            tracing::warn!("no database configured, serving mock data");
            Ok(None)
        }
        #[cfg(feature = "in-memory")]
        StorageBackend::Memory => Ok(Some(Arc::new(InMemoryStore::new()))),
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.url is required for postgres"))?;
            let store = PostgresStore::connect(url, config.max_connections.unwrap_or(10)).await?;
            if config.run_migrations {
                store.run_migrations().await?;
            }
            Ok(Some(Arc::new(store)))
        }
        #[allow(unreachable_patterns)]
        other => Err(anyhow::anyhow!(
            "storage backend {:?} is not compiled in; enable its cargo feature",
            other
        )),
    }
}
