//! Cache backend selection.

use std::sync::Arc;

use crate::cache::{MemoryStore, RedisStore, SharedStore, UnavailableStore};
use crate::config::{CacheBackend, CacheSettings};

use super::error::InfraError;

/// Open the configured backend, failing when Redis cannot be reached.
pub async fn connect(settings: &CacheSettings) -> Result<SharedStore, InfraError> {
    match &settings.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        CacheBackend::Redis { url } => {
            let store = RedisStore::connect(url)
                .await
                .map_err(|err| InfraError::cache(err.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}

/// Like [`connect`], but an unreachable Redis yields a store that misses on
/// every read so the API keeps serving from the database.
pub async fn connect_or_degrade(settings: &CacheSettings) -> SharedStore {
    match connect(settings).await {
        Ok(store) => {
            tracing::info!(
                target = "catalog::cache",
                backend = store.backend_name(),
                "cache backend ready"
            );
            store
        }
        Err(err) => {
            tracing::warn!(
                target = "catalog::cache",
                error = %err,
                "cache backend unavailable; serving without cache"
            );
            Arc::new(UnavailableStore)
        }
    }
}
