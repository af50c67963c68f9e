use std::fmt::Display;
use std::future::Future;

use metrics::counter;
use tokio::task::JoinHandle;

use super::entity::EntityCache;
use super::keys::{Cacheable, Namespace};
use super::response::{CachedListing, ResponseCache};
use super::store::{CacheError, SharedStore};
use super::METRIC_CACHE_MIRROR_FAILED;

/// Mirrors committed writes into the cache from detached tasks.
///
/// Callers never await the returned handles on the request path. Failures are
/// logged and counted, nothing is retried.
#[derive(Clone)]
pub struct CacheMirror {
    store: SharedStore,
}

impl CacheMirror {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn set_entity<T: Cacheable>(&self, entity: T) -> JoinHandle<()> {
        let cache = EntityCache::<T>::new(self.store.clone());
        tokio::spawn(async move {
            let key = entity.cache_id();
            report(T::NAMESPACE, &key, "set", cache.set(&entity).await);
        })
    }

    /// Load the current row with `load` and store it. A failed load skips the write.
    pub fn refresh_entity<T, E, F, Fut>(&self, id: String, load: F) -> JoinHandle<()>
    where
        T: Cacheable,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let cache = EntityCache::<T>::new(self.store.clone());
        tokio::spawn(async move {
            match load().await {
                Ok(entity) => report(T::NAMESPACE, &id, "set", cache.set(&entity).await),
                Err(err) => {
                    counter!(METRIC_CACHE_MIRROR_FAILED, "namespace" => T::NAMESPACE.as_str())
                        .increment(1);
                    tracing::warn!(
                        target = "catalog::cache",
                        namespace = T::NAMESPACE.as_str(),
                        key = %id,
                        error = %err,
                        "reloading entity for cache failed"
                    );
                }
            }
        })
    }

    pub fn delete_entity<T: Cacheable>(&self, id: String) -> JoinHandle<()> {
        let cache = EntityCache::<T>::new(self.store.clone());
        tokio::spawn(async move {
            report(T::NAMESPACE, &id, "delete", cache.delete(&id).await);
        })
    }

    pub fn store_listing(&self, signature: String, listing: CachedListing) -> JoinHandle<()> {
        let cache = ResponseCache::new(self.store.clone());
        tokio::spawn(async move {
            report(
                Namespace::Response,
                &signature,
                "set",
                cache.set(&signature, &listing).await,
            );
        })
    }
}

fn report(namespace: Namespace, key: &str, op: &'static str, result: Result<(), CacheError>) {
    match result {
        Ok(()) => tracing::debug!(
            target = "catalog::cache",
            namespace = namespace.as_str(),
            key,
            op,
            "cache mirrored"
        ),
        Err(err) => {
            counter!(METRIC_CACHE_MIRROR_FAILED, "namespace" => namespace.as_str()).increment(1);
            tracing::warn!(
                target = "catalog::cache",
                namespace = namespace.as_str(),
                key,
                op,
                error = %err,
                "cache mirror failed"
            );
        }
    }
}
