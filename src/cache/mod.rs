//! Cache-aside layer.
//!
//! Entities and whole listing responses are stored as serialized payloads in a
//! key-value store, one namespace per kind:
//!
//! - `product` / `category`: entity snapshots keyed by id
//! - `response`: listing responses keyed by request path and query
//!
//! Entries carry no TTL. They are only replaced or removed by an explicit
//! `set`/`delete` on the same key, so readers may see stale data. Reads treat any
//! cache failure as a miss and writes happen off the request path via
//! [`CacheMirror`].

mod entity;
mod keys;
mod mirror;
mod response;
mod store;

pub use entity::EntityCache;
pub use keys::{Cacheable, Namespace, request_signature};
pub use mirror::CacheMirror;
pub use response::{CachedListing, ResponseCache};
pub use store::{
    CacheError, KeyValueStore, MemoryStore, RedisStore, SharedStore, UnavailableStore,
};

pub const METRIC_CACHE_HIT: &str = "catalog_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "catalog_cache_miss_total";
pub const METRIC_CACHE_ERROR: &str = "catalog_cache_error_total";
pub const METRIC_CACHE_MIRROR_FAILED: &str = "catalog_cache_mirror_failed_total";

use metrics::counter;

/// Normalize a raw lookup result: empty payloads and backend errors are misses.
pub(crate) fn lookup_outcome(
    namespace: Namespace,
    key: &str,
    result: Result<Option<String>, CacheError>,
) -> Option<String> {
    match result {
        Ok(Some(payload)) if !payload.is_empty() => {
            counter!(METRIC_CACHE_HIT, "namespace" => namespace.as_str()).increment(1);
            tracing::debug!(
                target = "catalog::cache",
                namespace = namespace.as_str(),
                key,
                "cache hit"
            );
            Some(payload)
        }
        Ok(_) => {
            counter!(METRIC_CACHE_MISS, "namespace" => namespace.as_str()).increment(1);
            tracing::debug!(
                target = "catalog::cache",
                namespace = namespace.as_str(),
                key,
                "cache miss"
            );
            None
        }
        Err(err) => {
            counter!(METRIC_CACHE_ERROR, "namespace" => namespace.as_str()).increment(1);
            tracing::warn!(
                target = "catalog::cache",
                namespace = namespace.as_str(),
                key,
                error = %err,
                "cache lookup failed; falling through to store"
            );
            None
        }
    }
}
