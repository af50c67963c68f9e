//! Key-value backends behind the cache-aside layer.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, aio::ConnectionManager};
use thiserror::Error;

use super::keys::Namespace;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable")]
    Unavailable,
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache payload serialization failed: {0}")]
    Serialize(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

/// String key-value store partitioned by [`Namespace`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, namespace: Namespace, key: &str, value: String) -> Result<(), CacheError>;

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), CacheError>;

    fn backend_name(&self) -> &'static str;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Process-local store. Used for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<(Namespace, String), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .entries
            .get(&(namespace, key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn set(&self, namespace: Namespace, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert((namespace, key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), CacheError> {
        self.entries.remove(&(namespace, key.to_string()));
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Redis store keeping one hash per namespace (`HGET`/`HSET`/`HDEL`).
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.hget(namespace.as_str(), key).await?;
        Ok(value)
    }

    async fn set(&self, namespace: Namespace, key: &str, value: String) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .hset::<_, _, _, ()>(namespace.as_str(), key, value)
            .await?;
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .hdel::<_, _, ()>(namespace.as_str(), key)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Stand-in used when the configured backend could not be reached at startup.
///
/// Every read is a miss and every write fails, so requests are served from the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _namespace: Namespace, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn set(&self, _namespace: Namespace, _key: &str, _value: String) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn delete(&self, _namespace: Namespace, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_keeps_namespaces_apart() {
        let store = MemoryStore::new();
        store
            .set(Namespace::Product, "7", "product-7".to_string())
            .await
            .expect("set product");
        store
            .set(Namespace::Category, "7", "category-7".to_string())
            .await
            .expect("set category");

        assert_eq!(
            store.get(Namespace::Product, "7").await.unwrap().as_deref(),
            Some("product-7")
        );
        assert_eq!(
            store.get(Namespace::Category, "7").await.unwrap().as_deref(),
            Some("category-7")
        );
        assert_eq!(store.get(Namespace::Response, "7").await.unwrap(), None);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn memory_store_overwrites_and_deletes() {
        let store = MemoryStore::new();
        store
            .set(Namespace::Product, "a", "one".to_string())
            .await
            .unwrap();
        store
            .set(Namespace::Product, "a", "two".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get(Namespace::Product, "a").await.unwrap().as_deref(),
            Some("two")
        );

        store.delete(Namespace::Product, "a").await.unwrap();
        assert_eq!(store.get(Namespace::Product, "a").await.unwrap(), None);
        store
            .delete(Namespace::Product, "missing")
            .await
            .expect("deleting an absent key is not an error");
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = UnavailableStore;
        assert!(matches!(
            store.get(Namespace::Product, "a").await,
            Err(CacheError::Unavailable)
        ));
        assert!(store.set(Namespace::Product, "a", String::new()).await.is_err());
        assert!(store.delete(Namespace::Product, "a").await.is_err());
    }
}
