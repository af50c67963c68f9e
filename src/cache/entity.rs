use std::marker::PhantomData;

use super::keys::{Cacheable, Namespace};
use super::lookup_outcome;
use super::store::{CacheError, SharedStore};

/// Per-entity snapshots for one entity kind.
pub struct EntityCache<T> {
    store: SharedStore,
    namespace: Namespace,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            namespace: self.namespace,
            _entity: PhantomData,
        }
    }
}

impl<T: Cacheable> EntityCache<T> {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            namespace: T::NAMESPACE,
            _entity: PhantomData,
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Cached JSON payload for `id`, exactly as it was stored.
    pub async fn get_raw(&self, id: &str) -> Option<String> {
        lookup_outcome(self.namespace, id, self.store.get(self.namespace, id).await)
    }

    /// Cached entity for `id`. Undecodable payloads count as misses.
    pub async fn get(&self, id: &str) -> Option<T> {
        let payload = self.get_raw(id).await?;
        match serde_json::from_str(&payload) {
            Ok(entity) => Some(entity),
            Err(err) => {
                tracing::warn!(
                    target = "catalog::cache",
                    namespace = self.namespace.as_str(),
                    key = id,
                    error = %err,
                    "discarding undecodable cache payload"
                );
                None
            }
        }
    }

    pub async fn set(&self, entity: &T) -> Result<(), CacheError> {
        let payload = serde_json::to_string(entity)?;
        self.store
            .set(self.namespace, &entity.cache_id(), payload)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), CacheError> {
        self.store.delete(self.namespace, id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::cache::store::{KeyValueStore, MemoryStore, UnavailableStore};
    use crate::domain::entities::{Category, Product};

    fn product() -> Product {
        Product {
            id: "5c1d".to_string(),
            category_id: 2,
            title: "kettle".to_string(),
            image_url: "http://img/kettle.png".to_string(),
            price: 30.0,
            description: "boils".to_string(),
            created_at: datetime!(2024-05-01 10:00:00 UTC),
            updated_at: datetime!(2024-05-02 10:00:00 UTC),
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_an_equal_entity() {
        let cache = EntityCache::<Product>::new(Arc::new(MemoryStore::new()));
        let entity = product();

        cache.set(&entity).await.expect("set product");
        assert_eq!(cache.get(&entity.id).await, Some(entity.clone()));

        cache.delete(&entity.id).await.expect("delete product");
        assert_eq!(cache.get(&entity.id).await, None);
    }

    #[tokio::test]
    async fn categories_are_keyed_by_numeric_id() {
        let store = Arc::new(MemoryStore::new());
        let cache = EntityCache::<Category>::new(store.clone());
        let category = Category {
            id: 12,
            title: "garden".to_string(),
            position: 3,
            image_url: String::new(),
            created_at: datetime!(2024-05-01 10:00:00 UTC),
            updated_at: datetime!(2024-05-01 10:00:00 UTC),
        };

        cache.set(&category).await.unwrap();
        assert!(
            store
                .get(Namespace::Category, "12")
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(cache.namespace(), Namespace::Category);
    }

    #[tokio::test]
    async fn empty_and_corrupt_payloads_are_misses() {
        let store = Arc::new(MemoryStore::new());
        let cache = EntityCache::<Product>::new(store.clone());

        store
            .set(Namespace::Product, "empty", String::new())
            .await
            .unwrap();
        store
            .set(Namespace::Product, "corrupt", "{not json".to_string())
            .await
            .unwrap();

        assert_eq!(cache.get_raw("empty").await, None);
        assert_eq!(cache.get("corrupt").await, None);
        assert_eq!(cache.get_raw("corrupt").await.as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn backend_errors_are_misses() {
        let cache = EntityCache::<Product>::new(Arc::new(UnavailableStore));
        assert_eq!(cache.get("anything").await, None);
        assert!(cache.set(&product()).await.is_err());
    }
}
