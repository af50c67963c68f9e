//! Cache-aside read/write paths shared by every catalog entity kind.
//!
//! Reads consult the entity cache first and fall through to the store on a miss.
//! Writes go to the store synchronously and are mirrored into the cache from a
//! detached task, so a cache failure never fails the request.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::form_urlencoded;

use crate::application::ordering::{
    CATEGORY_COLUMN_ALIASES, ColumnAliases, OrderingError, PRODUCT_COLUMN_ALIASES, SortOrder,
};
use crate::application::pagination::{Pagination, PaginationError};
use crate::application::repos::{CategoriesRepo, ListQuery, ProductsRepo, RepoError};
use crate::cache::{
    CacheMirror, Cacheable, CachedListing, EntityCache, ResponseCache, SharedStore,
};
use crate::domain::entities::{CatalogEntity, Category, Product};
use crate::domain::error::DomainError;

pub const ORDER_BY_PARAM: &str = "orderBy";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Ordering(#[from] OrderingError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid {kind} id `{value}`")]
    InvalidId { kind: &'static str, value: String },
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// Parsed list parameters: the storage query plus the in-memory page window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub query: ListQuery,
    pub pagination: Pagination,
}

impl ListRequest {
    /// `orderBy` is checked before the pagination parameters.
    pub fn parse(raw_query: Option<&str>, aliases: ColumnAliases) -> Result<Self, CatalogError> {
        let order_by = form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes())
            .find(|(key, _)| key == ORDER_BY_PARAM)
            .map(|(_, value)| value.into_owned());
        let order = SortOrder::parse(order_by.as_deref(), aliases)?;
        let pagination = Pagination::from_query(raw_query)?;

        Ok(Self {
            query: ListQuery {
                offset: pagination.offset(),
                limit: pagination.limit(),
                order,
            },
            pagination,
        })
    }
}

/// One page cut out of the rows the store returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    /// Rows returned by the store before slicing.
    pub returned: usize,
}

impl<T> ListingPage<T> {
    pub fn from_rows(mut rows: Vec<T>, pagination: Pagination) -> Result<Self, CatalogError> {
        let returned = rows.len();
        let window = pagination.window(returned)?;
        rows.truncate(window.end);
        let items = rows.split_off(window.start);

        Ok(Self {
            items,
            pagination,
            returned,
        })
    }
}

/// Outcome of a point read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Payload served verbatim from the cache.
    Cached(String),
    /// Row read from the store.
    Loaded(T),
}

/// Storage operations the catalog needs for one entity kind.
#[async_trait]
pub trait CatalogStore<T: CatalogEntity>: Send + Sync {
    fn column_aliases(&self) -> ColumnAliases;

    async fn list(&self, query: &ListQuery) -> Result<Vec<T>, RepoError>;

    async fn find(&self, id: &T::Id) -> Result<T, RepoError>;

    async fn create(&self, entity: &T) -> Result<T::Id, RepoError>;

    async fn update(&self, entity: &T) -> Result<(), RepoError>;

    async fn delete(&self, id: &T::Id) -> Result<(), RepoError>;
}

#[async_trait]
impl CatalogStore<Product> for Arc<dyn ProductsRepo> {
    fn column_aliases(&self) -> ColumnAliases {
        PRODUCT_COLUMN_ALIASES
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Product>, RepoError> {
        self.list_products(query).await
    }

    async fn find(&self, id: &String) -> Result<Product, RepoError> {
        self.find_product(id).await
    }

    async fn create(&self, entity: &Product) -> Result<String, RepoError> {
        self.create_product(entity).await
    }

    async fn update(&self, entity: &Product) -> Result<(), RepoError> {
        self.update_product(entity).await
    }

    async fn delete(&self, id: &String) -> Result<(), RepoError> {
        self.delete_product(id).await
    }
}

#[async_trait]
impl CatalogStore<Category> for Arc<dyn CategoriesRepo> {
    fn column_aliases(&self) -> ColumnAliases {
        CATEGORY_COLUMN_ALIASES
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Category>, RepoError> {
        self.list_categories(query).await
    }

    async fn find(&self, id: &i32) -> Result<Category, RepoError> {
        self.find_category(*id).await
    }

    async fn create(&self, entity: &Category) -> Result<i32, RepoError> {
        self.create_category(entity).await
    }

    async fn update(&self, entity: &Category) -> Result<(), RepoError> {
        self.update_category(entity).await
    }

    async fn delete(&self, id: &i32) -> Result<(), RepoError> {
        self.delete_category(*id).await
    }
}

/// Cache-aside service for one entity kind.
pub struct CatalogService<T: Cacheable> {
    store: Arc<dyn CatalogStore<T>>,
    cache: EntityCache<T>,
    responses: ResponseCache,
    mirror: CacheMirror,
}

impl<T: Cacheable> Clone for CatalogService<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            responses: self.responses.clone(),
            mirror: self.mirror.clone(),
        }
    }
}

impl<T: Cacheable> CatalogService<T> {
    pub fn new(store: Arc<dyn CatalogStore<T>>, cache_store: SharedStore) -> Self {
        Self {
            store,
            cache: EntityCache::new(cache_store.clone()),
            responses: ResponseCache::new(cache_store.clone()),
            mirror: CacheMirror::new(cache_store),
        }
    }

    pub fn parse_id(raw: &str) -> Result<T::Id, CatalogError> {
        raw.parse::<T::Id>().map_err(|_| CatalogError::InvalidId {
            kind: T::KIND,
            value: raw.to_string(),
        })
    }

    pub fn column_aliases(&self) -> ColumnAliases {
        self.store.column_aliases()
    }

    pub async fn cached_listing(&self, signature: &str) -> Option<CachedListing> {
        self.responses.get(signature).await
    }

    pub fn mirror_listing(&self, signature: String, listing: CachedListing) -> JoinHandle<()> {
        self.mirror.store_listing(signature, listing)
    }

    pub async fn list(&self, raw_query: Option<&str>) -> Result<ListingPage<T>, CatalogError> {
        let request = ListRequest::parse(raw_query, self.column_aliases())?;
        let rows = self.store.list(&request.query).await?;
        ListingPage::from_rows(rows, request.pagination)
    }

    /// Point read. A store hit is mirrored into the cache in the background.
    pub async fn get(&self, raw_id: &str) -> Result<Lookup<T>, CatalogError> {
        let id = Self::parse_id(raw_id)?;
        if let Some(payload) = self.cache.get_raw(&id.to_string()).await {
            return Ok(Lookup::Cached(payload));
        }

        let entity = self.store.find(&id).await?;
        self.mirror.set_entity(entity.clone());
        Ok(Lookup::Loaded(entity))
    }

    pub async fn create(&self, entity: T) -> Result<T::Id, CatalogError> {
        entity.validate()?;
        let id = self.store.create(&entity).await?;
        self.refresh_in_background(id.clone());
        Ok(id)
    }

    /// Merge `patch` field by field over the stored row and write the full row back.
    pub async fn update(&self, raw_id: &str, patch: Value) -> Result<T, CatalogError> {
        let id = Self::parse_id(raw_id)?;
        let stored = self.store.find(&id).await?;
        let merged = merge_fields(&stored, patch)?;
        merged.validate()?;
        self.store.update(&merged).await?;
        self.refresh_in_background(id);
        Ok(merged)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<T::Id, CatalogError> {
        let id = Self::parse_id(raw_id)?;
        self.store.delete(&id).await?;
        self.mirror.delete_entity::<T>(id.to_string());
        Ok(id)
    }

    fn refresh_in_background(&self, id: T::Id) -> JoinHandle<()> {
        let store = self.store.clone();
        let key = id.to_string();
        self.mirror
            .refresh_entity(key, move || async move { store.find(&id).await })
    }
}

fn merge_fields<T: CatalogEntity>(stored: &T, patch: Value) -> Result<T, CatalogError> {
    let Value::Object(fields) = patch else {
        return Err(CatalogError::InvalidBody(
            "expected a JSON object".to_string(),
        ));
    };

    let mut base = serde_json::to_value(stored)
        .map_err(|err| CatalogError::InvalidBody(err.to_string()))?;
    if let Value::Object(base_fields) = &mut base {
        base_fields.extend(fields);
    }

    let mut merged: T =
        serde_json::from_value(base).map_err(|err| CatalogError::InvalidBody(err.to_string()))?;
    merged.set_id(stored.id());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    fn category(id: i32, title: &str, position: i32) -> Category {
        Category {
            id,
            title: title.to_string(),
            position,
            image_url: String::new(),
            created_at: datetime!(2024-03-01 00:00:00 UTC),
            updated_at: datetime!(2024-03-01 00:00:00 UTC),
        }
    }

    #[test]
    fn list_request_maps_pagination_into_store_window() {
        let request = ListRequest::parse(
            Some("orderBy=position:asc&limit=30&offset=5&perPage=10&page=2"),
            CATEGORY_COLUMN_ALIASES,
        )
        .unwrap();

        assert_eq!(request.query.limit, 30);
        assert_eq!(request.query.offset, 5);
        let order = request.query.order.unwrap();
        assert_eq!(order.column, "pos");
        assert!(order.ascending);
        assert_eq!(request.pagination.start(), 10);
        assert_eq!(request.pagination.end(), 20);
    }

    #[test]
    fn bad_direction_is_reported_before_bad_pagination() {
        let err = ListRequest::parse(Some("orderBy=title:up&page=x"), PRODUCT_COLUMN_ALIASES)
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Ordering(OrderingError::InvalidDirection { .. })
        ));

        let err = ListRequest::parse(Some("page=x"), PRODUCT_COLUMN_ALIASES).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Pagination(PaginationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn listing_page_slices_the_returned_rows() {
        let rows: Vec<u32> = (0..25).collect();
        let page = ListingPage::from_rows(rows, Pagination::resolve(3, 10, 0, 0)).unwrap();
        assert_eq!(page.items, (20..25).collect::<Vec<_>>());
        assert_eq!(page.returned, 25);

        let rows: Vec<u32> = (0..5).collect();
        let err = ListingPage::from_rows(rows, Pagination::resolve(2, 5, 0, 0)).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Pagination(PaginationError::PageOutOfRange { page: 2 })
        ));
    }

    #[test]
    fn merge_overlays_given_fields_and_keeps_the_stored_id() {
        let stored = category(3, "garden", 4);
        let merged = merge_fields(&stored, json!({"title": "yard", "id": 99})).unwrap();
        assert_eq!(merged.id, 3);
        assert_eq!(merged.title, "yard");
        assert_eq!(merged.position, 4);
        assert_eq!(merged.created_at, stored.created_at);
    }

    #[test]
    fn merge_rejects_non_objects_and_mistyped_fields() {
        let stored = category(3, "garden", 4);
        assert!(matches!(
            merge_fields(&stored, json!(["title"])),
            Err(CatalogError::InvalidBody(_))
        ));
        assert!(matches!(
            merge_fields(&stored, json!({"position": "first"})),
            Err(CatalogError::InvalidBody(_))
        ));
    }

    #[test]
    fn category_ids_must_be_integers() {
        assert_eq!(CatalogService::<Category>::parse_id("12").unwrap(), 12);
        assert!(matches!(
            CatalogService::<Category>::parse_id("twelve"),
            Err(CatalogError::InvalidId { kind: "category", .. })
        ));
        assert_eq!(
            CatalogService::<Product>::parse_id("any-string").unwrap(),
            "any-string"
        );
    }
}
