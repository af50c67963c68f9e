//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::application::ordering::{OrderingError, SortOrder};
use crate::domain::entities::{Category, Product, ProductWithCategory, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Ordering(#[from] OrderingError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Storage-level window and ordering for a list query.
///
/// `limit == 0` omits `LIMIT`/`OFFSET` entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub offset: u32,
    pub limit: u32,
    pub order: Option<SortOrder>,
}

/// One item pulled from a bulk export.
#[derive(Debug)]
pub enum StreamEvent<T> {
    Row(T),
    Error(RepoError),
    End,
}

/// Receiving half of a bulk export. The producer sends [`StreamEvent::End`] last.
pub type EntityStream<T> = mpsc::Receiver<StreamEvent<T>>;

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>, RepoError>;

    async fn list_products_with_category(
        &self,
        query: &ListQuery,
    ) -> Result<Vec<ProductWithCategory>, RepoError>;

    async fn find_product(&self, id: &str) -> Result<Product, RepoError>;

    async fn find_product_with_category(
        &self,
        id: &str,
    ) -> Result<ProductWithCategory, RepoError>;

    /// Insert under a freshly generated identifier and return it.
    async fn create_product(&self, product: &Product) -> Result<String, RepoError>;

    async fn update_product(&self, product: &Product) -> Result<(), RepoError>;

    async fn delete_product(&self, id: &str) -> Result<(), RepoError>;

    /// Export every product through a channel holding at most `buffer` rows.
    fn stream_products(&self, buffer: usize) -> EntityStream<Product>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn list_categories(&self, query: &ListQuery) -> Result<Vec<Category>, RepoError>;

    async fn find_category(&self, id: i32) -> Result<Category, RepoError>;

    /// Insert and return the store-assigned identifier.
    async fn create_category(&self, category: &Category) -> Result<i32, RepoError>;

    async fn update_category(&self, category: &Category) -> Result<(), RepoError>;

    async fn delete_category(&self, id: i32) -> Result<(), RepoError>;

    fn stream_categories(&self, buffer: usize) -> EntityStream<Category>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, RepoError>;
}
