//! Catalog entities mirrored from persistent storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

/// A sellable item. Identifiers are generated client-side at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category_id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(with = "time::serde::rfc3339", default = "epoch")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339", default = "epoch")]
    pub updated_at: OffsetDateTime,
}

/// A product grouping. Identifiers are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub image_url: String,
    #[serde(with = "time::serde::rfc3339", default = "epoch")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339", default = "epoch")]
    pub updated_at: OffsetDateTime,
}

/// A product with its owning category row attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductWithCategory {
    #[serde(flatten)]
    pub product: Product,
    pub category: Category,
}

/// An API user allowed to perform writes.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

fn epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// Entity kinds served by the catalog.
pub trait CatalogEntity:
    Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static
{
    type Id: FromStr + fmt::Display + Clone + Send + Sync + 'static;

    /// Kind name used in messages, log fields and cache namespaces.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;

    fn set_id(&mut self, id: Self::Id);

    /// Cache key for this entity.
    fn cache_id(&self) -> String {
        self.id().to_string()
    }

    /// Field-level checks applied before a write reaches the store.
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

impl CatalogEntity for Product {
    type Id = String;
    const KIND: &'static str = "product";

    fn id(&self) -> String {
        self.id.clone()
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), DomainError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DomainError::validation(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

impl CatalogEntity for Category {
    type Id = i32;
    const KIND: &'static str = "category";

    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}
