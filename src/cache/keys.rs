use std::fmt;

use crate::domain::entities::{Category, CatalogEntity, Product};

/// Key space within the cache store.
///
/// Redis keeps one hash per namespace, named by [`Namespace::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Product,
    Category,
    Response,
}

impl Namespace {
    pub const fn as_str(self) -> &'static str {
        match self {
            Namespace::Product => "product",
            Namespace::Category => "category",
            Namespace::Response => "response",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities with their own cache namespace.
pub trait Cacheable: CatalogEntity {
    const NAMESPACE: Namespace;
}

impl Cacheable for Product {
    const NAMESPACE: Namespace = Namespace::Product;
}

impl Cacheable for Category {
    const NAMESPACE: Namespace = Namespace::Category;
}

/// Response-cache key for a request: its path plus the literal query string.
pub fn request_signature(path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_string(),
    }
}
