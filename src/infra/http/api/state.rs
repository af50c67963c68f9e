use std::sync::Arc;

use crate::application::catalog::CatalogService;
use crate::application::repos::{CategoriesRepo, ProductsRepo, UsersRepo};
use crate::application::users::UserService;
use crate::cache::SharedStore;
use crate::domain::entities::{Category, Product};

#[derive(Clone)]
pub struct ApiState {
    pub products: Arc<CatalogService<Product>>,
    pub categories: Arc<CatalogService<Category>>,
    /// Joined product reads (`include=category`) bypass the entity cache.
    pub products_repo: Arc<dyn ProductsRepo>,
    pub users: Arc<UserService>,
}

impl ApiState {
    pub fn new(
        products: Arc<dyn ProductsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        users: Arc<dyn UsersRepo>,
        cache: SharedStore,
    ) -> Self {
        Self {
            products: Arc::new(CatalogService::new(
                Arc::new(products.clone()),
                cache.clone(),
            )),
            categories: Arc::new(CatalogService::new(Arc::new(categories), cache)),
            products_repo: products,
            users: Arc::new(UserService::new(users)),
        }
    }
}
