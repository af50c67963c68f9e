//! In-memory repositories and request helpers shared by the integration tests.

#![allow(dead_code)]

use std::cmp::Ordering as CmpOrdering;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use catalog::application::ordering::validate_sort_column;
use catalog::application::repos::{
    CategoriesRepo, EntityStream, ListQuery, ProductsRepo, RepoError, StreamEvent, UsersRepo,
};
use catalog::domain::entities::{Category, Product, ProductWithCategory, UserRecord};
use http_body_util::BodyExt;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "correct-horse";

/// Products, categories and users kept in memory, with the same contract as the
/// Postgres repositories: sort columns are validated, unknown columns fail, and
/// `limit == 0` returns every row.
#[derive(Default)]
pub struct FakeCatalog {
    products: Mutex<Vec<Product>>,
    categories: Mutex<Vec<Category>>,
    users: Mutex<Vec<UserRecord>>,
    next_product: AtomicUsize,
    next_category: AtomicI32,
    next_user: AtomicI32,
    pub product_reads: AtomicUsize,
    product_export_fault: Mutex<Option<usize>>,
}

impl FakeCatalog {
    pub fn insert_category(&self, category: Category) {
        self.next_category.fetch_max(category.id, Ordering::SeqCst);
        self.categories.lock().unwrap().push(category);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.lock().unwrap().push(product);
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|product| product.id == id)
            .cloned()
    }

    pub fn category(&self, id: i32) -> Option<Category> {
        self.categories
            .lock()
            .unwrap()
            .iter()
            .find(|category| category.id == id)
            .cloned()
    }

    /// Make the product export report a scan error just before row `index`.
    pub fn fail_product_export_at(&self, index: usize) {
        *self.product_export_fault.lock().unwrap() = Some(index);
    }

    pub fn reads(&self) -> usize {
        self.product_reads.load(Ordering::SeqCst)
    }
}

fn window<T>(mut rows: Vec<T>, query: &ListQuery) -> Vec<T> {
    if query.limit == 0 {
        return rows;
    }
    let offset = (query.offset as usize).min(rows.len());
    rows.drain(..offset);
    rows.truncate(query.limit as usize);
    rows
}

fn direction(ordering: CmpOrdering, ascending: bool) -> CmpOrdering {
    if ascending { ordering } else { ordering.reverse() }
}

fn missing_column(column: &str) -> RepoError {
    RepoError::Persistence(format!("column \"{column}\" does not exist"))
}

fn sort_products(rows: &mut [Product], query: &ListQuery) -> Result<(), RepoError> {
    let Some(order) = query.order.as_ref() else {
        return Ok(());
    };
    let column = validate_sort_column(&order.column)?;
    let compare: fn(&Product, &Product) -> CmpOrdering = match column {
        "id" => |a, b| a.id.cmp(&b.id),
        "title" => |a, b| a.title.cmp(&b.title),
        "price" => |a, b| a.price.total_cmp(&b.price),
        "category_id" => |a, b| a.category_id.cmp(&b.category_id),
        other => return Err(missing_column(other)),
    };
    rows.sort_by(|a, b| direction(compare(a, b), order.ascending));
    Ok(())
}

fn sort_categories(rows: &mut [Category], query: &ListQuery) -> Result<(), RepoError> {
    let Some(order) = query.order.as_ref() else {
        return Ok(());
    };
    let column = validate_sort_column(&order.column)?;
    let compare: fn(&Category, &Category) -> CmpOrdering = match column {
        "id" => |a, b| a.id.cmp(&b.id),
        "title" => |a, b| a.title.cmp(&b.title),
        "pos" => |a, b| a.position.cmp(&b.position),
        other => return Err(missing_column(other)),
    };
    rows.sort_by(|a, b| direction(compare(a, b), order.ascending));
    Ok(())
}

fn export<T: Send + 'static>(rows: Vec<T>, buffer: usize, fault: Option<usize>) -> EntityStream<T> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(async move {
        for (index, row) in rows.into_iter().enumerate() {
            if fault == Some(index) {
                let error = RepoError::Persistence("error decoding column \"price\"".to_string());
                if tx.send(StreamEvent::Error(error)).await.is_err() {
                    return;
                }
            }
            if tx.send(StreamEvent::Row(row)).await.is_err() {
                return;
            }
        }
        let _ = tx.send(StreamEvent::End).await;
    });
    rx
}

#[async_trait]
impl ProductsRepo for FakeCatalog {
    async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>, RepoError> {
        let mut rows = self.products.lock().unwrap().clone();
        sort_products(&mut rows, query)?;
        Ok(window(rows, query))
    }

    async fn list_products_with_category(
        &self,
        query: &ListQuery,
    ) -> Result<Vec<ProductWithCategory>, RepoError> {
        let products = self.list_products(query).await?;
        Ok(products
            .into_iter()
            .filter_map(|product| {
                let category = self.category(product.category_id)?;
                Some(ProductWithCategory { product, category })
            })
            .collect())
    }

    async fn find_product(&self, id: &str) -> Result<Product, RepoError> {
        self.product_reads.fetch_add(1, Ordering::SeqCst);
        self.product(id).ok_or(RepoError::NotFound)
    }

    async fn find_product_with_category(
        &self,
        id: &str,
    ) -> Result<ProductWithCategory, RepoError> {
        let product = self.product(id).ok_or(RepoError::NotFound)?;
        let category = self
            .category(product.category_id)
            .ok_or(RepoError::NotFound)?;
        Ok(ProductWithCategory { product, category })
    }

    async fn create_product(&self, product: &Product) -> Result<String, RepoError> {
        if self.category(product.category_id).is_none() {
            return Err(RepoError::InvalidInput {
                message: format!("category {} does not exist", product.category_id),
            });
        }
        let id = format!("p{:04}", self.next_product.fetch_add(1, Ordering::SeqCst));
        let now = OffsetDateTime::now_utc();
        self.insert_product(Product {
            id: id.clone(),
            created_at: now,
            updated_at: now,
            ..product.clone()
        });
        Ok(id)
    }

    async fn update_product(&self, product: &Product) -> Result<(), RepoError> {
        let mut products = self.products.lock().unwrap();
        let stored = products
            .iter_mut()
            .find(|stored| stored.id == product.id)
            .ok_or(RepoError::NotFound)?;
        *stored = product.clone();
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> Result<(), RepoError> {
        let mut products = self.products.lock().unwrap();
        let before = products.len();
        products.retain(|product| product.id != id);
        if products.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    fn stream_products(&self, buffer: usize) -> EntityStream<Product> {
        let fault = *self.product_export_fault.lock().unwrap();
        export(self.products.lock().unwrap().clone(), buffer, fault)
    }
}

#[async_trait]
impl CategoriesRepo for FakeCatalog {
    async fn list_categories(&self, query: &ListQuery) -> Result<Vec<Category>, RepoError> {
        let mut rows = self.categories.lock().unwrap().clone();
        sort_categories(&mut rows, query)?;
        Ok(window(rows, query))
    }

    async fn find_category(&self, id: i32) -> Result<Category, RepoError> {
        self.category(id).ok_or(RepoError::NotFound)
    }

    async fn create_category(&self, category: &Category) -> Result<i32, RepoError> {
        let id = self.next_category.fetch_add(1, Ordering::SeqCst) + 1;
        self.categories.lock().unwrap().push(Category {
            id,
            ..category.clone()
        });
        Ok(id)
    }

    async fn update_category(&self, category: &Category) -> Result<(), RepoError> {
        let mut categories = self.categories.lock().unwrap();
        let stored = categories
            .iter_mut()
            .find(|stored| stored.id == category.id)
            .ok_or(RepoError::NotFound)?;
        *stored = category.clone();
        Ok(())
    }

    async fn delete_category(&self, id: i32) -> Result<(), RepoError> {
        let referenced = self
            .products
            .lock()
            .unwrap()
            .iter()
            .any(|product| product.category_id == id);
        if referenced {
            return Err(RepoError::InvalidInput {
                message: format!("category {id} is still referenced by products"),
            });
        }

        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|category| category.id != id);
        if categories.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    fn stream_categories(&self, buffer: usize) -> EntityStream<Category> {
        export(self.categories.lock().unwrap().clone(), buffer, None)
    }
}

#[async_trait]
impl UsersRepo for FakeCatalog {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|user| user.username == username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let record = UserRecord {
            id: self.next_user.fetch_add(1, Ordering::SeqCst) + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(record.clone());
        Ok(record)
    }
}

pub fn category(id: i32, title: &str, position: i32) -> Category {
    Category {
        id,
        title: title.to_string(),
        position,
        image_url: format!("http://img.test/{title}.png"),
        created_at: datetime!(2024-05-01 00:00:00 UTC),
        updated_at: datetime!(2024-05-01 00:00:00 UTC),
    }
}

pub fn product(id: &str, category_id: i32, title: &str, price: f64) -> Product {
    Product {
        id: id.to_string(),
        category_id,
        title: title.to_string(),
        image_url: String::new(),
        price,
        description: format!("{title} description"),
        created_at: datetime!(2024-05-02 00:00:00 UTC),
        updated_at: datetime!(2024-05-02 00:00:00 UTC),
    }
}

pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body should be JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "shop.test")
        .body(Body::empty())
        .expect("request should build")
}

pub fn authed(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "shop.test")
        .header("authorization", basic_auth(USERNAME, PASSWORD))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

/// Poll `check` until it holds, giving detached cache tasks time to run.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
