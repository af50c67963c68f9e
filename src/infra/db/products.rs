use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{EntityStream, ListQuery, ProductsRepo, RepoError},
    domain::entities::{Category, Product, ProductWithCategory},
};

use super::PostgresRepositories;
use super::util::{expect_affected, map_sqlx_error, spawn_export};

const SELECT_PRODUCTS: &str = "SELECT id, category_id, title, image_url, price, description, \
     created_at, updated_at FROM products";

const SELECT_PRODUCTS_WITH_CATEGORY: &str = "SELECT p.id, p.category_id, p.title, p.image_url, \
     p.price, p.description, p.created_at, p.updated_at, \
     c.id AS category_row_id, c.title AS category_title, c.pos AS category_pos, \
     c.image_url AS category_image_url, c.created_at AS category_created_at, \
     c.updated_at AS category_updated_at \
     FROM products p INNER JOIN categories c ON c.id = p.category_id";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    category_id: i32,
    title: String,
    image_url: String,
    price: f64,
    description: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            title: row.title,
            image_url: row.image_url,
            price: row.price,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductWithCategoryRow {
    #[sqlx(flatten)]
    product: ProductRow,
    category_row_id: i32,
    category_title: String,
    category_pos: i32,
    category_image_url: String,
    category_created_at: OffsetDateTime,
    category_updated_at: OffsetDateTime,
}

impl From<ProductWithCategoryRow> for ProductWithCategory {
    fn from(row: ProductWithCategoryRow) -> Self {
        Self {
            product: row.product.into(),
            category: Category {
                id: row.category_row_id,
                title: row.category_title,
                position: row.category_pos,
                image_url: row.category_image_url,
                created_at: row.category_created_at,
                updated_at: row.category_updated_at,
            },
        }
    }
}

#[async_trait]
impl ProductsRepo for PostgresRepositories {
    async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_PRODUCTS);
        Self::push_list_clauses(&mut qb, query, "")?;

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_products_with_category(
        &self,
        query: &ListQuery,
    ) -> Result<Vec<ProductWithCategory>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_PRODUCTS_WITH_CATEGORY);
        Self::push_list_clauses(&mut qb, query, "p.")?;

        let rows = qb
            .build_query_as::<ProductWithCategoryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ProductWithCategory::from).collect())
    }

    async fn find_product(&self, id: &str) -> Result<Product, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCTS} WHERE id = $1"))
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_product_with_category(
        &self,
        id: &str,
    ) -> Result<ProductWithCategory, RepoError> {
        let row = sqlx::query_as::<_, ProductWithCategoryRow>(&format!(
            "{SELECT_PRODUCTS_WITH_CATEGORY} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn create_product(&self, product: &Product) -> Result<String, RepoError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO products (id, category_id, title, image_url, price, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&id)
        .bind(product.category_id)
        .bind(&product.title)
        .bind(&product.image_url)
        .bind(product.price)
        .bind(&product.description)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn update_product(&self, product: &Product) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET category_id = $2,
                title = $3,
                image_url = $4,
                price = $5,
                description = $6,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(&product.id)
        .bind(product.category_id)
        .bind(&product.title)
        .bind(&product.image_url)
        .bind(product.price)
        .bind(&product.description)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        expect_affected(result.rows_affected())
    }

    async fn delete_product(&self, id: &str) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        expect_affected(result.rows_affected())
    }

    fn stream_products(&self, buffer: usize) -> EntityStream<Product> {
        spawn_export::<ProductRow, Product>(self.pool.clone(), SELECT_PRODUCTS, buffer)
    }
}
