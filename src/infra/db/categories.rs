use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{CategoriesRepo, EntityStream, ListQuery, RepoError},
    domain::entities::Category,
};

use super::PostgresRepositories;
use super::util::{expect_affected, map_sqlx_error, spawn_export};

const SELECT_CATEGORIES: &str =
    "SELECT id, title, pos, image_url, created_at, updated_at FROM categories";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    title: String,
    pos: i32,
    image_url: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            position: row.pos,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn list_categories(&self, query: &ListQuery) -> Result<Vec<Category>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_CATEGORIES);
        Self::push_list_clauses(&mut qb, query, "")?;

        let rows = qb
            .build_query_as::<CategoryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn find_category(&self, id: i32) -> Result<Category, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!("{SELECT_CATEGORIES} WHERE id = $1"))
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn create_category(&self, category: &Category) -> Result<i32, RepoError> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO categories (title, pos, image_url)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&category.title)
        .bind(category.position)
        .bind(&category.image_url)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn update_category(&self, category: &Category) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET title = $2,
                pos = $3,
                image_url = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(category.id)
        .bind(&category.title)
        .bind(category.position)
        .bind(&category.image_url)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        expect_affected(result.rows_affected())
    }

    async fn delete_category(&self, id: i32) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        expect_affected(result.rows_affected())
    }

    fn stream_categories(&self, buffer: usize) -> EntityStream<Category> {
        spawn_export::<CategoryRow, Category>(self.pool.clone(), SELECT_CATEGORIES, buffer)
    }
}
