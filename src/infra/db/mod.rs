//! Postgres-backed repository implementations.

mod categories;
mod products;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
};

use crate::application::ordering::validate_sort_column;
use crate::application::repos::{ListQuery, RepoError};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    /// Append `ORDER BY` and `LIMIT/OFFSET` for a list query.
    ///
    /// The sort column is the only identifier taken from user input; it is
    /// validated before being concatenated. `limit == 0` leaves the window off.
    fn push_list_clauses(
        qb: &mut QueryBuilder<'_, Postgres>,
        query: &ListQuery,
        column_prefix: &str,
    ) -> Result<(), RepoError> {
        if let Some(order) = query.order.as_ref() {
            let column = validate_sort_column(&order.column)?;
            qb.push(" ORDER BY ");
            qb.push(column_prefix);
            qb.push(column);
            qb.push(" ");
            qb.push(order.direction_sql());
        }

        if query.limit > 0 {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(query.limit));
            qb.push(" OFFSET ");
            qb.push_bind(i64::from(query.offset));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ordering::{OrderingError, SortOrder};

    fn render(query: &ListQuery, prefix: &str) -> Result<String, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM products p");
        PostgresRepositories::push_list_clauses(&mut qb, query, prefix)?;
        Ok(qb.sql().to_string())
    }

    #[test]
    fn unlimited_unsorted_query_has_no_clauses() {
        let sql = render(&ListQuery::default(), "").unwrap();
        assert_eq!(sql, "SELECT * FROM products p");
    }

    #[test]
    fn window_is_bound_and_sort_column_is_inlined() {
        let query = ListQuery {
            offset: 100,
            limit: 20,
            order: Some(SortOrder {
                column: "price".to_string(),
                ascending: true,
            }),
        };
        let sql = render(&query, "p.").unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM products p ORDER BY p.price ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn offset_without_limit_is_ignored() {
        let query = ListQuery {
            offset: 30,
            limit: 0,
            order: None,
        };
        assert_eq!(render(&query, "").unwrap(), "SELECT * FROM products p");
    }

    #[test]
    fn unsafe_sort_column_never_reaches_the_sql() {
        let query = ListQuery {
            offset: 0,
            limit: 0,
            order: Some(SortOrder {
                column: "title; DROP TABLE products".to_string(),
                ascending: false,
            }),
        };
        let err = render(&query, "").unwrap_err();
        assert!(matches!(
            err,
            RepoError::Ordering(OrderingError::InjectionAttempt { .. })
        ));
    }
}
