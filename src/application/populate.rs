//! Bulk seeding of the store and bulk population of the entity caches.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::{StreamExt, stream};
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::repos::{
    CategoriesRepo, EntityStream, ProductsRepo, RepoError, StreamEvent,
};
use crate::cache::{Cacheable, EntityCache, SharedStore};
use crate::domain::entities::{Category, Product};

pub const SEED_CATEGORIES: [&str; 18] = [
    "sports",
    "house",
    "garden",
    "electronics",
    "games",
    "food",
    "drinks",
    "furniture",
    "space",
    "mobile",
    "movies",
    "tv",
    "pc",
    "books",
    "groceries",
    "devices",
    "music",
    "instruments",
];

const IMAGE_HOST: &str = "http://images.catalog.local";

#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("failed to create seed category `{title}`: {source}")]
    Category {
        title: &'static str,
        #[source]
        source: RepoError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub products_created: usize,
    pub products_failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheFillReport {
    pub products: usize,
    pub categories: usize,
    pub stream_errors: usize,
    pub cache_failures: usize,
    pub elapsed: Duration,
}

pub struct Populator {
    products: Arc<dyn ProductsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    cache: SharedStore,
}

impl Populator {
    pub fn new(
        products: Arc<dyn ProductsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        cache: SharedStore,
    ) -> Self {
        Self {
            products,
            categories,
            cache,
        }
    }

    /// Create the seed categories, then `amount` products spread over them with
    /// `workers` concurrent inserts. Product failures are logged and counted.
    pub async fn seed(&self, workers: usize, amount: usize) -> Result<SeedReport, PopulateError> {
        let started = Instant::now();

        let mut category_ids = Vec::with_capacity(SEED_CATEGORIES.len());
        for (index, &title) in SEED_CATEGORIES.iter().enumerate() {
            let id = self
                .categories
                .create_category(&seed_category(index, title))
                .await
                .map_err(|source| PopulateError::Category { title, source })?;
            category_ids.push(id);
        }

        let failed = AtomicUsize::new(0);
        let products = &self.products;
        let category_ids = &category_ids;
        let failed_ref = &failed;
        stream::iter(0..amount)
            .for_each_concurrent(workers.max(1), |index| async move {
                let product = seed_product(index, category_ids);
                if let Err(err) = products.create_product(&product).await {
                    failed_ref.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        target = "catalog::populate",
                        index,
                        error = %err,
                        "failed to insert seed product"
                    );
                }
            })
            .await;

        let products_failed = failed.into_inner();
        let report = SeedReport {
            categories: category_ids.len(),
            products_created: amount - products_failed,
            products_failed,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            target = "catalog::populate",
            categories = report.categories,
            products = report.products_created,
            failed = report.products_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "store populated"
        );
        Ok(report)
    }

    /// Export both entity kinds from the store and write every row into its cache.
    pub async fn fill_cache(&self, workers: usize, buffer: usize) -> CacheFillReport {
        let started = Instant::now();
        let workers = workers.max(1);

        let categories = drain_into_cache(
            self.categories.stream_categories(buffer),
            EntityCache::<Category>::new(self.cache.clone()),
            1,
        );
        let products = drain_into_cache(
            self.products.stream_products(buffer),
            EntityCache::<Product>::new(self.cache.clone()),
            workers,
        );
        let (categories, products) = tokio::join!(categories, products);

        let report = CacheFillReport {
            products: products.written,
            categories: categories.written,
            stream_errors: products.stream_errors + categories.stream_errors,
            cache_failures: products.cache_failures + categories.cache_failures,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            target = "catalog::populate",
            products = report.products,
            categories = report.categories,
            stream_errors = report.stream_errors,
            cache_failures = report.cache_failures,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "cache populated"
        );
        report
    }
}

#[derive(Default)]
struct DrainCounts {
    written: usize,
    stream_errors: usize,
    cache_failures: usize,
}

async fn drain_into_cache<T: Cacheable>(
    receiver: EntityStream<T>,
    cache: EntityCache<T>,
    workers: usize,
) -> DrainCounts {
    let written = AtomicUsize::new(0);
    let stream_errors = AtomicUsize::new(0);
    let cache_failures = AtomicUsize::new(0);

    let events = stream::unfold(receiver, |mut receiver| async move {
        match receiver.recv().await {
            Some(StreamEvent::End) | None => None,
            Some(event) => Some((event, receiver)),
        }
    });

    let cache = &cache;
    let (written_ref, errors_ref, failures_ref) = (&written, &stream_errors, &cache_failures);
    events
        .for_each_concurrent(workers, |event| async move {
            match event {
                StreamEvent::Row(entity) => match cache.set(&entity).await {
                    Ok(()) => {
                        written_ref.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        failures_ref.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            target = "catalog::populate",
                            kind = T::KIND,
                            id = %entity.cache_id(),
                            error = %err,
                            "failed to cache exported row"
                        );
                    }
                },
                StreamEvent::Error(err) => {
                    errors_ref.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        target = "catalog::populate",
                        kind = T::KIND,
                        error = %err,
                        "export stream reported an error"
                    );
                }
                StreamEvent::End => {}
            }
        })
        .await;

    DrainCounts {
        written: written.into_inner(),
        stream_errors: stream_errors.into_inner(),
        cache_failures: cache_failures.into_inner(),
    }
}

fn seed_category(index: usize, title: &str) -> Category {
    let now = OffsetDateTime::now_utc();
    Category {
        id: 0,
        title: title.to_string(),
        position: ((index * 7) % 20 + 1) as i32,
        image_url: format!("{IMAGE_HOST}/{title}.png"),
        created_at: now,
        updated_at: now,
    }
}

fn seed_product(index: usize, category_ids: &[i32]) -> Product {
    let now = OffsetDateTime::now_utc();
    let category_id = category_ids
        .get(index % category_ids.len().max(1))
        .copied()
        .unwrap_or_default();
    Product {
        id: String::new(),
        category_id,
        title: format!("product {index}"),
        image_url: format!("{IMAGE_HOST}/product{index}.png"),
        price: ((index * 37) % 200) as f64 + (index % 100) as f64 / 100.0,
        description: format!("Description for product {index}"),
        created_at: now,
        updated_at: now,
    }
}
