use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use catalog_core::{ExpectedVersion, ListQuery, Metadata, ProductId, ReviewId};
use catalog_products::{NewProduct, Product, ProductFilter};
use catalog_reviews::{NewReview, Review, ReviewFilter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity store operation error.
///
/// `NotFound` and `Conflict` are expected outcomes a caller can act on. Everything
/// else is an opaque storage failure (connectivity, timeout, unexpected constraint).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched (including zero rows affected on update/delete).
    #[error("record not found")]
    NotFound,

    /// Conditional update lost an optimistic concurrency race.
    #[error("edit conflict: {0}")]
    Conflict(String),

    /// A store round-trip exceeded the configured operation timeout.
    #[error("store operation `{operation}` timed out")]
    Timeout { operation: &'static str },

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    #[error("connection pool closed")]
    PoolClosed,
}

/// One page of a listing plus its position in the full matching set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub metadata: Metadata,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            metadata: Metadata::default(),
        }
    }
}

/// Product persistence.
///
/// Implementations receive already-validated values; they only enforce identity,
/// referential and version constraints.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert a product. The store assigns `id`, `version = 1` and a zero rating.
    async fn insert_product(&self, input: &NewProduct) -> StoreResult<Product>;

    async fn get_product(&self, id: ProductId) -> StoreResult<Product>;

    /// Write `product`'s client-settable fields if the stored version still equals
    /// `expected`, incrementing the version by one.
    ///
    /// Returns `NotFound` when the row is gone and `Conflict` when it has moved on.
    async fn update_product(
        &self,
        product: &Product,
        expected: ExpectedVersion,
    ) -> StoreResult<Product>;

    /// Hard delete; the product's reviews go with it.
    async fn delete_product(&self, id: ProductId) -> StoreResult<()>;

    /// Page of matching products and the total match count, read together.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Product>>;
}

/// Review persistence.
///
/// Every mutation recomputes the parent product's average rating atomically with
/// the review write: both commit or neither does.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// `NotFound` when `input.product_id` does not exist.
    async fn insert_review(&self, input: &NewReview) -> StoreResult<Review>;

    /// Scoped by product: a review id under another product is `NotFound`.
    async fn get_review(&self, product_id: ProductId, review_id: ReviewId) -> StoreResult<Review>;

    async fn update_review(&self, review: &Review, expected: ExpectedVersion)
    -> StoreResult<Review>;

    async fn delete_review(&self, product_id: ProductId, review_id: ReviewId) -> StoreResult<()>;

    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Review>>;
}

/// Derived-value maintenance. Each operation is one atomic statement; none reads a
/// value into the application and writes it back.
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Set the product's `average_rating` to the mean of its reviews' ratings (0 if none).
    async fn recompute_average(&self, product_id: ProductId) -> StoreResult<()>;

    /// `helpful_count = helpful_count + 1` for the review under `product_id`.
    async fn increment_helpful(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
    ) -> StoreResult<()>;

    /// Recompute every product whose stored average has drifted; returns how many changed.
    async fn recompute_all_averages(&self) -> StoreResult<u64>;
}

/// Everything the catalog needs from a backing store.
pub trait CatalogStore: ProductStore + ReviewStore + RatingStore {}

impl<T> CatalogStore for T where T: ProductStore + ReviewStore + RatingStore {}
