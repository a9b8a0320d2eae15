//! Catalog service: the operations the HTTP layer calls.
//!
//! Validates inputs, resolves listings through the pagination engine, routes
//! partial updates through the concurrency guard and helpful votes through the
//! rating maintainer. Store errors come back as [`CatalogError`](crate::CatalogError).

use std::sync::Arc;

use tracing::{info, instrument};

use catalog_core::{Filters, ProductId, ReviewId};
use catalog_products::{NewProduct, Product, ProductFilter, ProductPatch};
use catalog_reviews::{NewReview, Review, ReviewFilter, ReviewPatch};

use crate::error::CatalogResult;
use crate::guard::ConcurrencyGuard;
use crate::ratings::RatingMaintainer;
use crate::store::{CatalogStore, Page};

pub struct CatalogService<S: ?Sized> {
    store: Arc<S>,
    guard: ConcurrencyGuard<S>,
    ratings: RatingMaintainer<S>,
}

impl<S: ?Sized> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            guard: self.guard.clone(),
            ratings: self.ratings.clone(),
        }
    }
}

impl<S: ?Sized> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            guard: ConcurrencyGuard::new(store.clone()),
            ratings: RatingMaintainer::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ratings(&self) -> &RatingMaintainer<S> {
        &self.ratings
    }
}

impl<S> CatalogService<S>
where
    S: CatalogStore + ?Sized,
{
    // Products

    #[instrument(skip(self, input), err)]
    pub async fn create_product(&self, input: NewProduct) -> CatalogResult<Product> {
        input.validate()?;
        let product = self.store.insert_product(&input).await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> CatalogResult<Product> {
        Ok(self.store.get_product(id).await?)
    }

    /// Guarded partial update. `expected_version` defaults to the version just read.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        expected_version: Option<i32>,
    ) -> CatalogResult<Product> {
        self.guard.update_product(id, patch, expected_version).await
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn delete_product(&self, id: ProductId) -> CatalogResult<()> {
        self.store.delete_product(id).await?;
        info!("product deleted");
        Ok(())
    }

    pub async fn list_products(
        &self,
        filter: ProductFilter,
        filters: Filters,
    ) -> CatalogResult<Page<Product>> {
        let query = filters.into_query(catalog_products::SORT_SAFELIST)?;
        Ok(self.store.list_products(&filter, &query).await?)
    }

    // Reviews

    /// Insert a review; the product's average is recomputed with it.
    #[instrument(skip(self, input), fields(product_id = %input.product_id), err)]
    pub async fn create_review(&self, input: NewReview) -> CatalogResult<Review> {
        input.validate()?;
        let review = self.store.insert_review(&input).await?;
        info!(review_id = %review.id, "review created");
        Ok(review)
    }

    pub async fn get_review(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
    ) -> CatalogResult<Review> {
        Ok(self.store.get_review(product_id, review_id).await?)
    }

    pub async fn update_review(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
        patch: ReviewPatch,
        expected_version: Option<i32>,
    ) -> CatalogResult<Review> {
        self.guard
            .update_review(product_id, review_id, patch, expected_version)
            .await
    }

    #[instrument(skip(self), fields(product_id = %product_id, review_id = %review_id), err)]
    pub async fn delete_review(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
    ) -> CatalogResult<()> {
        self.store.delete_review(product_id, review_id).await?;
        info!("review deleted");
        Ok(())
    }

    /// Reviews across all products.
    pub async fn list_reviews(
        &self,
        filter: ReviewFilter,
        filters: Filters,
    ) -> CatalogResult<Page<Review>> {
        let query = filters.into_query(catalog_reviews::SORT_SAFELIST)?;
        Ok(self.store.list_reviews(&filter, &query).await?)
    }

    /// Reviews of one product. An unknown product yields an empty page.
    pub async fn list_product_reviews(
        &self,
        product_id: ProductId,
        filter: ReviewFilter,
        filters: Filters,
    ) -> CatalogResult<Page<Review>> {
        self.list_reviews(filter.for_product(product_id), filters)
            .await
    }

    pub async fn mark_helpful(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
    ) -> CatalogResult<Review> {
        self.ratings.mark_helpful(product_id, review_id).await
    }
}
