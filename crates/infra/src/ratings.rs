//! Aggregate maintainer: derived values on products and reviews.
//!
//! Both maintained values are written by single atomic statements in the store;
//! nothing here reads a value and writes it back.

use std::sync::Arc;

use tracing::{debug, instrument};

use catalog_core::{ProductId, ReviewId};
use catalog_reviews::Review;

use crate::error::CatalogResult;
use crate::store::{RatingStore, ReviewStore};

pub struct RatingMaintainer<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for RatingMaintainer<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ?Sized> RatingMaintainer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> RatingMaintainer<S>
where
    S: RatingStore + ?Sized,
{
    /// Recompute one product's average from its current reviews.
    ///
    /// Review writes through the store already do this in the same transaction;
    /// calling it again is harmless.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn recompute(&self, product_id: ProductId) -> CatalogResult<()> {
        self.store.recompute_average(product_id).await?;
        Ok(())
    }

    /// Recompute every product whose stored average has drifted.
    #[instrument(skip(self), err)]
    pub async fn reconcile(&self) -> CatalogResult<u64> {
        let changed = self.store.recompute_all_averages().await?;
        debug!(changed, "average ratings reconciled");
        Ok(changed)
    }
}

impl<S> RatingMaintainer<S>
where
    S: RatingStore + ReviewStore + ?Sized,
{
    /// Count one helpful vote and return the review as it is now.
    ///
    /// The returned count may already include votes that landed after ours.
    #[instrument(skip(self), fields(product_id = %product_id, review_id = %review_id), err)]
    pub async fn mark_helpful(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
    ) -> CatalogResult<Review> {
        self.store.increment_helpful(product_id, review_id).await?;
        Ok(self.store.get_review(product_id, review_id).await?)
    }
}
