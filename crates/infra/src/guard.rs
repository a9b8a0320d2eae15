//! Optimistic concurrency guard.
//!
//! Every guarded update follows the same sequence:
//! 1) read the current entity (NotFound if gone)
//! 2) resolve the expected version (caller's, else the one just read)
//! 3) fail fast with Conflict if it is already stale
//! 4) apply the patch and validate the result
//! 5) conditional write `WHERE id = $ AND version = $expected`, bumping the version
//!
//! Step 5 is the authority: a concurrent writer that slips in between 3 and 5
//! still makes the write fail with Conflict.

use std::sync::Arc;

use tracing::{debug, instrument};

use catalog_core::{DomainResult, Entity, ExpectedVersion, ProductId, ReviewId};
use catalog_products::{Product, ProductPatch, validate_product};
use catalog_reviews::{Review, ReviewPatch, validate_review};

use crate::error::CatalogResult;
use crate::store::{ProductStore, ReviewStore};

pub struct ConcurrencyGuard<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ConcurrencyGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ?Sized> ConcurrencyGuard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> ConcurrencyGuard<S>
where
    S: ProductStore + ?Sized,
{
    #[instrument(skip(self, patch), fields(product_id = %id), err)]
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        explicit_version: Option<i32>,
    ) -> CatalogResult<Product> {
        let current = self.store.get_product(id).await?;
        let (next, expected) =
            prepare(current, explicit_version, |p| patch.apply(p), validate_product)?;

        let updated = self.store.update_product(&next, expected).await?;
        debug!(version = updated.version, "product updated");
        Ok(updated)
    }
}

impl<S> ConcurrencyGuard<S>
where
    S: ReviewStore + ?Sized,
{
    #[instrument(skip(self, patch), fields(product_id = %product_id, review_id = %review_id), err)]
    pub async fn update_review(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
        patch: ReviewPatch,
        explicit_version: Option<i32>,
    ) -> CatalogResult<Review> {
        let current = self.store.get_review(product_id, review_id).await?;
        let (next, expected) =
            prepare(current, explicit_version, |r| patch.apply(r), validate_review)?;

        let updated = self.store.update_review(&next, expected).await?;
        debug!(version = updated.version, "review updated");
        Ok(updated)
    }
}

/// Steps 2-4: resolve and check the expectation, then patch and validate.
fn prepare<E: Entity>(
    mut entity: E,
    explicit_version: Option<i32>,
    apply: impl FnOnce(&mut E),
    validate: impl Fn(&E) -> DomainResult<()>,
) -> DomainResult<(E, ExpectedVersion)> {
    let expected = ExpectedVersion::resolve(explicit_version, entity.version());
    expected.check(entity.version())?;

    apply(&mut entity);
    validate(&entity)?;
    Ok((entity, expected))
}
