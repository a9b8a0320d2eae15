use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use catalog_core::{ExpectedVersion, ListQuery, ProductId, ReviewId, SortDirection};
use catalog_products::{NewProduct, Product, ProductFilter};
use catalog_reviews::{NewReview, Review, ReviewFilter};

use super::r#trait::{
    Page, ProductStore, RatingStore, ReviewStore, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    reviews: BTreeMap<ReviewId, Review>,
    last_product_id: i64,
    last_review_id: i64,
}

impl Tables {
    /// Mean of the product's review ratings, 0 when it has none.
    ///
    /// Returns `false` when the product does not exist.
    fn recompute_average(&mut self, product_id: ProductId) -> bool {
        let (sum, count) = self
            .reviews
            .values()
            .filter(|r| r.product_id == product_id)
            .fold((0i64, 0i64), |(sum, count), r| {
                (sum + i64::from(r.rating), count + 1)
            });

        match self.products.get_mut(&product_id) {
            Some(product) => {
                product.average_rating = if count == 0 {
                    0.0
                } else {
                    sum as f64 / count as f64
                };
                true
            }
            None => false,
        }
    }

    fn review_under(&self, product_id: ProductId, review_id: ReviewId) -> Option<&Review> {
        self.reviews
            .get(&review_id)
            .filter(|r| r.product_id == product_id)
    }
}

/// In-memory catalog store.
///
/// Intended for tests/dev. Each operation runs under a single table lock, which
/// gives it the same atomicity the Postgres store gets from one statement or
/// transaction. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    tables: RwLock<Tables>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, operation: &'static str) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned(operation))
    }

    fn write(&self, operation: &'static str) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned(operation))
    }
}

fn poisoned(operation: &'static str) -> StoreError {
    StoreError::Database {
        operation,
        message: "lock poisoned".to_string(),
    }
}

#[async_trait]
impl ProductStore for InMemoryCatalogStore {
    async fn insert_product(&self, input: &NewProduct) -> StoreResult<Product> {
        let mut tables = self.write("insert_product")?;
        tables.last_product_id += 1;

        let product = Product {
            id: ProductId::new(tables.last_product_id),
            name: input.name.clone(),
            category: input.category.clone(),
            image_url: input.image_url.clone(),
            average_rating: 0.0,
            version: 1,
        };
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        let tables = self.read("get_product")?;
        tables.products.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_product(
        &self,
        product: &Product,
        expected: ExpectedVersion,
    ) -> StoreResult<Product> {
        let mut tables = self.write("update_product")?;
        let stored = tables
            .products
            .get_mut(&product.id)
            .ok_or(StoreError::NotFound)?;

        if !expected.matches(stored.version) {
            return Err(StoreError::Conflict(format!(
                "expected version {}, found {}",
                expected.get(),
                stored.version
            )));
        }

        stored.name = product.name.clone();
        stored.category = product.category.clone();
        stored.image_url = product.image_url.clone();
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let mut tables = self.write("delete_product")?;
        if tables.products.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.reviews.retain(|_, r| r.product_id != id);
        Ok(())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Product>> {
        let tables = self.read("list_products")?;
        let matched: Vec<&Product> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .collect();

        let by_column = |a: &Product, b: &Product| match query.sort_column() {
            "name" => a.name.cmp(&b.name),
            "category" => a.category.cmp(&b.category),
            "average_rating" => a.average_rating.total_cmp(&b.average_rating),
            _ => a.id.cmp(&b.id),
        };
        Ok(paginate(matched, query, by_column, |p| p.id.get()))
    }
}

#[async_trait]
impl ReviewStore for InMemoryCatalogStore {
    async fn insert_review(&self, input: &NewReview) -> StoreResult<Review> {
        let mut tables = self.write("insert_review")?;
        if !tables.products.contains_key(&input.product_id) {
            return Err(StoreError::NotFound);
        }
        tables.last_review_id += 1;

        let review = Review {
            id: ReviewId::new(tables.last_review_id),
            product_id: input.product_id,
            rating: input.rating,
            content: input.content.clone(),
            helpful_count: 0,
            created_at: Utc::now(),
            version: 1,
        };
        tables.reviews.insert(review.id, review.clone());
        tables.recompute_average(input.product_id);
        Ok(review)
    }

    async fn get_review(&self, product_id: ProductId, review_id: ReviewId) -> StoreResult<Review> {
        let tables = self.read("get_review")?;
        tables
            .review_under(product_id, review_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_review(
        &self,
        review: &Review,
        expected: ExpectedVersion,
    ) -> StoreResult<Review> {
        let mut tables = self.write("update_review")?;
        let stored = tables
            .reviews
            .get_mut(&review.id)
            .filter(|r| r.product_id == review.product_id)
            .ok_or(StoreError::NotFound)?;

        if !expected.matches(stored.version) {
            return Err(StoreError::Conflict(format!(
                "expected version {}, found {}",
                expected.get(),
                stored.version
            )));
        }

        stored.rating = review.rating;
        stored.content = review.content.clone();
        stored.version += 1;
        let updated = stored.clone();

        tables.recompute_average(review.product_id);
        Ok(updated)
    }

    async fn delete_review(&self, product_id: ProductId, review_id: ReviewId) -> StoreResult<()> {
        let mut tables = self.write("delete_review")?;
        if tables.review_under(product_id, review_id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.reviews.remove(&review_id);
        tables.recompute_average(product_id);
        Ok(())
    }

    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Review>> {
        let tables = self.read("list_reviews")?;
        let matched: Vec<&Review> = tables
            .reviews
            .values()
            .filter(|r| filter.matches(r))
            .collect();

        let by_column = |a: &Review, b: &Review| match query.sort_column() {
            "rating" => a.rating.cmp(&b.rating),
            "helpful_count" => a.helpful_count.cmp(&b.helpful_count),
            "created_at" => a.created_at.cmp(&b.created_at),
            _ => a.id.cmp(&b.id),
        };
        Ok(paginate(matched, query, by_column, |r| r.id.get()))
    }
}

#[async_trait]
impl RatingStore for InMemoryCatalogStore {
    async fn recompute_average(&self, product_id: ProductId) -> StoreResult<()> {
        let mut tables = self.write("recompute_average")?;
        if tables.recompute_average(product_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn increment_helpful(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
    ) -> StoreResult<()> {
        let mut tables = self.write("increment_helpful")?;
        let review = tables
            .reviews
            .get_mut(&review_id)
            .filter(|r| r.product_id == product_id)
            .ok_or(StoreError::NotFound)?;
        review.helpful_count += 1;
        Ok(())
    }

    async fn recompute_all_averages(&self) -> StoreResult<u64> {
        let mut tables = self.write("recompute_all_averages")?;
        let ids: Vec<(ProductId, f64)> = tables
            .products
            .values()
            .map(|p| (p.id, p.average_rating))
            .collect();

        let mut changed = 0;
        for (id, before) in ids {
            tables.recompute_average(id);
            let after = tables.products.get(&id).map(|p| p.average_rating);
            if after.is_some_and(|after| after.to_bits() != before.to_bits()) {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Sort by the resolved column (ties broken by ascending id), then cut the window.
fn paginate<T: Clone>(
    mut matched: Vec<&T>,
    query: &ListQuery,
    by_column: impl Fn(&T, &T) -> Ordering,
    id_of: impl Fn(&T) -> i64,
) -> Page<T> {
    matched.sort_by(|a, b| {
        let ordering = by_column(*a, *b);
        let ordering = match query.direction() {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        ordering.then_with(|| id_of(*a).cmp(&id_of(*b)))
    });

    let total = matched.len() as i64;
    let window = query.window();
    let items = matched
        .into_iter()
        .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
        .take(usize::try_from(window.limit).unwrap_or(0))
        .cloned()
        .collect();

    Page {
        items,
        metadata: query.metadata(total),
    }
}
