//! Postgres-backed catalog store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (foreign key violation) | `23503` | `NotFound` | Review insert for a missing product |
//! | Database (other) | Any other | `Database` | Check constraint, connectivity, etc. |
//! | RowNotFound | N/A | `NotFound` | Unexpected `fetch_one` miss |
//! | PoolClosed | N/A | `PoolClosed` | Pool shut down |
//! | PoolTimedOut | N/A | `Timeout` | No connection available in time |
//!
//! Every operation is additionally bounded by the store's operation timeout.
//!
//! ## Rating consistency
//!
//! Review insert/update/delete run in one transaction that first locks the parent
//! product row, then writes the review, then recomputes the average with a single
//! `UPDATE ... SET average_rating = (SELECT AVG(...))`. The lock serialises review
//! mutations per product, so each recompute reads a review set that includes every
//! previously committed mutation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool, Row};
use tracing::{debug, instrument, warn};

use catalog_core::{ExpectedVersion, ListQuery, ProductId, ReviewId};
use catalog_products::{NewProduct, Product, ProductFilter};
use catalog_reviews::{NewReview, Review, ReviewFilter};

use super::r#trait::{
    Page, ProductStore, RatingStore, ReviewStore, StoreError, StoreResult,
};

/// Upper bound for a single store operation (a few seconds, then fail).
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Postgres-backed catalog store.
///
/// Uses an SQLx connection pool, which is `Send + Sync`; the store can be shared
/// across request tasks behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
    operation_timeout: Duration,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
        T: Send,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?self.operation_timeout, "store operation timed out");
                Err(StoreError::Timeout { operation })
            }
        }
    }
}

#[async_trait]
impl ProductStore for PostgresCatalogStore {
    #[instrument(skip(self, input), err)]
    async fn insert_product(&self, input: &NewProduct) -> StoreResult<Product> {
        self.bounded("insert_product", async {
            let row = sqlx::query(
                r#"
                INSERT INTO products (name, category, image_url)
                VALUES ($1, $2, $3)
                RETURNING id, name, category, image_url, average_rating, version
                "#,
            )
            .bind(&input.name)
            .bind(&input.category)
            .bind(&input.image_url)
            .fetch_one(&*self.pool)
            .await
            .map_err(db_error("insert_product"))?;

            let product: Product = ProductRow::from_row(&row)
                .map_err(db_error("insert_product"))?
                .into();
            debug!(product_id = %product.id, "product inserted");
            Ok(product)
        })
        .await
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        if !id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("get_product", async {
            let row = sqlx::query(
                r#"
                SELECT id, name, category, image_url, average_rating, version
                FROM products
                WHERE id = $1
                "#,
            )
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("get_product"))?
            .ok_or(StoreError::NotFound)?;

            Ok(ProductRow::from_row(&row)
                .map_err(db_error("get_product"))?
                .into())
        })
        .await
    }

    #[instrument(
        skip(self, product),
        fields(product_id = %product.id, expected_version = expected.get()),
        err
    )]
    async fn update_product(
        &self,
        product: &Product,
        expected: ExpectedVersion,
    ) -> StoreResult<Product> {
        if !product.id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("update_product", async {
            let row = sqlx::query(
                r#"
                UPDATE products
                SET name = $1, category = $2, image_url = $3, version = version + 1
                WHERE id = $4 AND version = $5
                RETURNING id, name, category, image_url, average_rating, version
                "#,
            )
            .bind(&product.name)
            .bind(&product.category)
            .bind(&product.image_url)
            .bind(product.id.get())
            .bind(expected.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("update_product"))?;

            match row {
                Some(row) => Ok(ProductRow::from_row(&row)
                    .map_err(db_error("update_product"))?
                    .into()),
                None => {
                    let current: Option<i32> =
                        sqlx::query_scalar("SELECT version FROM products WHERE id = $1")
                            .bind(product.id.get())
                            .fetch_optional(&*self.pool)
                            .await
                            .map_err(db_error("update_product"))?;
                    Err(stale_or_missing(current, expected))
                }
            }
        })
        .await
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        if !id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("delete_product", async {
            let result = sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(id.get())
                .execute(&*self.pool)
                .await
                .map_err(db_error("delete_product"))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, filter, query), err)]
    async fn list_products(
        &self,
        filter: &ProductFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Product>> {
        // Sort column and direction come from the listing's allow-list, never from input.
        let sql = format!(
            r#"
            WITH matched AS (
                SELECT id, name, category, image_url, average_rating, version
                FROM products
                WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
                  AND ($2::text IS NULL OR category ILIKE '%' || $2 || '%')
            ),
            total AS (
                SELECT COUNT(*) AS total_records FROM matched
            ),
            paged AS (
                SELECT * FROM matched
                ORDER BY {column} {direction}, id ASC
                LIMIT $3 OFFSET $4
            )
            SELECT total.total_records, paged.*
            FROM total
            LEFT JOIN paged ON TRUE
            ORDER BY paged.{column} {direction}, paged.id ASC
            "#,
            column = query.sort_column(),
            direction = query.direction().as_sql(),
        );
        let window = query.window();

        self.bounded("list_products", async {
            let rows = sqlx::query(&sql)
                .bind(filter.name().map(escape_like))
                .bind(filter.category().map(escape_like))
                .bind(window.limit)
                .bind(window.offset)
                .fetch_all(&*self.pool)
                .await
                .map_err(db_error("list_products"))?;

            let (total, rows) = split_total(rows).map_err(db_error("list_products"))?;
            let items = rows
                .iter()
                .map(|row| ProductRow::from_row(row).map(Product::from))
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error("list_products"))?;

            Ok(Page {
                items,
                metadata: query.metadata(total),
            })
        })
        .await
    }
}

#[async_trait]
impl ReviewStore for PostgresCatalogStore {
    #[instrument(skip(self, input), fields(product_id = %input.product_id), err)]
    async fn insert_review(&self, input: &NewReview) -> StoreResult<Review> {
        if !input.product_id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("insert_review", async {
            let mut tx = self.pool.begin().await.map_err(db_error("begin_transaction"))?;
            lock_product(&mut tx, input.product_id).await?;

            let row = sqlx::query(
                r#"
                INSERT INTO reviews (product_id, rating, content)
                VALUES ($1, $2, $3)
                RETURNING id, product_id, rating, content, helpful_count, created_at, version
                "#,
            )
            .bind(input.product_id.get())
            .bind(input.rating)
            .bind(&input.content)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("insert_review"))?;
            let review: Review = ReviewRow::from_row(&row)
                .map_err(db_error("insert_review"))?
                .into();

            recompute_average_with(&mut *tx, input.product_id)
                .await
                .map_err(db_error("recompute_average"))?;

            tx.commit().await.map_err(db_error("commit_transaction"))?;
            debug!(review_id = %review.id, "review inserted and average recomputed");
            Ok(review)
        })
        .await
    }

    #[instrument(skip(self), fields(product_id = %product_id, review_id = %review_id), err)]
    async fn get_review(&self, product_id: ProductId, review_id: ReviewId) -> StoreResult<Review> {
        if !product_id.is_valid() || !review_id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("get_review", async {
            let row = sqlx::query(
                r#"
                SELECT id, product_id, rating, content, helpful_count, created_at, version
                FROM reviews
                WHERE product_id = $1 AND id = $2
                "#,
            )
            .bind(product_id.get())
            .bind(review_id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("get_review"))?
            .ok_or(StoreError::NotFound)?;

            Ok(ReviewRow::from_row(&row)
                .map_err(db_error("get_review"))?
                .into())
        })
        .await
    }

    #[instrument(
        skip(self, review),
        fields(product_id = %review.product_id, review_id = %review.id, expected_version = expected.get()),
        err
    )]
    async fn update_review(
        &self,
        review: &Review,
        expected: ExpectedVersion,
    ) -> StoreResult<Review> {
        if !review.product_id.is_valid() || !review.id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("update_review", async {
            let mut tx = self.pool.begin().await.map_err(db_error("begin_transaction"))?;
            lock_product(&mut tx, review.product_id).await?;

            let row = sqlx::query(
                r#"
                UPDATE reviews
                SET rating = $1, content = $2, version = version + 1
                WHERE id = $3 AND product_id = $4 AND version = $5
                RETURNING id, product_id, rating, content, helpful_count, created_at, version
                "#,
            )
            .bind(review.rating)
            .bind(&review.content)
            .bind(review.id.get())
            .bind(review.product_id.get())
            .bind(expected.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("update_review"))?;

            let Some(row) = row else {
                let current: Option<i32> = sqlx::query_scalar(
                    "SELECT version FROM reviews WHERE id = $1 AND product_id = $2",
                )
                .bind(review.id.get())
                .bind(review.product_id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("update_review"))?;
                return Err(stale_or_missing(current, expected));
            };
            let updated: Review = ReviewRow::from_row(&row)
                .map_err(db_error("update_review"))?
                .into();

            recompute_average_with(&mut *tx, review.product_id)
                .await
                .map_err(db_error("recompute_average"))?;

            tx.commit().await.map_err(db_error("commit_transaction"))?;
            Ok(updated)
        })
        .await
    }

    #[instrument(skip(self), fields(product_id = %product_id, review_id = %review_id), err)]
    async fn delete_review(&self, product_id: ProductId, review_id: ReviewId) -> StoreResult<()> {
        if !product_id.is_valid() || !review_id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("delete_review", async {
            let mut tx = self.pool.begin().await.map_err(db_error("begin_transaction"))?;
            lock_product(&mut tx, product_id).await?;

            let result = sqlx::query("DELETE FROM reviews WHERE product_id = $1 AND id = $2")
                .bind(product_id.get())
                .bind(review_id.get())
                .execute(&mut *tx)
                .await
                .map_err(db_error("delete_review"))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }

            recompute_average_with(&mut *tx, product_id)
                .await
                .map_err(db_error("recompute_average"))?;

            tx.commit().await.map_err(db_error("commit_transaction"))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, filter, query), err)]
    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Review>> {
        let sql = format!(
            r#"
            WITH matched AS (
                SELECT id, product_id, rating, content, helpful_count, created_at, version
                FROM reviews
                WHERE ($1::bigint IS NULL OR product_id = $1)
                  AND ($2::integer IS NULL OR rating = $2)
                  AND ($3::text IS NULL OR content ILIKE '%' || $3 || '%')
            ),
            total AS (
                SELECT COUNT(*) AS total_records FROM matched
            ),
            paged AS (
                SELECT * FROM matched
                ORDER BY {column} {direction}, id ASC
                LIMIT $4 OFFSET $5
            )
            SELECT total.total_records, paged.*
            FROM total
            LEFT JOIN paged ON TRUE
            ORDER BY paged.{column} {direction}, paged.id ASC
            "#,
            column = query.sort_column(),
            direction = query.direction().as_sql(),
        );
        let window = query.window();

        self.bounded("list_reviews", async {
            let rows = sqlx::query(&sql)
                .bind(filter.product_id().map(ProductId::get))
                .bind(filter.rating())
                .bind(filter.content().map(escape_like))
                .bind(window.limit)
                .bind(window.offset)
                .fetch_all(&*self.pool)
                .await
                .map_err(db_error("list_reviews"))?;

            let (total, rows) = split_total(rows).map_err(db_error("list_reviews"))?;
            let items = rows
                .iter()
                .map(|row| ReviewRow::from_row(row).map(Review::from))
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error("list_reviews"))?;

            Ok(Page {
                items,
                metadata: query.metadata(total),
            })
        })
        .await
    }
}

#[async_trait]
impl RatingStore for PostgresCatalogStore {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn recompute_average(&self, product_id: ProductId) -> StoreResult<()> {
        if !product_id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("recompute_average", async {
            let affected = recompute_average_with(&*self.pool, product_id)
                .await
                .map_err(db_error("recompute_average"))?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(product_id = %product_id, review_id = %review_id), err)]
    async fn increment_helpful(
        &self,
        product_id: ProductId,
        review_id: ReviewId,
    ) -> StoreResult<()> {
        if !product_id.is_valid() || !review_id.is_valid() {
            return Err(StoreError::NotFound);
        }

        self.bounded("increment_helpful", async {
            let result = sqlx::query(
                r#"
                UPDATE reviews
                SET helpful_count = helpful_count + 1
                WHERE product_id = $1 AND id = $2
                "#,
            )
            .bind(product_id.get())
            .bind(review_id.get())
            .execute(&*self.pool)
            .await
            .map_err(db_error("increment_helpful"))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), err)]
    async fn recompute_all_averages(&self) -> StoreResult<u64> {
        self.bounded("recompute_all_averages", async {
            let result = sqlx::query(
                r#"
                UPDATE products p
                SET average_rating = fresh.average_rating
                FROM (
                    SELECT p2.id, COALESCE(AVG(r.rating)::float8, 0) AS average_rating
                    FROM products p2
                    LEFT JOIN reviews r ON r.product_id = p2.id
                    GROUP BY p2.id
                ) fresh
                WHERE p.id = fresh.id
                  AND p.average_rating IS DISTINCT FROM fresh.average_rating
                "#,
            )
            .execute(&*self.pool)
            .await
            .map_err(db_error("recompute_all_averages"))?;

            Ok(result.rows_affected())
        })
        .await
    }
}

/// Single statement: read the current mean and write it in the same UPDATE.
async fn recompute_average_with<'e, E>(executor: E, product_id: ProductId) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE products
        SET average_rating = COALESCE(
            (SELECT AVG(rating)::float8 FROM reviews WHERE product_id = $1),
            0
        )
        WHERE id = $1
        "#,
    )
    .bind(product_id.get())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Take the product's row lock for the rest of the transaction.
async fn lock_product(conn: &mut PgConnection, product_id: ProductId) -> StoreResult<()> {
    sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("lock_product"))?
        .map(|_| ())
        .ok_or(StoreError::NotFound)
}

/// Classify a conditional update that matched no row.
fn stale_or_missing(current: Option<i32>, expected: ExpectedVersion) -> StoreError {
    match current {
        None => StoreError::NotFound,
        Some(actual) => StoreError::Conflict(format!(
            "expected version {}, found {actual}",
            expected.get()
        )),
    }
}

/// Split the `total LEFT JOIN paged` result into the match count and the page rows.
///
/// An empty page still yields exactly one row carrying the count and NULL columns.
fn split_total(rows: Vec<PgRow>) -> Result<(i64, Vec<PgRow>), sqlx::Error> {
    let total = match rows.first() {
        Some(row) => row.try_get::<i64, _>("total_records")?,
        None => 0,
    };

    let mut page = Vec::with_capacity(rows.len());
    for row in rows {
        if row.try_get::<Option<i64>, _>("id")?.is_some() {
            page.push(row);
        }
    }
    Ok((total, page))
}

/// Match user text literally inside `ILIKE '%' || $n || '%'`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |err| map_sqlx_error(operation, err)
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // Foreign key violation: the referenced product does not exist.
            Some("23503") => StoreError::NotFound,
            _ => StoreError::Database {
                operation,
                message: db_err.message().to_string(),
            },
        },
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => StoreError::PoolClosed,
        sqlx::Error::PoolTimedOut => StoreError::Timeout { operation },
        other => StoreError::Database {
            operation,
            message: other.to_string(),
        },
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: i64,
    name: String,
    category: String,
    image_url: String,
    average_rating: f64,
    version: i32,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            image_url: row.try_get("image_url")?,
            average_rating: row.try_get("average_rating")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            name: row.name,
            category: row.category,
            image_url: row.image_url,
            average_rating: row.average_rating,
            version: row.version,
        }
    }
}

#[derive(Debug)]
struct ReviewRow {
    id: i64,
    product_id: i64,
    rating: i32,
    content: String,
    helpful_count: i32,
    created_at: DateTime<Utc>,
    version: i32,
}

impl<'r> FromRow<'r, PgRow> for ReviewRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReviewRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            rating: row.try_get("rating")?,
            content: row.try_get("content")?,
            helpful_count: row.try_get("helpful_count")?,
            created_at: row.try_get("created_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            rating: row.rating,
            content: row.content,
            helpful_count: row.helpful_count,
            created_at: row.created_at,
            version: row.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralises_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn unmatched_conditional_update_is_classified() {
        let expected = ExpectedVersion::exact(2);
        assert!(matches!(stale_or_missing(None, expected), StoreError::NotFound));
        match stale_or_missing(Some(3), expected) {
            StoreError::Conflict(msg) => assert_eq!(msg, "expected version 2, found 3"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
