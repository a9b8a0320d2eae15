//! Integration tests for the catalog service over the in-memory store.
//!
//! Tests: CatalogService → guard / rating maintainer → CatalogStore
//!
//! Verifies:
//! - Average ratings follow every review mutation
//! - Concurrent helpful votes are never lost
//! - Stale updates are rejected and leave the winner's write in place
//! - Deletes report NotFound once the row is gone
//! - Listing predicates and total counts

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use catalog_core::{Filters, ProductId, ReviewId};
    use catalog_products::{NewProduct, Product, ProductFilter, ProductPatch};
    use catalog_reviews::{NewReview, Review, ReviewFilter, ReviewPatch};

    use crate::error::CatalogError;
    use crate::service::CatalogService;
    use crate::store::{CatalogStore, InMemoryCatalogStore};

    fn setup() -> CatalogService<InMemoryCatalogStore> {
        CatalogService::new(Arc::new(InMemoryCatalogStore::new()))
    }

    fn new_product(name: &str, category: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: category.to_string(),
            image_url: format!("https://img.example/{}.png", name.to_lowercase()),
        }
    }

    async fn seed_product(svc: &CatalogService<InMemoryCatalogStore>, name: &str) -> Product {
        svc.create_product(new_product(name, "Kitchen")).await.unwrap()
    }

    async fn seed_review(
        svc: &CatalogService<InMemoryCatalogStore>,
        product_id: ProductId,
        rating: i32,
    ) -> Review {
        svc.create_review(NewReview {
            product_id,
            rating,
            content: format!("rated {rating}"),
        })
        .await
        .unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test]
    async fn average_rating_tracks_review_inserts_and_deletes() {
        let svc = setup();
        let product = seed_product(&svc, "Kettle").await;

        let mut reviews = Vec::new();
        for rating in [5, 3, 4] {
            reviews.push(seed_review(&svc, product.id, rating).await);
        }
        svc.ratings().recompute(product.id).await.unwrap();
        assert_close(svc.get_product(product.id).await.unwrap().average_rating, 4.0);

        for review in &reviews {
            svc.delete_review(product.id, review.id).await.unwrap();
        }
        svc.ratings().recompute(product.id).await.unwrap();
        assert_close(svc.get_product(product.id).await.unwrap().average_rating, 0.0);
    }

    #[tokio::test]
    async fn average_rating_is_current_without_an_explicit_recompute() {
        let svc = setup();
        let product = seed_product(&svc, "Kettle").await;

        let first = seed_review(&svc, product.id, 5).await;
        seed_review(&svc, product.id, 2).await;
        assert_close(svc.get_product(product.id).await.unwrap().average_rating, 3.5);

        svc.update_review(
            product.id,
            first.id,
            ReviewPatch {
                rating: Some(1),
                content: None,
            },
            None,
        )
        .await
        .unwrap();
        assert_close(svc.get_product(product.id).await.unwrap().average_rating, 1.5);
    }

    #[tokio::test]
    async fn recompute_of_missing_product_is_not_found() {
        let svc = setup();
        let err = svc.ratings().recompute(ProductId::new(99)).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_helpful_votes_are_all_counted() {
        const VOTES: i32 = 100;

        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalogStore::new());
        let svc = CatalogService::new(store);
        let product = svc.create_product(new_product("Kettle", "Kitchen")).await.unwrap();
        let review = svc
            .create_review(NewReview {
                product_id: product.id,
                rating: 4,
                content: "solid".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(review.helpful_count, 0);

        let (product_id, review_id) = (product.id, review.id);
        let mut tasks = Vec::with_capacity(VOTES as usize);
        for _ in 0..VOTES {
            let svc = svc.clone();
            tasks.push(tokio::spawn(async move {
                svc.mark_helpful(product_id, review_id).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let after = svc.get_review(product.id, review.id).await.unwrap();
        assert_eq!(after.helpful_count, VOTES);
    }

    #[tokio::test]
    async fn helpful_vote_on_review_of_another_product_is_not_found() {
        let svc = setup();
        let a = seed_product(&svc, "Kettle").await;
        let b = seed_product(&svc, "Toaster").await;
        let review = seed_review(&svc, a.id, 4).await;

        let err = svc.mark_helpful(b.id, review.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
        assert_eq!(
            svc.get_review(a.id, review.id).await.unwrap().helpful_count,
            0
        );
    }

    #[tokio::test]
    async fn second_update_with_stale_version_conflicts() {
        let svc = setup();
        let product = seed_product(&svc, "Kettle").await;
        let observed = svc.get_product(product.id).await.unwrap().version;

        let rename = |name: &str| ProductPatch {
            name: Some(name.to_string()),
            ..ProductPatch::default()
        };
        let (first, second) = tokio::join!(
            svc.update_product(product.id, rename("Kettle Pro"), Some(observed)),
            svc.update_product(product.id, rename("Kettle Max"), Some(observed)),
        );

        let (winner, loser) = match (first, second) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert!(matches!(loser, CatalogError::Conflict(_)));
        assert_eq!(winner.version, observed + 1);

        let stored = svc.get_product(product.id).await.unwrap();
        assert_eq!(stored, winner);
    }

    #[tokio::test]
    async fn stale_review_update_leaves_review_unmodified() {
        let svc = setup();
        let product = seed_product(&svc, "Kettle").await;
        let review = seed_review(&svc, product.id, 3).await;

        svc.update_review(
            product.id,
            review.id,
            ReviewPatch {
                content: Some("changed my mind".to_string()),
                rating: None,
            },
            Some(review.version),
        )
        .await
        .unwrap();

        let err = svc
            .update_review(
                product.id,
                review.id,
                ReviewPatch {
                    rating: Some(5),
                    content: None,
                },
                Some(review.version),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        let stored = svc.get_review(product.id, review.id).await.unwrap();
        assert_eq!(stored.rating, 3);
        assert_eq!(stored.content, "changed my mind");
        assert_eq!(stored.version, review.version + 1);
    }

    #[tokio::test]
    async fn update_after_delete_is_not_found_not_conflict() {
        let svc = setup();
        let product = seed_product(&svc, "Kettle").await;
        svc.delete_product(product.id).await.unwrap();

        let err = svc
            .update_product(product.id, ProductPatch::default(), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }

    #[tokio::test]
    async fn second_delete_is_not_found() {
        let svc = setup();
        let product = seed_product(&svc, "Kettle").await;
        let review = seed_review(&svc, product.id, 4).await;

        svc.delete_review(product.id, review.id).await.unwrap();
        assert!(matches!(
            svc.delete_review(product.id, review.id).await,
            Err(CatalogError::NotFound)
        ));

        svc.delete_product(product.id).await.unwrap();
        assert!(matches!(
            svc.delete_product(product.id).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn ids_below_one_are_not_found() {
        let svc = setup();
        seed_product(&svc, "Kettle").await;

        assert!(matches!(
            svc.get_product(ProductId::new(0)).await,
            Err(CatalogError::NotFound)
        ));
        assert!(matches!(
            svc.get_review(ProductId::new(1), ReviewId::new(-3)).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn inactive_predicates_match_everything() {
        let svc = setup();
        for name in ["Kettle", "Toaster", "Kettle Pro"] {
            seed_product(&svc, name).await;
        }

        let page = svc
            .list_products(
                ProductFilter::new(Some(String::new()), None),
                Filters::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.metadata.total_records, 3);
    }

    #[tokio::test]
    async fn total_records_ignores_the_page_window() {
        let svc = setup();
        for i in 0..7 {
            seed_product(&svc, &format!("Kettle {i}")).await;
        }
        seed_product(&svc, "Toaster").await;

        let page = svc
            .list_products(
                ProductFilter::new(Some("kettle".to_string()), None),
                Filters::new(2, 3, "-id"),
            )
            .await
            .unwrap();

        assert_eq!(page.metadata.total_records, 7);
        assert_eq!(page.metadata.last_page, 3);
        assert_eq!(page.items.len(), 3);
        assert!(page.items.iter().all(|p| p.name.starts_with("Kettle")));
        let ids: Vec<i64> = page.items.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn review_listing_filters_by_rating_and_product() {
        let svc = setup();
        let a = seed_product(&svc, "Kettle").await;
        let b = seed_product(&svc, "Toaster").await;
        for rating in [5, 5, 3] {
            seed_review(&svc, a.id, rating).await;
        }
        seed_review(&svc, b.id, 5).await;

        let all_fives = svc
            .list_reviews(ReviewFilter::new(Some(5), None), Filters::default())
            .await
            .unwrap();
        assert_eq!(all_fives.metadata.total_records, 3);

        let a_fives = svc
            .list_product_reviews(a.id, ReviewFilter::new(Some(5), None), Filters::default())
            .await
            .unwrap();
        assert_eq!(a_fives.metadata.total_records, 2);
        assert!(a_fives.items.iter().all(|r| r.product_id == a.id));

        let any_rating = svc
            .list_product_reviews(a.id, ReviewFilter::new(Some(0), None), Filters::default())
            .await
            .unwrap();
        assert_eq!(any_rating.metadata.total_records, 3);
    }

    #[tokio::test]
    async fn reviews_of_unknown_product_are_an_empty_page() {
        let svc = setup();
        let page = svc
            .list_product_reviews(ProductId::new(42), ReviewFilter::default(), Filters::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.metadata.total_records, 0);
        assert_eq!(page.metadata.last_page, 0);
    }

    #[tokio::test]
    async fn invalid_listing_parameters_report_every_field() {
        let svc = setup();
        let err = svc
            .list_products(ProductFilter::default(), Filters::new(0, 500, "price"))
            .await
            .unwrap_err();

        match err {
            CatalogError::Validation(errors) => {
                assert!(errors.contains("page"));
                assert!(errors.contains("page_size"));
                assert!(errors.contains("sort"));
            }
            other => panic!("expected validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_store() {
        let svc = setup();
        let err = svc
            .create_product(NewProduct {
                name: String::new(),
                category: "x".repeat(51),
                image_url: String::new(),
            })
            .await
            .unwrap_err();

        match err {
            CatalogError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation, got {other:?}"),
        }
        let page = svc
            .list_products(ProductFilter::default(), Filters::default())
            .await
            .unwrap();
        assert_eq!(page.metadata.total_records, 0);
    }
}
