use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::validator::char_len;
use catalog_core::{DomainResult, Entity, ProductId, ReviewId, Validator};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;
pub const CONTENT_MAX_CHARS: usize = 500;

/// Columns a review listing may be sorted by (optionally `-`-prefixed).
pub const SORT_SAFELIST: &[&str] = &["id", "rating", "helpful_count", "created_at"];

/// A review as stored. Always belongs to an existing product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub rating: i32,
    pub content: String,
    /// Only ever incremented, one vote at a time.
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub version: i32,
}

impl Entity for Review {
    type Id = ReviewId;

    fn id(&self) -> ReviewId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }
}

/// Input for creating a review under `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub product_id: ProductId,
    pub rating: i32,
    pub content: String,
}

impl NewReview {
    pub fn validate(&self) -> DomainResult<()> {
        let mut v = Validator::new();
        validate_fields(&mut v, self.rating, &self.content);
        v.finish()
    }
}

/// Partial update of a review. Neither the product nor the helpful count can be
/// changed this way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPatch {
    pub rating: Option<i32>,
    pub content: Option<String>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.content.is_none()
    }

    pub fn apply(self, review: &mut Review) {
        if let Some(rating) = self.rating {
            review.rating = rating;
        }
        if let Some(content) = self.content {
            review.content = content;
        }
    }
}

pub fn validate_review(review: &Review) -> DomainResult<()> {
    let mut v = Validator::new();
    validate_fields(&mut v, review.rating, &review.content);
    v.finish()
}

fn validate_fields(v: &mut Validator, rating: i32, content: &str) {
    v.check(
        (MIN_RATING..=MAX_RATING).contains(&rating),
        "rating",
        "must be between 1 and 5",
    );
    v.check(!content.is_empty(), "content", "must be provided");
    v.check(
        char_len(content) <= CONTENT_MAX_CHARS,
        "content",
        "must not be more than 500 characters long",
    );
}

/// Listing predicates. `rating == Some(0)` and empty `content` are inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    product_id: Option<ProductId>,
    rating: Option<i32>,
    content: Option<String>,
}

impl ReviewFilter {
    pub fn new(rating: Option<i32>, content: Option<String>) -> Self {
        Self {
            product_id: None,
            rating: rating.filter(|r| *r != 0),
            content: content.filter(|s| !s.is_empty()),
        }
    }

    /// Restrict the listing to one product's reviews.
    pub fn for_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn rating(&self) -> Option<i32> {
        self.rating
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn matches(&self, review: &Review) -> bool {
        self.product_id.is_none_or(|id| review.product_id == id)
            && self.rating.is_none_or(|r| review.rating == r)
            && self
                .content
                .as_deref()
                .is_none_or(|c| review.content.to_lowercase().contains(&c.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::DomainError;

    fn review(product_id: i64, rating: i32, content: &str) -> Review {
        Review {
            id: ReviewId::new(1),
            product_id: ProductId::new(product_id),
            rating,
            content: content.to_string(),
            helpful_count: 0,
            created_at: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn rating_must_be_between_one_and_five() {
        for rating in [0, 6, -1] {
            let input = NewReview {
                product_id: ProductId::new(1),
                rating,
                content: "ok".to_string(),
            };
            let DomainError::Validation(errors) = input.validate().unwrap_err() else {
                panic!("expected validation error");
            };
            assert_eq!(errors.get("rating"), Some("must be between 1 and 5"));
        }
    }

    #[test]
    fn content_limits_are_enforced() {
        let mut r = review(1, 3, "");
        assert!(validate_review(&r).is_err());
        r.content = "x".repeat(501);
        let DomainError::Validation(errors) = validate_review(&r).unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("content"),
            Some("must not be more than 500 characters long")
        );
        r.content = "x".repeat(500);
        assert!(validate_review(&r).is_ok());
    }

    #[test]
    fn patch_keeps_helpful_count_and_product() {
        let mut r = review(7, 2, "meh");
        r.helpful_count = 4;
        ReviewPatch {
            rating: Some(5),
            content: None,
        }
        .apply(&mut r);

        assert_eq!(r.rating, 5);
        assert_eq!(r.content, "meh");
        assert_eq!(r.helpful_count, 4);
        assert_eq!(r.product_id, ProductId::new(7));
    }

    #[test]
    fn zero_rating_and_empty_content_are_inactive() {
        let filter = ReviewFilter::new(Some(0), Some(String::new()));
        assert_eq!(filter, ReviewFilter::default());
        assert!(filter.matches(&review(1, 4, "anything")));
    }

    #[test]
    fn active_predicates_narrow_matches() {
        let r = review(3, 4, "Works Great");
        assert!(ReviewFilter::new(Some(4), Some("great".into())).matches(&r));
        assert!(!ReviewFilter::new(Some(5), None).matches(&r));
        assert!(ReviewFilter::default().for_product(ProductId::new(3)).matches(&r));
        assert!(!ReviewFilter::default().for_product(ProductId::new(4)).matches(&r));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn valid_ratings_validate(rating in MIN_RATING..=MAX_RATING, content in "[a-z ]{1,500}") {
                let input = NewReview { product_id: ProductId::new(1), rating, content };
                prop_assert!(input.validate().is_ok());
            }

            #[test]
            fn out_of_range_ratings_fail(rating in prop_oneof![i32::MIN..MIN_RATING, (MAX_RATING + 1)..i32::MAX]) {
                let input = NewReview { product_id: ProductId::new(1), rating, content: "x".into() };
                prop_assert!(input.validate().is_err());
            }
        }
    }
}
