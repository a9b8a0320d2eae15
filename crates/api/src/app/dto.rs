use std::collections::HashMap;
use std::str::FromStr;

use axum::http::{HeaderMap, header::IF_MATCH};
use serde::Deserialize;

use catalog_core::pagination::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, DEFAULT_SORT};
use catalog_core::{Filters, ProductId, Validator};
use catalog_products::{NewProduct, ProductFilter, ProductPatch};
use catalog_reviews::{NewReview, ReviewFilter, ReviewPatch};

// -------------------------
// Request DTOs
// -------------------------

/// Missing fields deserialize as empty so they surface as validation errors.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(body: CreateProductRequest) -> Self {
        NewProduct {
            name: body.name,
            category: body.category,
            image_url: body.image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub expected_version: Option<i32>,
}

impl UpdateProductRequest {
    pub fn into_parts(self) -> (ProductPatch, Option<i32>) {
        (
            ProductPatch {
                name: self.name,
                category: self.category,
                image_url: self.image_url,
            },
            self.expected_version,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(default)]
    pub rating: i32,
    #[serde(default)]
    pub content: String,
}

impl CreateReviewRequest {
    pub fn for_product(self, product_id: ProductId) -> NewReview {
        NewReview {
            product_id,
            rating: self.rating,
            content: self.content,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub content: Option<String>,
    pub expected_version: Option<i32>,
}

impl UpdateReviewRequest {
    pub fn into_parts(self) -> (ReviewPatch, Option<i32>) {
        (
            ReviewPatch {
                rating: self.rating,
                content: self.content,
            },
            self.expected_version,
        )
    }
}

// -------------------------
// Query string / header helpers
// -------------------------

/// A query-string value, with empty treated as absent.
pub fn query_string(query: &HashMap<String, String>, key: &str) -> Option<String> {
    query.get(key).filter(|v| !v.is_empty()).cloned()
}

/// An integer query-string value. Unparseable input is recorded against `key`
/// and the default is returned so the remaining parameters still get checked.
pub fn query_int<T: FromStr>(
    query: &HashMap<String, String>,
    key: &str,
    default: T,
    v: &mut Validator,
) -> T {
    match query.get(key).filter(|s| !s.is_empty()) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                v.add_error(key, "must be an integer value");
                default
            }
        },
    }
}

/// Paging and sorting parameters shared by every listing.
pub fn list_filters(query: &HashMap<String, String>, v: &mut Validator) -> Filters {
    Filters::new(
        query_int(query, "page", DEFAULT_PAGE, v),
        query_int(query, "page_size", DEFAULT_PAGE_SIZE, v),
        query_string(query, "sort").unwrap_or_else(|| DEFAULT_SORT.to_string()),
    )
}

pub fn product_filter(query: &HashMap<String, String>) -> ProductFilter {
    ProductFilter::new(query_string(query, "name"), query_string(query, "category"))
}

pub fn review_filter(query: &HashMap<String, String>, v: &mut Validator) -> ReviewFilter {
    ReviewFilter::new(
        Some(query_int(query, "rating", 0, v)),
        query_string(query, "content"),
    )
}

/// Version the caller expects, from the body field first and then `If-Match`.
///
/// `If-Match` accepts a bare or quoted integer (`3` or `"3"`).
pub fn expected_version(
    headers: &HeaderMap,
    from_body: Option<i32>,
    v: &mut Validator,
) -> Option<i32> {
    if from_body.is_some() {
        return from_body;
    }

    let raw = headers.get(IF_MATCH)?;
    let parsed = raw
        .to_str()
        .ok()
        .map(|s| s.trim().trim_start_matches("W/").trim_matches('"'))
        .and_then(|s| s.parse::<i32>().ok());
    if parsed.is_none() {
        v.add_error("if_match", "must be an integer version");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn list_filters_default_to_first_page_by_id() {
        let mut v = Validator::new();
        let filters = list_filters(&query(&[]), &mut v);
        assert!(v.is_empty());
        assert_eq!(filters, Filters::default());
    }

    #[test]
    fn non_integer_paging_is_a_field_error() {
        let mut v = Validator::new();
        let filters = list_filters(&query(&[("page", "two"), ("page_size", "5")]), &mut v);
        assert_eq!(v.errors().get("page"), Some("must be an integer value"));
        assert_eq!(filters.page, DEFAULT_PAGE);
        assert_eq!(filters.page_size, 5);
    }

    #[test]
    fn zero_rating_filter_is_inactive() {
        let mut v = Validator::new();
        let filter = review_filter(&query(&[("rating", "0"), ("content", "")]), &mut v);
        assert!(v.is_empty());
        assert_eq!(filter, ReviewFilter::default());
    }

    #[test]
    fn body_version_wins_over_if_match() {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_static("\"4\""));

        let mut v = Validator::new();
        assert_eq!(expected_version(&headers, Some(2), &mut v), Some(2));
        assert_eq!(expected_version(&headers, None, &mut v), Some(4));
        assert_eq!(expected_version(&HeaderMap::new(), None, &mut v), None);
        assert!(v.is_empty());
    }

    #[test]
    fn malformed_if_match_is_a_field_error() {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_static("*"));

        let mut v = Validator::new();
        assert_eq!(expected_version(&headers, None, &mut v), None);
        assert!(v.errors().contains("if_match"));
    }
}
