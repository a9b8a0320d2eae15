use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use catalog_core::{ProductId, ReviewId, Validator};
use catalog_infra::{CatalogResult, Page};
use catalog_reviews::Review;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/reviews", get(list_reviews))
        .route(
            "/products/:id/reviews",
            get(list_product_reviews).post(create_review),
        )
        .route(
            "/products/:id/reviews/:review_id",
            get(get_review).patch(update_review).delete(delete_review),
        )
        .route(
            "/products/:id/reviews/:review_id/helpful",
            post(mark_helpful),
        )
}

/// Both path ids, or `None` when either cannot name a row.
fn parse_ids(product_id: &str, review_id: &str) -> Option<(ProductId, ReviewId)> {
    Some((product_id.parse().ok()?, review_id.parse().ok()?))
}

pub async fn create_review(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
    body: Result<Json<dto::CreateReviewRequest>, JsonRejection>,
) -> Response {
    let Ok(product_id) = product_id.parse::<ProductId>() else {
        return errors::not_found();
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::bad_json(rejection),
    };

    let review = match services
        .catalog
        .create_review(body.for_product(product_id))
        .await
    {
        Ok(r) => r,
        Err(e) => return errors::catalog_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        [(
            LOCATION,
            format!("/v1/products/{}/reviews/{}", review.product_id, review.id),
        )],
        Json(json!({ "review": review })),
    )
        .into_response()
}

pub async fn get_review(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, review_id)): Path<(String, String)>,
) -> Response {
    let Some((product_id, review_id)) = parse_ids(&product_id, &review_id) else {
        return errors::not_found();
    };

    review_response(services.catalog.get_review(product_id, review_id).await)
}

pub async fn update_review(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, review_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<dto::UpdateReviewRequest>, JsonRejection>,
) -> Response {
    let Some((product_id, review_id)) = parse_ids(&product_id, &review_id) else {
        return errors::not_found();
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::bad_json(rejection),
    };

    let (patch, from_body) = body.into_parts();
    let mut v = Validator::new();
    let expected = dto::expected_version(&headers, from_body, &mut v);
    if !v.is_empty() {
        return errors::failed_validation(v.errors().clone());
    }

    review_response(
        services
            .catalog
            .update_review(product_id, review_id, patch, expected)
            .await,
    )
}

pub async fn delete_review(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, review_id)): Path<(String, String)>,
) -> Response {
    let Some((product_id, review_id)) = parse_ids(&product_id, &review_id) else {
        return errors::not_found();
    };

    match services.catalog.delete_review(product_id, review_id).await {
        Ok(()) => Json(json!({ "message": "review successfully deleted" })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn mark_helpful(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, review_id)): Path<(String, String)>,
) -> Response {
    let Some((product_id, review_id)) = parse_ids(&product_id, &review_id) else {
        return errors::not_found();
    };

    review_response(services.catalog.mark_helpful(product_id, review_id).await)
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut v = Validator::new();
    let filter = dto::review_filter(&query, &mut v);
    let filters = dto::list_filters(&query, &mut v);
    filters.validate(&mut v, catalog_reviews::SORT_SAFELIST);
    if !v.is_empty() {
        return errors::failed_validation(v.errors().clone());
    }

    reviews_response(services.catalog.list_reviews(filter, filters).await)
}

pub async fn list_product_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Ok(product_id) = product_id.parse::<ProductId>() else {
        return errors::not_found();
    };

    let mut v = Validator::new();
    let filter = dto::review_filter(&query, &mut v);
    let filters = dto::list_filters(&query, &mut v);
    filters.validate(&mut v, catalog_reviews::SORT_SAFELIST);
    if !v.is_empty() {
        return errors::failed_validation(v.errors().clone());
    }

    reviews_response(
        services
            .catalog
            .list_product_reviews(product_id, filter, filters)
            .await,
    )
}

fn review_response(result: CatalogResult<Review>) -> Response {
    match result {
        Ok(review) => Json(json!({ "review": review })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

fn reviews_response(result: CatalogResult<Page<Review>>) -> Response {
    match result {
        Ok(page) => Json(json!({
            "reviews": page.items,
            "@metadata": page.metadata,
        }))
        .into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
