use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use catalog_core::{ProductId, Validator};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::bad_json(rejection),
    };

    let product = match services.catalog.create_product(body.into()).await {
        Ok(p) => p,
        Err(e) => return errors::catalog_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        [(LOCATION, format!("/v1/products/{}", product.id))],
        Json(json!({ "product": product })),
    )
        .into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<ProductId>() else {
        return errors::not_found();
    };

    match services.catalog.get_product(id).await {
        Ok(product) => Json(json!({ "product": product })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<dto::UpdateProductRequest>, JsonRejection>,
) -> Response {
    let Ok(id) = id.parse::<ProductId>() else {
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

    match services.catalog.update_product(id, patch, expected).await {
        Ok(product) => Json(json!({ "product": product })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<ProductId>() else {
        return errors::not_found();
    };

    match services.catalog.delete_product(id).await {
        Ok(()) => Json(json!({ "message": "product successfully deleted" })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut v = Validator::new();
    let filters = dto::list_filters(&query, &mut v);
    filters.validate(&mut v, catalog_products::SORT_SAFELIST);
    if !v.is_empty() {
        return errors::failed_validation(v.errors().clone());
    }

    match services
        .catalog
        .list_products(dto::product_filter(&query), filters)
        .await
    {
        Ok(page) => Json(json!({
            "products": page.items,
            "@metadata": page.metadata,
        }))
        .into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
