use axum::{Router, routing::get};

pub mod products;
pub mod reviews;
pub mod system;

/// Router for every `/v1` endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/healthcheck", get(system::healthcheck))
        .merge(products::router())
        .merge(reviews::router())
}
