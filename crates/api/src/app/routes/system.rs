use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::json;

use crate::app::services::AppServices;

pub async fn healthcheck(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": services.environment.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}
