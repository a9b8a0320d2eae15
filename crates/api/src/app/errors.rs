use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error};

use catalog_core::FieldErrors;
use catalog_infra::CatalogError;

pub fn catalog_error_to_response(err: CatalogError) -> Response {
    match err {
        CatalogError::NotFound => not_found(),
        CatalogError::Validation(fields) => failed_validation(fields),
        CatalogError::Conflict(msg) => {
            debug!(detail = %msg, "edit conflict");
            json_error(
                StatusCode::CONFLICT,
                "edit_conflict",
                "unable to update the record due to an edit conflict, please try again",
            )
        }
        CatalogError::Store(e) => {
            error!(error = %e, "store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "the server encountered a problem and could not process your request",
            )
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn failed_validation(fields: FieldErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        axum::Json(json!({
            "error": "validation_failed",
            "message": "one or more fields are invalid",
            "fields": fields,
        })),
    )
        .into_response()
}

pub fn not_found() -> Response {
    json_error(
        StatusCode::NOT_FOUND,
        "not_found",
        "the requested resource could not be found",
    )
}

/// Any body the JSON extractor cannot use is the caller's fault.
pub fn bad_json(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
}

pub async fn route_not_found() -> Response {
    not_found()
}
