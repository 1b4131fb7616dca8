use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use care_core::session::SessionStoreError;
use tracing::error;

use super::models::{ErrorBody, ErrorResponse};

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn session_not_found_response() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "session_not_found",
        "No session exists with that id",
    )
}

pub(super) fn session_store_error_response(err: SessionStoreError) -> Response {
    error!("session store error: {err}");
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "session_store_unavailable",
        "Session storage is temporarily unavailable",
    )
}
