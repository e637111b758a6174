//! HTTP error mapping
//!
//! Translates the shared error taxonomy into status codes and the
//! `{kind, message, hint?, trace_id}` body every error response carries.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use msr_common::Error;

/// Wrapper making the common error renderable by axum
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = self.0.to_body();
        (status, Json(body)).into_response()
    }
}

/// Status code per error kind
pub fn status_for(error: &Error) -> StatusCode {
    match error.kind() {
        "invalid_argument" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "quota_exceeded" => StatusCode::TOO_MANY_REQUESTS,
        "incompatible" => StatusCode::CONFLICT,
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        "upstream_unavailable" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convenience result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
