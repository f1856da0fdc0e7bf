//! `AskError` → JSON envelope conversion.
//!
//! Grounded on `tuitbot-server::error::ApiError`'s `IntoResponse` pattern:
//! a thin wrapper type carrying the domain error plus the request id needed
//! for the envelope, converted to a `(StatusCode, Json)` response.

use askline_common::AskError;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    pub error: AskError,
    pub request_id: String,
    pub is_production: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self.error.client_message(self.is_production);

        if !status.is_success() {
            tracing::warn!(request_id = %self.request_id, status = status.as_u16(), %message, "askline.server.error");
        }

        let mut response = (
            status,
            Json(json!({ "message": message, "requestId": self.request_id })),
        )
            .into_response();

        if let AskError::RateLimited { retry_after_secs } = self.error {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}
