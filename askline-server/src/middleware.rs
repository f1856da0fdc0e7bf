//! Request-id assignment and structured access logging.
//!
//! Grounded on `tuitbot-server`'s `TraceLayer::new_for_http()` usage, but
//! implemented as a bespoke `axum::middleware::from_fn` layer since
//! `TraceLayer` alone does not emit the exact
//! `{requestId, method, path, status, durationMs}` single-line shape.

use std::time::Instant;

use askline_common::{generate_request_id, is_valid_request_id};
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assign a request id (from the caller's header if it validates, else a
/// fresh one), stash it in request extensions, echo it on the response, and
/// emit one structured access-log line per request.
pub async fn request_id_and_access_log(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_valid_request_id(v))
        .map(|v| v.to_string())
        .unwrap_or_else(generate_request_id);

    req.extensions_mut().insert(request_id.clone());

    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-Id", value);
    }

    if path.starts_with("/api/") {
        tracing::info!(
            requestId = %request_id,
            method = %method,
            path = %path,
            status,
            durationMs = duration_ms,
            "askline.server.access"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_name_is_lowercase_for_case_insensitive_lookup() {
        assert_eq!(REQUEST_ID_HEADER, "x-request-id");
    }
}
