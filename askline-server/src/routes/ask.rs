//! `POST /api/ask`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use askline_common::AskError;
use askline_pipeline::types::RawAskRequest;
use askline_pipeline::AskRequest;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::ApiError;
use crate::state::AppState;

fn client_ip(headers: &HeaderMap) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `[A-Za-z0-9._:-]{1,200}`, the anon-ID wire contract. Caller-supplied
/// values that don't validate are dropped rather than rejected — anon
/// tracking is best-effort.
fn anon_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-nolia-anon-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| askline_pipeline::anon::is_valid_anon_id(v))
        .map(|v| v.to_string())
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    Json(raw): Json<RawAskRequest>,
) -> impl IntoResponse {
    let is_production = state.config.is_production();
    let now = now_ms();
    let ip = client_ip(&headers).to_string();

    let decision = state.rate_limiter.hit(&ip, now).await;
    let rate_headers = [
        ("X-RateLimit-Limit", decision.limit.to_string()),
        ("X-RateLimit-Remaining", decision.remaining.to_string()),
        ("X-RateLimit-Reset", decision.reset_at_ms.div_ceil(1000).to_string()),
    ];

    if !decision.allowed {
        let err = ApiError {
            error: AskError::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(60),
            },
            request_id,
            is_production,
        };
        return (rate_headers, err.into_response()).into_response();
    }

    let anon = anon_id(&headers);

    let request = match AskRequest::from_raw(raw) {
        Ok(request) => request,
        Err(error) => {
            return (
                rate_headers,
                ApiError { error, request_id, is_production }.into_response(),
            )
                .into_response();
        }
    };

    let body_json = serde_json::to_string(&request).unwrap_or_default();
    let partition = anon.clone().unwrap_or_else(|| ip.clone());
    let cache_key = askline_pipeline::cache::cache_key(&partition, &body_json);

    let pipeline = state.pipeline.clone();
    let language = request.language;
    let style = request.style;
    let question = request.question.clone();

    let result = state
        .cache
        .get_or_run(&cache_key, now, async move { askline_pipeline::ask::run(request, &pipeline).await })
        .await;

    match result {
        Ok(response) => {
            if let Some(anon_id) = anon {
                state.anon_profiles.record(&anon_id, &question, language, style, now).await;
            }
            (rate_headers, Json(response)).into_response()
        }
        Err(error) => (
            rate_headers,
            ApiError { error, request_id, is_production }.into_response(),
        )
            .into_response(),
    }
}
