//! `GET /api/models`.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn models(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<String>,
) -> impl IntoResponse {
    let is_production = state.config.is_production();

    if !state.pipeline.llm_configured {
        return Json(json!({
            "provider": "openrouter",
            "models": Vec::<String>::new(),
            "requiresApiKey": true,
        }))
        .into_response();
    }

    match state.pipeline.catalog.list_free_models().await {
        Ok(models) => Json(json!({
            "provider": "openrouter",
            "models": models,
            "requiresApiKey": false,
        }))
        .into_response(),
        Err(error) => ApiError { error, request_id, is_production }.into_response(),
    }
}
