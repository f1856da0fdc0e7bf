//! `GET /api/health`.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>, Extension(request_id): Extension<String>) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "requestId": request_id,
        "uptimeSec": state.started_at.elapsed().as_secs(),
        "env": state.config.node_env,
    }))
}
