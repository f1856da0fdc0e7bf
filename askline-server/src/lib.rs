//! The askline HTTP shell: request-id assignment, rate limiting, caching,
//! and the small set of public routes around the ask pipeline.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware as axum_middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1_000_000;

/// Build the complete axum router with all routes and middleware applied.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health::health))
        .route("/models", get(routes::models::models))
        .route("/ask", axum::routing::post(routes::ask::ask))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    Router::new()
        .nest("/api", api)
        .route("/robots.txt", get(routes::seo::robots))
        .route("/sitemap.xml", get(routes::seo::sitemap))
        .layer(axum_middleware::from_fn(middleware::request_id_and_access_log))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
