//! Shared application state for the askline server.

use std::sync::Arc;
use std::time::Instant;

use askline_common::config::AppConfig;
use askline_pipeline::anon::AnonProfileStore;
use askline_pipeline::ask::PipelineDeps;
use askline_pipeline::cache::AskCache;
use askline_pipeline::ratelimit::RateLimiter;

/// Shared state accessible by all route handlers.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<PipelineDeps>,
    pub cache: AskCache,
    pub rate_limiter: RateLimiter,
    pub anon_profiles: AnonProfileStore,
    pub started_at: Instant,
}
