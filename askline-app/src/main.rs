//! askline server binary: wires configuration, the LLM/search clients, and
//! the HTTP shell together and serves them.

use std::sync::Arc;
use std::time::Instant;

use askline_common::config::AppConfig;
use askline_common::observability::{init_logging, LogConfig};
use askline_llm::catalog::ModelCatalog;
use askline_llm::openrouter::OpenRouterClient;
use askline_pipeline::anon::AnonProfileStore;
use askline_pipeline::ask::PipelineDeps;
use askline_pipeline::cache::AskCache;
use askline_pipeline::ratelimit::RateLimiter;
use askline_server::state::AppState;
use askline_web::search::{ProviderA, ProviderB, SearchProvider};

#[tokio::main]
async fn main() -> askline_common::Result<()> {
    let config = AppConfig::from_env()?;

    init_logging(LogConfig::for_environment("askline-server", config.is_production()));

    let llm = Arc::new(OpenRouterClient::new(&config.openrouter_base_url, &config.openrouter_api_key));
    let catalog = Arc::new(ModelCatalog::new(llm.clone(), true));

    let mut search_providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
    search_providers.push(Arc::new(ProviderA::new(
        &config.brave_search_base_url,
        config.brave_search_api_key.clone(),
    )?));
    search_providers.push(Arc::new(ProviderB::new(
        &config.tavily_base_url,
        config.tavily_api_key.clone(),
    )?));

    if !config.has_search_provider() {
        tracing::warn!("no web search provider configured; ask requests will fall back to direct answers");
    }

    let pipeline = Arc::new(PipelineDeps {
        llm,
        catalog,
        search_providers,
        default_model: config.openrouter_default_model.clone(),
        llm_configured: true,
    });

    let port = config.port;
    let state = Arc::new(AppState {
        config: Arc::new(config),
        pipeline,
        cache: AskCache::new(),
        rate_limiter: RateLimiter::new(),
        anon_profiles: AnonProfileStore::new(),
        started_at: Instant::now(),
    });

    let router = askline_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| askline_common::AskError::Internal(e.to_string()))?;
    tracing::info!(port, "askline server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| askline_common::AskError::Internal(e.to_string()))?;

    Ok(())
}
