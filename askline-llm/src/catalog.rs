//! Free-tier model catalog, cached for ten minutes.
//!
//! Grounded on the teacher's model-catalog caches in `nowhere-llm` (an
//! `RwLock<Option<(Instant, T)>>` guarding a single upstream list call so
//! concurrent callers don't each pay for their own `/models` round trip).

use std::sync::Arc;
use std::time::{Duration, Instant};

use askline_common::AskError;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::openrouter::OpenRouterClient;

const CACHE_TTL: Duration = Duration::from_secs(10 * 60);
const MAX_MODELS: usize = 100;
const LIST_TIMEOUT_MS: u64 = 8_000;

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    pricing: Option<Pricing>,
}

#[derive(Deserialize)]
struct Pricing {
    prompt: Option<Value>,
    completion: Option<Value>,
    request: Option<Value>,
}

fn is_free(pricing: &Pricing) -> bool {
    [&pricing.prompt, &pricing.completion, &pricing.request]
        .into_iter()
        .all(|field| match field {
            Some(value) => parse_price(value).map(|p| p <= 0.0).unwrap_or(false),
            None => false,
        })
}

fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Caches the free-model list behind a single upstream fetch per TTL window.
pub struct ModelCatalog {
    client: Arc<OpenRouterClient>,
    cache: RwLock<Option<(Instant, Vec<String>)>>,
    enabled: bool,
}

impl ModelCatalog {
    pub fn new(client: Arc<OpenRouterClient>, enabled: bool) -> Self {
        Self {
            client,
            cache: RwLock::new(None),
            enabled,
        }
    }

    /// List free-tier model ids, refreshing from upstream if the cache is
    /// absent or stale. Returns an empty list when no provider key is
    /// configured rather than erroring.
    pub async fn list_free_models(&self) -> Result<Vec<String>, AskError> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        if let Some((fetched_at, models)) = self.cache.read().await.as_ref() {
            if fetched_at.elapsed() < CACHE_TTL {
                return Ok(models.clone());
            }
        }

        let mut guard = self.cache.write().await;
        if let Some((fetched_at, models)) = guard.as_ref() {
            if fetched_at.elapsed() < CACHE_TTL {
                return Ok(models.clone());
            }
        }

        let raw = self.client.list_models(LIST_TIMEOUT_MS).await?;
        let parsed: ModelsResponse = serde_json::from_value(raw)
            .map_err(|e| AskError::UpstreamLlm(format!("unexpected models response: {e}")))?;

        let models: Vec<String> = parsed
            .data
            .into_iter()
            .filter(|entry| entry.pricing.as_ref().is_some_and(is_free))
            .map(|entry| entry.id)
            .take(MAX_MODELS)
            .collect();

        *guard = Some((Instant::now(), models.clone()));
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_catalog_returns_empty_without_calling_upstream() {
        let client = Arc::new(OpenRouterClient::new("https://openrouter.ai/api/v1", ""));
        let catalog = ModelCatalog::new(client, false);
        let models = catalog.list_free_models().await.unwrap();
        assert!(models.is_empty());
    }

    #[tokio::test]
    async fn filters_to_zero_cost_models_and_caches() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": "free/model-a", "pricing": {"prompt": "0", "completion": "0", "request": "0"}},
                    {"id": "paid/model-b", "pricing": {"prompt": "0.002", "completion": "0.002", "request": "0"}},
                    {"id": "free/model-c", "pricing": {"prompt": 0, "completion": 0, "request": 0}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(OpenRouterClient::new(server.uri(), "sk-test"));
        let catalog = ModelCatalog::new(client, true);

        let models = catalog.list_free_models().await.unwrap();
        assert_eq!(models, vec!["free/model-a".to_string(), "free/model-c".to_string()]);

        // Second call hits the cache, not a second upstream request (the
        // wiremock `expect(1)` above would fail the test otherwise).
        let cached = catalog.list_free_models().await.unwrap();
        assert_eq!(cached, models);
    }
}
