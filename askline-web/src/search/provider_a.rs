//! Provider A: header-auth GET search (Brave Search API shape).
//!
//! Grounded on the teacher's (dead) `brave::client::BraveApi` struct: a thin
//! authenticated-GET wrapper, reused here as a live adapter returning the
//! uniform [`WebSearchResult`] shape instead of the teacher's discovery-
//! stream items. Drives `reqwest` directly and retries once on 429/5xx, the
//! same bespoke-retry style `askline_llm::openrouter::OpenRouterClient` uses
//! for its own single upstream.

use std::time::Duration;

use askline_common::AskError;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::search::SearchProvider;
use crate::types::{SearchOptions, WebSearchResult};
use async_trait::async_trait;

const RETRY_BACKOFF: Duration = Duration::from_millis(300);
const MAX_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct ProviderA {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ProviderA {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, AskError> {
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl SearchProvider for ProviderA {
    fn name(&self) -> &'static str {
        "provider_a"
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<WebSearchResult>, AskError> {
        let Some(token) = self.token.as_deref() else {
            return Ok(Vec::new());
        };

        let mut attempt = 0usize;
        let response = loop {
            attempt += 1;
            let send_result = self
                .client
                .get(&self.base_url)
                .timeout(Duration::from_millis(opts.timeout_ms))
                .header("X-Subscription-Token", token)
                .query(&[("q", query), ("count", &opts.max_results.to_string())])
                .send()
                .await;

            let resp = match send_result {
                Ok(resp) => resp,
                Err(err) => {
                    if is_retryable_network_error(&err) && attempt < MAX_ATTEMPTS {
                        tracing::warn!(attempt, error = %err, "askline.search.provider_a.retrying.network");
                        tokio::time::sleep(RETRY_BACKOFF).await;
                        continue;
                    }
                    return Err(AskError::UpstreamSearch(err.to_string()));
                }
            };

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let message = resp.text().await.unwrap_or_default();
                return Err(AskError::UpstreamAuth(message));
            }
            if is_retryable_status(status) && attempt < MAX_ATTEMPTS {
                tracing::warn!(attempt, %status, "askline.search.provider_a.retrying.status");
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(AskError::UpstreamSearch(format!("status {status}: {message}")));
            }
            break resp;
        };

        let parsed: BraveStyleResponse = response
            .json()
            .await
            .map_err(|e| AskError::UpstreamSearch(e.to_string()))?;

        let results = parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|hit| WebSearchResult {
                title: hit.title,
                url: hit.url,
                snippet: hit.description.unwrap_or_default(),
                raw_content: None,
            })
            .collect();

        Ok(results)
    }
}

fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Debug, Deserialize)]
struct BraveStyleResponse {
    web: Option<BraveWebSection>,
}

#[derive(Debug, Deserialize)]
struct BraveWebSection {
    #[serde(default)]
    results: Vec<BraveHit>,
}

#[derive(Debug, Deserialize)]
struct BraveHit {
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_without_token_returns_empty() {
        let provider = ProviderA::new("https://api.search.brave.com", None).unwrap();
        let results = provider
            .search("rust lang", &SearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn parses_web_results_into_uniform_shape() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "web": {
                    "results": [
                        {"title": "Rust", "url": "https://rust-lang.org", "description": "A language"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let provider = ProviderA::new(&server.uri(), Some("tok".to_string())).unwrap();
        let results = provider
            .search("rust", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://rust-lang.org");
        assert_eq!(results[0].snippet, "A language");
    }

    #[tokio::test]
    async fn auth_failure_maps_to_upstream_auth() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let provider = ProviderA::new(&server.uri(), Some("tok".to_string())).unwrap();
        let err = provider
            .search("rust", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::UpstreamAuth(_)));
    }
}
