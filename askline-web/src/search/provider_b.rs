//! Provider B: bearer-auth POST search with optional raw content (Tavily
//! Search API shape). Drives `reqwest` directly, same retry idiom as
//! [`crate::search::provider_a`].

use std::time::Duration;

use askline_common::AskError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::search::SearchProvider;
use crate::types::{SearchOptions, WebSearchResult};
use async_trait::async_trait;

const RETRY_BACKOFF: Duration = Duration::from_millis(300);
const MAX_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct ProviderB {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ProviderB {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AskError> {
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SearchProvider for ProviderB {
    fn name(&self) -> &'static str {
        "provider_b"
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<WebSearchResult>, AskError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };

        let body = SearchRequest {
            query: query.to_string(),
            max_results: opts.max_results,
            topic: opts.topic.as_str().to_string(),
            time_range: opts.time_range.clone(),
            search_depth: opts.search_depth.as_str().to_string(),
            include_answer: false,
            include_raw_content: opts.include_raw_content,
        };

        let url = format!("{}/search", self.base_url);
        let mut attempt = 0usize;
        let response = loop {
            attempt += 1;
            let send_result = self
                .client
                .post(&url)
                .timeout(Duration::from_millis(opts.timeout_ms))
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;

            let resp = match send_result {
                Ok(resp) => resp,
                Err(err) => {
                    if is_retryable_network_error(&err) && attempt < MAX_ATTEMPTS {
                        tracing::warn!(attempt, error = %err, "askline.search.provider_b.retrying.network");
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
                tracing::warn!(attempt, %status, "askline.search.provider_b.retrying.status");
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(AskError::UpstreamSearch(format!("status {status}: {message}")));
            }
            break resp;
        };

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AskError::UpstreamSearch(e.to_string()))?;

        let results = parsed
            .results
            .into_iter()
            .map(|hit| {
                let mut snippet = hit.content.unwrap_or_default();
                if let Some(date) = hit.published_date {
                    snippet.push_str(&format!("\nPublished: {date}"));
                }
                let raw_content = hit
                    .raw_content
                    .or(hit.raw_content_camel)
                    .filter(|s| !s.is_empty());
                WebSearchResult {
                    title: hit.title,
                    url: hit.url,
                    snippet,
                    raw_content,
                }
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

#[derive(Debug, Serialize)]
struct SearchRequest {
    query: String,
    max_results: usize,
    topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<String>,
    search_depth: String,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default, rename = "rawContent")]
    raw_content_camel: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}
