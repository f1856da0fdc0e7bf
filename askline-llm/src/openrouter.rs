//! OpenRouter chat-completion adapter.
//!
//! Grounded on the teacher's `openai::OpenAiClient` shape (a thin client
//! struct wrapping an HTTP base URL + bearer key), but targets OpenRouter's
//! `/chat/completions` endpoint instead of the Responses API, and implements
//! the exact retry/backoff table the spec calls for by driving `reqwest`
//! directly: this adapter needs per-response access to the `Retry-After`
//! header and a 401/403 fast-fail baked into its own loop.

use std::time::Duration;

use askline_common::AskError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const NETWORK_RETRY_BACKOFF: Duration = Duration::from_millis(350);
const STATUS_RETRY_BACKOFF: Duration = Duration::from_millis(350);
const DECODE_RETRY_BACKOFF: Duration = Duration::from_millis(200);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: usize = 2;

pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Parameters for a single chat-completion call.
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub timeout_ms: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

impl OpenRouterClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Call `/chat/completions`, returning the first choice's message content.
    pub async fn chat(&self, req: ChatRequest<'_>) -> Result<String, AskError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model: req.model,
            messages: req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let mut attempt = 0usize;
        let mut decode_retried = false;

        loop {
            attempt += 1;
            let send_result = self
                .client
                .post(&url)
                .timeout(Duration::from_millis(req.timeout_ms))
                .bearer_auth(&self.api_key)
                .header("X-Title", "askline")
                .json(&body)
                .send()
                .await;

            let response = match send_result {
                Ok(resp) => resp,
                Err(err) => {
                    if is_retryable_network_error(&err) && attempt < MAX_ATTEMPTS {
                        tracing::warn!(attempt, error = %err, "askline.llm.retrying.network");
                        tokio::time::sleep(NETWORK_RETRY_BACKOFF).await;
                        continue;
                    }
                    return Err(AskError::UpstreamLlm(err.to_string()));
                }
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let message = response.text().await.unwrap_or_default();
                return Err(AskError::UpstreamAuth(message));
            }

            if is_retryable_status(status) && attempt < MAX_ATTEMPTS {
                let delay = retry_after_delay(response.headers()).unwrap_or(STATUS_RETRY_BACKOFF);
                tracing::warn!(attempt, %status, delay_ms = delay.as_millis() as u64, "askline.llm.retrying.status");
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AskError::UpstreamLlm(format!("status {status}: {message}")));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| AskError::UpstreamLlm(e.to_string()))?;

            match serde_json::from_slice::<ChatCompletionResponse>(&bytes) {
                Ok(parsed) => {
                    let content = parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .unwrap_or_default();
                    return Ok(content);
                }
                Err(e) => {
                    if !decode_retried {
                        decode_retried = true;
                        tracing::warn!(error = %e, "askline.llm.retrying.decode");
                        tokio::time::sleep(DECODE_RETRY_BACKOFF).await;
                        attempt = 0; // decode retry is independent of the network/status budget
                        continue;
                    }
                    return Err(AskError::UpstreamLlm(format!("unexpected response shape: {e}")));
                }
            }
        }
    }

    /// `GET /models`, returning the raw parsed JSON for [`crate::catalog`] to filter.
    pub async fn list_models(&self, timeout_ms: u64) -> Result<Value, AskError> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_millis(timeout_ms))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AskError::UpstreamLlm(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AskError::UpstreamLlm(format!("status {}", response.status())));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AskError::UpstreamLlm(e.to_string()))
    }
}

fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn retry_after_delay(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs: u64 = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_chat_returns_content() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "hello there"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(server.uri(), "sk-test");
        let messages = vec![ChatMessage::user("hi")];
        let result = client
            .chat(ChatRequest {
                model: "test-model",
                messages: &messages,
                timeout_ms: 5_000,
                temperature: Some(0.2),
                max_tokens: Some(100),
            })
            .await
            .unwrap();
        assert_eq!(result, "hello there");
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(server.uri(), "sk-bad");
        let messages = vec![ChatMessage::user("hi")];
        let err = client
            .chat(ChatRequest {
                model: "test-model",
                messages: &messages,
                timeout_ms: 5_000,
                temperature: None,
                max_tokens: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::UpstreamAuth(_)));
    }

    #[tokio::test]
    async fn service_unavailable_retries_then_succeeds() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "recovered"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(server.uri(), "sk-test");
        let messages = vec![ChatMessage::user("hi")];
        let result = client
            .chat(ChatRequest {
                model: "test-model",
                messages: &messages,
                timeout_ms: 5_000,
                temperature: None,
                max_tokens: None,
            })
            .await
            .unwrap();
        assert_eq!(result, "recovered");
    }
}
