//! Shared types and utilities for the askline workspace.
//!
//! This crate defines the runtime configuration, the error taxonomy shared
//! by every other askline crate, and process-wide observability setup. It
//! is intentionally lightweight so that every crate can depend on it
//! without pulling in heavy transitive costs.
//!
//! # Overview
//!
//! - [`config::AppConfig`]: environment-sourced runtime configuration
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`AskError`] and [`Result`]: shared error taxonomy with HTTP mapping

pub mod config;
pub mod observability;

use uuid::Uuid;

/// Error taxonomy shared across the ask pipeline and HTTP shell.
///
/// Each variant carries the HTTP status it maps to when surfaced to a
/// client (see [`AskError::status_code`]); recoverable failures (search
/// provider errors, page fetch errors, follow-up generation failures) are
/// absorbed by their callers and never become an `AskError` at all.
#[derive(thiserror::Error, Debug)]
pub enum AskError {
    /// Request body failed schema validation.
    #[error("{0}")]
    Validation(String),

    /// Caller exceeded their rate-limit window.
    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },

    /// The LLM provider rejected our credentials.
    #[error("upstream auth failed: {0}")]
    UpstreamAuth(String),

    /// A search provider failed after exhausting retries.
    #[error("search provider failed: {0}")]
    UpstreamSearch(String),

    /// The LLM provider failed after exhausting retries.
    #[error("llm provider failed: {0}")]
    UpstreamLlm(String),

    /// A page fetch failed after exhausting retries.
    #[error("page fetch failed: {0}")]
    UpstreamFetch(String),

    /// Response content-type was not html/xhtml.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Response body exceeded the configured byte cap.
    #[error("payload too large")]
    PayloadTooLarge,

    /// URL failed the SSRF guard.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Required configuration (e.g. an API key) is missing.
    #[error("misconfigured: {0}")]
    Misconfigured(String),

    /// No completion model could be resolved.
    #[error("no model available")]
    NoModelAvailable,

    /// Anything unclassified.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AskError {
    /// HTTP status this error maps to when it reaches the HTTP shell.
    pub fn status_code(&self) -> u16 {
        match self {
            AskError::Validation(_) => 400,
            AskError::InvalidUrl(_) => 400,
            AskError::RateLimited { .. } => 429,
            AskError::UpstreamAuth(_) => 401,
            AskError::UpstreamSearch(_) | AskError::UpstreamLlm(_) | AskError::UpstreamFetch(_) => {
                502
            }
            AskError::UnsupportedMediaType(_) => 415,
            AskError::PayloadTooLarge => 413,
            AskError::Misconfigured(_) | AskError::NoModelAvailable => 503,
            AskError::Internal(_) => 500,
        }
    }

    /// Client-facing message. In production (`is_production`), unclassified
    /// internal errors are replaced with a fixed string to avoid leaking
    /// implementation details, per the error-handling design.
    pub fn client_message(&self, is_production: bool) -> String {
        match self {
            AskError::Internal(_) if is_production => "Internal Server Error".to_string(),
            AskError::RateLimited { .. } => {
                "Too Many Requests, please try again later".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Convenient alias for results that use [`AskError`].
pub type Result<T> = std::result::Result<T, AskError>;

/// Generate a random request id used when no caller-supplied
/// `X-Request-Id` header validates.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validate a caller-supplied request id: `[A-Za-z0-9._-]{1,200}`.
pub fn is_valid_request_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 200
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_validation_rejects_bad_chars() {
        assert!(is_valid_request_id("abc-123._XYZ"));
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("has space"));
        assert!(!is_valid_request_id(&"a".repeat(201)));
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(AskError::Validation("x".into()).status_code(), 400);
        assert_eq!(
            AskError::RateLimited {
                retry_after_secs: 1
            }
            .status_code(),
            429
        );
        assert_eq!(AskError::UpstreamAuth("x".into()).status_code(), 401);
        assert_eq!(AskError::UpstreamLlm("x".into()).status_code(), 502);
        assert_eq!(AskError::NoModelAvailable.status_code(), 503);
        assert_eq!(AskError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn internal_message_hidden_in_production() {
        let err = AskError::Internal("db exploded".into());
        assert_eq!(err.client_message(true), "Internal Server Error");
        assert_eq!(err.client_message(false), "internal error: db exploded");
    }
}
