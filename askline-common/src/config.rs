//! Runtime configuration sourced entirely from environment variables.
//!
//! Mirrors the teacher's `nowhere-config` in spirit (deserialize into a
//! typed struct through the `config` crate) but drops the YAML file layer:
//! this service reads exclusively from the process environment.

use serde::Deserialize;

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenRouter chat-completions endpoint. Required.
    pub openrouter_api_key: String,

    /// Base URL for OpenRouter. Defaults to the public API root.
    #[serde(default = "default_openrouter_base_url")]
    pub openrouter_base_url: String,

    /// Model id to use when the caller does not specify one.
    pub openrouter_default_model: Option<String>,

    /// API key for the header-auth search provider (Brave-shaped). Optional;
    /// if unset, that provider is skipped during evidence gathering.
    pub brave_search_api_key: Option<String>,

    #[serde(default = "default_brave_base_url")]
    pub brave_search_base_url: String,

    /// API key for the bearer-auth search provider (Tavily-shaped). Optional.
    pub tavily_api_key: Option<String>,

    #[serde(default = "default_tavily_base_url")]
    pub tavily_base_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_node_env")]
    pub node_env: String,

    pub public_base_url: Option<String>,
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_brave_base_url() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}

fn default_tavily_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_node_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables are mapped verbatim, lower-cased, onto struct
    /// fields (e.g. `OPENROUTER_API_KEY` -> `openrouter_api_key`).
    pub fn from_env() -> crate::Result<Self> {
        let raw = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()
            .map_err(|e| crate::AskError::Misconfigured(e.to_string()))?;

        let cfg: Self = raw
            .try_deserialize()
            .map_err(|e| crate::AskError::Misconfigured(e.to_string()))?;

        if cfg.openrouter_api_key.trim().is_empty() {
            return Err(crate::AskError::Misconfigured(
                "OPENROUTER_API_KEY is required".to_string(),
            ));
        }

        Ok(cfg)
    }

    /// Whether at least one web search provider is configured.
    pub fn has_search_provider(&self) -> bool {
        self.brave_search_api_key.is_some() || self.tavily_api_key.is_some()
    }

    pub fn is_production(&self) -> bool {
        self.node_env.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_misconfigured() {
        temp_env::with_vars_unset(["OPENROUTER_API_KEY"], || {
            let result = AppConfig::from_env();
            assert!(result.is_err());
        });
    }

    #[test]
    fn defaults_apply_when_unset() {
        temp_env::with_vars(
            [
                ("OPENROUTER_API_KEY", Some("sk-test")),
                ("OPENROUTER_BASE_URL", None),
                ("PORT", None),
            ],
            || {
                let cfg = AppConfig::from_env().expect("config should load");
                assert_eq!(cfg.openrouter_base_url, "https://openrouter.ai/api/v1");
                assert_eq!(cfg.port, 5000);
                assert_eq!(cfg.node_env, "development");
                assert!(!cfg.has_search_provider());
            },
        );
    }

    #[test]
    fn search_provider_detected_when_key_present() {
        temp_env::with_vars(
            [
                ("OPENROUTER_API_KEY", Some("sk-test")),
                ("TAVILY_API_KEY", Some("tvly-test")),
            ],
            || {
                let cfg = AppConfig::from_env().expect("config should load");
                assert!(cfg.has_search_provider());
            },
        );
    }
}
