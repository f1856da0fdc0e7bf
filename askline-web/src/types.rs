//! Shared shapes returned by the search adapters and bounded fetcher.

use serde::{Deserialize, Serialize};

/// A single hit from a search provider, already normalised to a uniform
/// shape regardless of which provider produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Present only for providers (e.g. Provider B) that can return the raw
    /// page content alongside the search hit, sparing a separate fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

/// Per-call tuning knobs threaded through to both search adapters.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub timeout_ms: u64,
    pub topic: SearchTopic,
    pub time_range: Option<String>,
    pub search_depth: SearchDepth,
    pub include_raw_content: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 4,
            timeout_ms: 10_000,
            topic: SearchTopic::General,
            time_range: None,
            search_depth: SearchDepth::Basic,
            include_raw_content: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTopic {
    General,
    News,
    Finance,
}

impl SearchTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchTopic::General => "general",
            SearchTopic::News => "news",
            SearchTopic::Finance => "finance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    Fast,
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Fast => "fast",
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}
