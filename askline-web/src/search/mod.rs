//! Search adapters: two providers, one uniform output shape.
//!
//! Each provider is its own struct wrapping a plain `reqwest::Client`,
//! mirroring the teacher's one-struct-per-provider split for its LLM
//! adapters. A `SearchProvider` trait lets the pipeline fan out to both
//! concretely-typed clients through a single `Vec<Box<dyn SearchProvider>>`.

pub mod provider_a;
pub mod provider_b;

use async_trait::async_trait;

use crate::types::{SearchOptions, WebSearchResult};
use askline_common::AskError;

pub use provider_a::ProviderA;
pub use provider_b::ProviderB;

/// Common behavior shared by both search adapters.
///
/// Returns an empty vector (not an error) when the provider's API key is
/// absent — an unconfigured provider is simply disabled, not a fault.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<WebSearchResult>, AskError>;
}
