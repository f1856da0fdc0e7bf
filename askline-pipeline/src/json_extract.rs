//! Fenced-JSON extraction.
//!
//! Grounded on the teacher's `nowhere-llm::verifier::extract_json_block`
//! idiom (dead code there, never wired to a caller): try a fenced
//! ` ```json ` block first, then fall back to the first greedy
//! brace/bracket span. Generalized here to also match JSON arrays, since
//! grounded-fact extraction and follow-up generation both expect arrays
//! rather than a single object.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());
static FENCED_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").unwrap());
static GREEDY_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").unwrap());
static GREEDY_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)(\[.*\])").unwrap());

/// Extract the most likely JSON object span from free-form LLM text.
pub fn extract_json_object(text: &str) -> Option<String> {
    if let Some(caps) = FENCED_OBJECT.captures(text) {
        return Some(caps[1].to_string());
    }
    GREEDY_OBJECT.captures(text).map(|caps| caps[1].to_string())
}

/// Extract the most likely JSON array span from free-form LLM text.
pub fn extract_json_array(text: &str) -> Option<String> {
    if let Some(caps) = FENCED_ARRAY.captures(text) {
        return Some(caps[1].to_string());
    }
    GREEDY_ARRAY.captures(text).map(|caps| caps[1].to_string())
}
