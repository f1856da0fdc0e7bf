//! Query planning: recency/finance intent detection, topical-core
//! extraction, and deduped query expansion.
//!
//! Grounded on the teacher's `regex::Regex`-driven text classification idiom
//! (`nowhere-llm::verifier`'s fenced-JSON regexes); here the same "ordered
//! predicate table over normalized text" shape is used for intent words
//! instead of JSON fences.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Mode;

const FRESH_WORDS: &[&str] = &[
    "latest", "current", "recent", "news", "update", "trending", "haal", "taaza", "is hafte",
];
const VERY_FRESH_WORDS: &[&str] = &["today", "right now", "breaking", "aaj", "abhi"];
const FINANCE_WORDS: &[&str] = &[
    "stock",
    "market",
    "price",
    "nifty",
    "sensex",
    "crypto",
    "forex",
    "inflation",
    "interest rate",
];

static LEADING_INTERROGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(what|who|where|when|why|how|explain|tell me|define|latest|current)\b[\s,:-]*")
        .unwrap()
});

fn normalize(question: &str) -> String {
    question
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_any(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|w| haystack.contains(w))
}

pub fn wants_fresh(question: &str) -> bool {
    let normalized = normalize(question);
    contains_any(&normalized, FRESH_WORDS) || wants_very_fresh(question)
}

pub fn wants_very_fresh(question: &str) -> bool {
    contains_any(&normalize(question), VERY_FRESH_WORDS)
}

pub fn wants_finance(question: &str) -> bool {
    contains_any(&normalize(question), FINANCE_WORDS)
}

/// Strip a leading interrogative/imperative phrase, leaving the topical core.
pub fn topical_core(question: &str) -> String {
    let normalized = normalize(question);
    let stripped = LEADING_INTERROGATIVE.replace(&normalized, "");
    let core = stripped.trim();
    if core.is_empty() {
        normalized
    } else {
        core.to_string()
    }
}

/// Build up to three deduped (case-insensitive) search queries.
pub fn build_queries(question: &str, mode: Mode) -> Vec<String> {
    let core = topical_core(question);
    let fresh = wants_fresh(question);
    let very_fresh = wants_very_fresh(question);
    let finance = wants_finance(question);

    let mut candidates = vec![question.trim().to_string(), core.clone()];
    if fresh {
        candidates.push(format!("{core} latest"));
    }
    if very_fresh {
        candidates.push(format!("{core} today"));
    }
    if finance {
        candidates.push(format!("{core} price"));
    }
    if mode == Mode::Verified {
        candidates.push(format!("{core} official"));
    }

    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::new();
    for candidate in candidates {
        let key = candidate.to_lowercase();
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        deduped.push(candidate);
        if deduped.len() == 3 {
            break;
        }
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_fresh_and_very_fresh() {
        assert!(wants_fresh("what is the latest news on rust"));
        assert!(wants_very_fresh("breaking news today"));
        assert!(!wants_very_fresh("what is the latest news"));
    }

    #[test]
    fn detects_finance_intent() {
        assert!(wants_finance("nifty stock price today"));
        assert!(!wants_finance("explain gravity"));
    }

    #[test]
    fn strips_leading_interrogative() {
        assert_eq!(topical_core("What is the capital of France?"), "capital of france?");
        assert_eq!(topical_core("Tell me about black holes"), "black holes");
    }

    #[test]
    fn builds_at_most_three_deduped_queries() {
        let queries = build_queries("latest nifty stock price today", Mode::Verified);
        assert!(queries.len() <= 3);
        let lowered: Vec<_> = queries.iter().map(|q| q.to_lowercase()).collect();
        let unique: std::collections::HashSet<_> = lowered.iter().cloned().collect();
        assert_eq!(lowered.len(), unique.len());
    }

    #[test]
    fn non_fresh_non_finance_fast_mode_yields_base_and_core() {
        let queries = build_queries("Explain gravity", Mode::Fast);
        assert_eq!(queries, vec!["Explain gravity".to_string(), "gravity".to_string()]);
    }
}
