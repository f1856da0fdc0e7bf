//! Evidence ranking: canonical URL keys, scoring, and host-diversified
//! selection.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use url::Url;

use crate::types::{EvidenceSource, SourceCandidate};

const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "igshid", "mc_cid", "mc_eid", "ref", "ref_src"];

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "with", "that", "this", "from", "have", "has",
    "what", "who", "where", "when", "why", "how", "does", "did", "you", "your", "about",
];

static PUBLISHED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Published:\s*(\d{4}-\d{2}-\d{2})").unwrap());

/// Scheme-independent, tracking-param-stripped, sorted-query identity key.
pub fn canonical_key(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let mut query_pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    query_pairs.sort();
    let query = query_pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Some(if query.is_empty() {
        format!("{host}{path}")
    } else {
        format!("{host}{path}?{query}")
    })
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

fn domain_trust_score(host: &str) -> f64 {
    let host = host.to_lowercase();
    let low_quality = ["medium.com", "blogspot", "wordpress", "substack", "tumblr", "reddit.com", "quora.com"];
    if low_quality.iter().any(|h| host.contains(h)) {
        return -2.0;
    }
    if host.ends_with(".gov") {
        6.0
    } else if host.ends_with(".edu") {
        5.0
    } else if host.contains("wikipedia.org") {
        3.0
    } else if host.ends_with(".org") {
        2.0
    } else if host.contains("github.com") {
        2.0
    } else {
        0.0
    }
}

fn question_tokens(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

fn token_overlap_score(tokens: &[String], haystack: &str) -> f64 {
    let haystack = haystack.to_lowercase();
    let matches = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    (matches as f64).min(6.0)
}

fn recency_boost(wants_fresh: bool, snippet: &str, today: NaiveDate) -> f64 {
    if !wants_fresh {
        return 0.0;
    }
    let Some(caps) = PUBLISHED_DATE.captures(snippet) else {
        return 0.0;
    };
    match NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
        Ok(date) => {
            let age_days = (today - date).num_days();
            if age_days <= 2 {
                4.0
            } else if age_days <= 7 {
                3.0
            } else if age_days <= 30 {
                2.0
            } else {
                1.0
            }
        }
        Err(_) => 2.0,
    }
}

pub fn score_candidate(
    source: &EvidenceSource,
    question_tokens_cache: &[String],
    wants_fresh: bool,
    today: NaiveDate,
) -> f64 {
    let host = Url::parse(&source.url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default();

    let haystack = format!("{} {}", source.title, source.snippet);
    domain_trust_score(&host)
        + token_overlap_score(question_tokens_cache, &haystack)
        + recency_boost(wants_fresh, &source.snippet, today)
}

/// Canonicalize, dedupe (keeping the higher-scored variant), and score a
/// batch of raw evidence sources.
pub fn build_candidates(
    sources: Vec<EvidenceSource>,
    question: &str,
    wants_fresh: bool,
    today: NaiveDate,
) -> Vec<SourceCandidate> {
    let tokens = question_tokens(question);
    let mut by_key: std::collections::HashMap<String, SourceCandidate> = std::collections::HashMap::new();

    for source in sources {
        let Some(key) = canonical_key(&source.url) else {
            continue;
        };
        let score = score_candidate(&source, &tokens, wants_fresh, today);
        match by_key.get(&key) {
            Some(existing) if existing.score >= score => {}
            _ => {
                by_key.insert(
                    key.clone(),
                    SourceCandidate {
                        source,
                        score,
                        norm_url: key,
                    },
                );
            }
        }
    }

    by_key.into_values().collect()
}

/// Sort by score descending, cap at `max_sources`, apply a per-host cap,
/// then backfill unused slots ignoring the host cap.
pub fn select_and_diversify(
    mut candidates: Vec<SourceCandidate>,
    max_sources: usize,
    per_host_cap: usize,
) -> Vec<SourceCandidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut host_counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut selected: Vec<SourceCandidate> = Vec::new();
    let mut leftover: Vec<SourceCandidate> = Vec::new();

    for candidate in candidates {
        if selected.len() >= max_sources {
            leftover.push(candidate);
            continue;
        }
        let host = Url::parse(&candidate.source.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        let count = host_counts.entry(host).or_insert(0);
        if *count < per_host_cap {
            *count += 1;
            selected.push(candidate);
        } else {
            leftover.push(candidate);
        }
    }

    for candidate in leftover {
        if selected.len() >= max_sources {
            break;
        }
        selected.push(candidate);
    }

    selected
}

/// Sanity check used in tests: no two entries share a canonical key.
pub fn all_keys_unique(candidates: &[SourceCandidate]) -> bool {
    let mut seen = HashSet::new();
    candidates.iter().all(|c| seen.insert(c.norm_url.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, title: &str, snippet: &str) -> EvidenceSource {
        EvidenceSource {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            extracted_text: None,
        }
    }

    #[test]
    fn canonicalization_is_idempotent_and_scheme_independent() {
        let a = canonical_key("https://a.example/1").unwrap();
        let b = canonical_key("https://www.a.example/1?utm_source=x").unwrap();
        let c = canonical_key("http://a.example/1/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(canonical_key(&format!("https://{a}")), Some(a));
    }

    #[test]
    fn strips_tracking_params_but_keeps_others_sorted() {
        let key = canonical_key("https://example.com/page?b=2&utm_campaign=x&a=1").unwrap();
        assert_eq!(key, "example.com/page?a=1&b=2");
    }

    #[test]
    fn dedup_keeps_higher_scored_variant() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let sources = vec![
            source("https://a.example/1", "A", "short"),
            source("https://www.a.example/1?utm_source=x", "A", "gravity gravity gravity"),
        ];
        let candidates = build_candidates(sources, "gravity", false, today);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn diversify_caps_per_host() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let sources = vec![
            source("https://a.example/1", "A", "gravity"),
            source("https://a.example/2", "A2", "gravity"),
            source("https://a.example/3", "A3", "gravity"),
            source("https://b.example/1", "B", "gravity"),
        ];
        let candidates = build_candidates(sources, "gravity", false, today);
        let selected = select_and_diversify(candidates, 3, 2);
        assert!(all_keys_unique(&selected));
        assert_eq!(selected.len(), 3);
        let a_count = selected
            .iter()
            .filter(|c| c.source.url.contains("a.example"))
            .count();
        // host cap of 2 is respected when enough non-host candidates exist
        // to fill the remaining slot without backfilling past the cap.
        assert_eq!(a_count, 2);
    }
}
