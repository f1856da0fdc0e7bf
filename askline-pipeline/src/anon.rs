//! Anonymous profile tracking.
//!
//! Same lock-a-map idiom as [`crate::ratelimit`] and [`crate::cache`],
//! applied here to a lightweight per-anon-ID usage summary that is never
//! echoed back to the client.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::Mutex;

use crate::types::{AnonProfile, Language, Style};

const MAX_PROFILES: usize = 5000;
const MAX_AGE_MS: u64 = 30 * 24 * 60 * 60 * 1000;

static TOPIC_BUCKETS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("finance", Regex::new(r"(?i)stock|market|price|nifty|sensex|crypto|forex|inflation").unwrap()),
        ("news", Regex::new(r"(?i)news|latest|update|breaking|trending").unwrap()),
        ("science", Regex::new(r"(?i)physics|biology|chemistry|gravity|quantum|space").unwrap()),
        ("technology", Regex::new(r"(?i)software|computer|ai|programming|rust|code").unwrap()),
        ("health", Regex::new(r"(?i)health|disease|medicine|doctor|symptom").unwrap()),
    ]
});

/// `[A-Za-z0-9._:-]{1,200}`, per the anon-ID validation rule.
pub fn is_valid_anon_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 200
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-'))
}

fn classify_topic(question: &str) -> &'static str {
    TOPIC_BUCKETS
        .iter()
        .find(|(_, re)| re.is_match(question))
        .map(|(name, _)| *name)
        .unwrap_or("general")
}

pub struct AnonProfileStore {
    profiles: Mutex<HashMap<String, AnonProfile>>,
}

impl Default for AnonProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnonProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
        }
    }

    pub async fn record(
        &self,
        anon_id: &str,
        question: &str,
        language: Language,
        style: Style,
        now_ms: u64,
    ) {
        let topic = classify_topic(question);
        let mut profiles = self.profiles.lock().await;

        let profile = profiles.entry(anon_id.to_string()).or_insert_with(|| AnonProfile {
            anon_id: anon_id.to_string(),
            created_at_ms: now_ms,
            last_seen_at_ms: now_ms,
            ask_count: 0,
            last_language: None,
            last_style: None,
            topic_counts: HashMap::new(),
        });

        profile.ask_count += 1;
        profile.last_seen_at_ms = now_ms;
        profile.last_language = Some(language);
        profile.last_style = Some(style);
        *profile.topic_counts.entry(topic.to_string()).or_insert(0) += 1;

        self.evict_locked(&mut profiles, now_ms);
    }

    fn evict_locked(&self, profiles: &mut HashMap<String, AnonProfile>, now_ms: u64) {
        profiles.retain(|_, profile| now_ms.saturating_sub(profile.last_seen_at_ms) <= MAX_AGE_MS);

        if profiles.len() > MAX_PROFILES {
            let overflow = profiles.len() - MAX_PROFILES;
            let mut by_last_seen: Vec<(String, u64)> = profiles
                .iter()
                .map(|(k, v)| (k.clone(), v.last_seen_at_ms))
                .collect();
            by_last_seen.sort_by_key(|(_, last_seen)| *last_seen);
            for (key, _) in by_last_seen.into_iter().take(overflow) {
                profiles.remove(&key);
            }
        }
    }

    #[cfg(test)]
    async fn get(&self, anon_id: &str) -> Option<AnonProfile> {
        self.profiles.lock().await.get(anon_id).cloned()
    }
}
