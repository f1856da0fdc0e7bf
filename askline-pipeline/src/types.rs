//! Data model shared by the planner, ranker, excerpt builder, and
//! orchestrator.
//!
//! Validation is hand-rolled rather than derived: `AskRequest` is built from
//! a [`RawAskRequest`] (the wire shape, all-optional) via
//! [`AskRequest::from_raw`], which accumulates up to five issue descriptions
//! before failing, matching the error-taxonomy's `Validation` message shape.

use std::collections::HashMap;

use askline_common::AskError;
use serde::{Deserialize, Serialize};

pub use askline_web::WebSearchResult;

const MAX_QUESTION_CHARS: usize = 2000;
const MAX_MODEL_CHARS: usize = 200;
const MAX_ISSUES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fast,
    Verified,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Verified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Auto,
    En,
    Hi,
}

impl Default for Language {
    fn default() -> Self {
        Language::Auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Style {
    Concise,
    Balanced,
    Detailed,
    Creative,
}

impl Default for Style {
    fn default() -> Self {
        Style::Balanced
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebTopic {
    General,
    News,
    Finance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebTimeRange {
    Day,
    Week,
    Month,
    Year,
    D,
    W,
    M,
    Y,
}

impl WebTimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebTimeRange::Day => "day",
            WebTimeRange::Week => "week",
            WebTimeRange::Month => "month",
            WebTimeRange::Year => "year",
            WebTimeRange::D => "d",
            WebTimeRange::W => "w",
            WebTimeRange::M => "m",
            WebTimeRange::Y => "y",
        }
    }
}

/// Wire shape for `POST /api/ask`: every field optional, not yet validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAskRequest {
    pub question: Option<String>,
    pub model: Option<String>,
    pub mode: Option<Mode>,
    pub language: Option<Language>,
    pub style: Option<Style>,
    #[serde(rename = "useWeb")]
    pub use_web: Option<bool>,
    #[serde(rename = "webTopic")]
    pub web_topic: Option<WebTopic>,
    #[serde(rename = "webTimeRange")]
    pub web_time_range: Option<WebTimeRange>,
}

/// A validated ask request, ready for the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub model: Option<String>,
    pub mode: Mode,
    pub language: Language,
    pub style: Style,
    pub use_web: bool,
    pub web_topic: Option<WebTopic>,
    pub web_time_range: Option<WebTimeRange>,
}

impl AskRequest {
    pub fn from_raw(raw: RawAskRequest) -> Result<Self, AskError> {
        let mut issues = Vec::new();

        let question = raw.question.unwrap_or_default();
        let trimmed = question.trim().to_string();
        if trimmed.is_empty() {
            issues.push("question must not be empty".to_string());
        } else if trimmed.chars().count() > MAX_QUESTION_CHARS {
            issues.push(format!("question must be at most {MAX_QUESTION_CHARS} characters"));
        }

        if let Some(model) = &raw.model {
            if model.chars().count() > MAX_MODEL_CHARS {
                issues.push(format!("model must be at most {MAX_MODEL_CHARS} characters"));
            }
        }

        if !issues.is_empty() {
            issues.truncate(MAX_ISSUES);
            return Err(AskError::Validation(issues.join("; ")));
        }

        Ok(AskRequest {
            question: trimmed,
            model: raw.model,
            mode: raw.mode.unwrap_or_default(),
            language: raw.language.unwrap_or_default(),
            style: raw.style.unwrap_or_default(),
            use_web: raw.use_web.unwrap_or(true),
            web_topic: raw.web_topic,
            web_time_range: raw.web_time_range,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Citation {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub provider: &'static str,
    pub model: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    #[serde(rename = "followUps")]
    pub follow_ups: Vec<String>,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
}

/// Internal representation of a gathered piece of evidence, pre-ranking.
#[derive(Debug, Clone)]
pub struct EvidenceSource {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub extracted_text: Option<String>,
}

/// An [`EvidenceSource`] carrying its rank score and canonical URL key.
#[derive(Debug, Clone)]
pub struct SourceCandidate {
    pub source: EvidenceSource,
    pub score: f64,
    pub norm_url: String,
}

/// A single claim extracted during grounded-fact composition.
#[derive(Debug, Clone, Deserialize)]
pub struct GroundedFact {
    pub fact: String,
    pub citations: Vec<u32>,
}

/// Lightweight per-anonymous-caller usage summary. Never echoed to clients.
#[derive(Debug, Clone)]
pub struct AnonProfile {
    pub anon_id: String,
    pub created_at_ms: u64,
    pub last_seen_at_ms: u64,
    pub ask_count: u64,
    pub last_language: Option<Language>,
    pub last_style: Option<Style>,
    pub topic_counts: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct AskCacheEntry {
    pub value: AskResponse,
    pub expires_at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct HitCounter {
    pub count: u64,
    pub reset_at_ms: u64,
}
