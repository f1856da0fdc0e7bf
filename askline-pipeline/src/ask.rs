//! Ask Pipeline orchestration: the eleven-step flow from a validated
//! request to a grounded, cited answer.

use std::sync::{Arc, LazyLock};

use askline_common::AskError;
use askline_llm::{catalog::ModelCatalog, ChatMessage, ChatRequest, OpenRouterClient};
use askline_web::search::SearchProvider;
use askline_web::{fetch::fetch_page_text, SearchDepth, SearchOptions, SearchTopic};
use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::excerpt::build_excerpt;
use crate::json_extract::{extract_json_array, extract_json_object};
use crate::planner::{build_queries, topical_core, wants_fresh};
use crate::rank::{build_candidates, select_and_diversify};
use crate::types::{AskRequest, AskResponse, Citation, EvidenceSource, GroundedFact, Language, Mode, Style};

const SEARCH_TIMEOUT_MS: u64 = 10_000;
const FETCH_TIMEOUT_MS: u64 = 10_000;
const FETCH_MAX_BYTES: usize = 1_500_000;
const RAW_EXCERPT_CHUNKS: usize = 3;
const RAW_EXCERPT_CHARS: usize = 1200;
const PAGE_EXCERPT_CHUNKS: usize = 4;
const PAGE_EXCERPT_CHARS: usize = 1800;

static TIME_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)what\s*('s|is)?\s*the\s*time|current time|what time is it|samay kya hai|abhi kitne baje|what.?s the date|today.?s date|aaj (ki )?tareekh")
        .unwrap()
});

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").unwrap());

static HINDI_MARKERS: &[&str] = &[
    "aaj", "kaise", "kya", "hai", "nahi", "kyun", "kahan", "kab", "kaun", "banate", "karo",
    "chahiye", "madad", "abhi", "taaza", "haal",
];

static SAFETY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("self-harm", Regex::new(r"(?i)suicide|kill myself|end my life|self[- ]harm|khud ko maar").unwrap()),
        ("violence", Regex::new(r"(?i)\bbomb\b|explosive|detonat|grenade|mass shooting").unwrap()),
        ("weapons", Regex::new(r"(?i)build a gun|manufacture a (weapon|firearm)|make a firearm|3d print(ed)? gun").unwrap()),
        ("drugs", Regex::new(r"(?i)synthesi[sz]e (meth|drugs)|cook meth|methamphetamine recipe").unwrap()),
        ("hacking", Regex::new(r"(?i)write (a |)(malware|ransomware)|ddos attack|hack into").unwrap()),
        ("csam", Regex::new(r"(?i)child sexual abuse material|\bcsam\b").unwrap()),
    ]
});

fn detect_hindi(question: &str) -> bool {
    let lowered = question.to_lowercase();
    question.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))
        || HINDI_MARKERS.iter().filter(|m| lowered.contains(*m)).count() >= 2
}

fn detect_safety_violation(question: &str) -> Option<&'static str> {
    SAFETY_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(question))
        .map(|(reason, _)| *reason)
}

fn heuristic_follow_ups(question: &str, is_hindi: bool) -> Vec<String> {
    let core = topical_core(question);
    if is_hindi {
        vec![
            format!("{core} ke baare me aur jaankari?"),
            format!("{core} se juda koi aur sawaal?"),
            format!("{core} ka ek udaharan batayen?"),
        ]
    } else {
        vec![
            format!("What else should I know about {core}?"),
            format!("Can you give an example related to {core}?"),
            format!("What are common misconceptions about {core}?"),
        ]
    }
    .into_iter()
    .map(|s| s.chars().take(140).collect())
    .collect()
}

fn sanitize_follow_ups(raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in raw {
        let trimmed = item.trim();
        let stripped = trimmed
            .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_ascii_digit() || c == '.' || c == ')' || c == '"' || c == '\'')
            .trim();
        if stripped.is_empty() {
            continue;
        }
        let key = stripped.to_lowercase();
        if seen.insert(key) {
            out.push(stripped.chars().take(140).collect::<String>());
        }
        if out.len() == 3 {
            break;
        }
    }
    out
}

fn extract_citation_numbers(answer: &str) -> Vec<u32> {
    CITATION_RE
        .captures_iter(answer)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .collect()
}

/// Sanitize raw `[n]` numbers to the in-range, deduped, ascending set.
fn sanitize_citations(numbers: &[u32], n_sources: usize) -> Vec<u32> {
    let mut set: Vec<u32> = numbers
        .iter()
        .copied()
        .filter(|n| *n >= 1 && *n as usize <= n_sources)
        .collect();
    set.sort_unstable();
    set.dedup();
    set
}

/// §4.9.1 "factual block needs citation" heuristic.
fn blocks_missing_citation(answer: &str) -> bool {
    let mut in_fence = false;
    for block in answer.split("\n\n") {
        if block.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || block.trim().is_empty() {
            continue;
        }

        let lines: Vec<&str> = block.lines().collect();
        let bullet_lines: Vec<&&str> = lines
            .iter()
            .filter(|l| {
                let t = l.trim_start();
                t.starts_with('-') || t.starts_with('*') || t.chars().next().is_some_and(|c| c.is_ascii_digit())
            })
            .collect();

        if !bullet_lines.is_empty() {
            for line in bullet_lines {
                if line.trim().len() > 20 && !line.contains('[') {
                    return true;
                }
            }
        } else {
            let prose = block.trim_start_matches('#').trim();
            if prose.chars().count() >= 40 && !block.contains('[') {
                return true;
            }
        }
    }
    false
}

fn build_citations(answer: &str, sources: &[EvidenceSource]) -> Vec<Citation> {
    let numbers = sanitize_citations(&extract_citation_numbers(answer), sources.len());
    numbers
        .into_iter()
        .filter_map(|n| sources.get(n as usize - 1))
        .map(|s| Citation {
            url: s.url.clone(),
            title: Some(s.title.clone()).filter(|t| !t.is_empty()),
        })
        .collect()
}

fn system_prompt(style: Style, mode: Mode, language: Language, today: NaiveDate, sources_count: usize, strict: bool) -> String {
    let style_name = match style {
        Style::Concise => "concise",
        Style::Balanced => "balanced",
        Style::Detailed => "detailed and thorough",
        Style::Creative => "creative but accurate",
    };
    let language_hint = match language {
        Language::En => "Respond in English.",
        Language::Hi => "Respond in Hindi (Roman transliteration is acceptable).",
        Language::Auto => "Respond in the same language as the question.",
    };
    let mut prompt = format!(
        "You are askline, a careful research assistant. Today's UTC date is {today}. \
         Write a {style_name} answer. {language_hint} Never append a trailing \"Sources\" \
         footer or list of links."
    );
    if sources_count > 0 {
        prompt.push_str(&format!(
            " Sources [1]..[{sources_count}] are provided below; cite every factual claim \
             inline using [n], where n is between 1 and {sources_count}. Do not invent numbers \
             outside that range."
        ));
    }
    if strict {
        prompt.push_str(
            " Every sentence stating a fact must carry at least one citation. If the \
             sources do not cover a detail, say so explicitly rather than stating it \
             unsupported.",
        );
    }
    if mode == Mode::Fast {
        prompt.push_str(" Prioritize a quick, direct answer over exhaustive detail.");
    }
    prompt.push_str(
        " Refuse requests for self-harm instructions, weapons or explosives manufacture, \
         drug synthesis, malware/hacking assistance, or sexual content involving minors.",
    );
    prompt
}

fn evidence_block(sources: &[EvidenceSource]) -> String {
    let mut block = String::new();
    for (i, source) in sources.iter().enumerate() {
        let n = i + 1;
        block.push_str(&format!("[{n}] {}\n", source.title));
        block.push_str(&format!("URL: {}\n", source.url));
        if !source.snippet.is_empty() {
            let snippet: String = source.snippet.chars().take(500).collect();
            block.push_str(&format!("Snippet: {snippet}\n"));
        }
        if let Some(extracted) = &source.extracted_text {
            let text: String = extracted.chars().take(2500).collect();
            block.push_str(&format!("Extracted: {text}\n"));
        }
        block.push('\n');
    }
    block
}

#[derive(Clone)]
pub struct PipelineDeps {
    pub llm: Arc<OpenRouterClient>,
    pub catalog: Arc<ModelCatalog>,
    pub search_providers: Vec<Arc<dyn SearchProvider>>,
    pub default_model: Option<String>,
    pub llm_configured: bool,
}

async fn resolve_model(req: &AskRequest, deps: &PipelineDeps) -> Result<String, AskError> {
    if !deps.llm_configured {
        return Err(AskError::Misconfigured("OPENROUTER_API_KEY not set".to_string()));
    }
    if let Some(model) = &req.model {
        if !model.trim().is_empty() {
            return Ok(model.clone());
        }
    }
    if let Some(default_model) = &deps.default_model {
        if !default_model.trim().is_empty() {
            return Ok(default_model.clone());
        }
    }
    let free_models = deps.catalog.list_free_models().await?;
    free_models.into_iter().next().ok_or(AskError::NoModelAvailable)
}

fn search_options_for(req: &AskRequest, fresh: bool, max_results: usize) -> SearchOptions {
    let search_depth = if req.mode == Mode::Verified && fresh {
        SearchDepth::Advanced
    } else if req.mode == Mode::Verified {
        SearchDepth::Basic
    } else {
        SearchDepth::Fast
    };
    SearchOptions {
        max_results,
        timeout_ms: SEARCH_TIMEOUT_MS,
        topic: match req.web_topic {
            Some(crate::types::WebTopic::News) => SearchTopic::News,
            Some(crate::types::WebTopic::Finance) => SearchTopic::Finance,
            _ => SearchTopic::General,
        },
        time_range: req.web_time_range.map(|t| t.as_str().to_string()),
        search_depth,
        include_raw_content: req.mode == Mode::Verified,
    }
}

async fn gather_evidence(req: &AskRequest, deps: &PipelineDeps) -> Vec<EvidenceSource> {
    let fresh = wants_fresh(&req.question);
    let queries = build_queries(&req.question, req.mode);
    let max_results_per_query = if fresh { 6 } else { 4 };
    let opts = search_options_for(req, fresh, max_results_per_query);

    let mut futures = Vec::new();
    for (idx, provider) in deps.search_providers.iter().enumerate() {
        // Provider A (index 0, by construction) is capped at two queries.
        let provider_queries: Vec<&String> = if idx == 0 {
            queries.iter().take(2).collect()
        } else {
            queries.iter().collect()
        };
        for query in provider_queries {
            let provider = provider.clone();
            let query = query.clone();
            let opts = opts.clone();
            futures.push(tokio::spawn(async move { provider.search(&query, &opts).await }));
        }
    }

    let mut raw_results = Vec::new();
    for handle in futures {
        match handle.await {
            Ok(Ok(results)) => raw_results.extend(results),
            Ok(Err(e)) => tracing::warn!(error = %e, "askline.pipeline.search.provider_failed"),
            Err(e) => tracing::warn!(error = %e, "askline.pipeline.search.task_failed"),
        }
    }

    raw_results
        .into_iter()
        .map(|r| {
            let extracted_text = r.raw_content.as_deref().map(|raw| {
                build_excerpt(raw, &req.question, RAW_EXCERPT_CHUNKS, RAW_EXCERPT_CHARS)
            });
            EvidenceSource {
                title: r.title,
                url: r.url,
                snippet: r.snippet,
                extracted_text,
            }
        })
        .collect()
}

fn max_sources_for(fresh: bool) -> (usize, usize) {
    if fresh {
        (8, 1)
    } else {
        (6, 2)
    }
}

fn max_fetch_for(mode: Mode, fresh: bool) -> usize {
    match (mode, fresh) {
        (Mode::Verified, true) => 5,
        (Mode::Verified, false) => 4,
        (Mode::Fast, true) => 4,
        (Mode::Fast, false) => 3,
    }
}

async fn fetch_missing_excerpts(mut sources: Vec<EvidenceSource>, question: &str, max_fetch: usize) -> Vec<EvidenceSource> {
    use futures::stream::{self, StreamExt};

    let to_fetch: Vec<usize> = sources
        .iter()
        .enumerate()
        .filter(|(_, s)| s.extracted_text.is_none())
        .take(max_fetch)
        .map(|(i, _)| i)
        .collect();

    let fetched: Vec<(usize, Option<String>)> = stream::iter(to_fetch)
        .map(|idx| {
            let url = sources[idx].url.clone();
            async move {
                match fetch_page_text(&url, FETCH_TIMEOUT_MS, FETCH_MAX_BYTES).await {
                    Ok(text) => (idx, Some(text)),
                    Err(e) => {
                        tracing::warn!(error = %e, url, "askline.pipeline.fetch.failed");
                        (idx, None)
                    }
                }
            }
        })
        .buffer_unordered(max_fetch)
        .collect()
        .await;

    for (idx, text) in fetched {
        if let Some(text) = text {
            sources[idx].extracted_text = Some(build_excerpt(&text, question, PAGE_EXCERPT_CHUNKS, PAGE_EXCERPT_CHARS));
        }
    }

    sources
}

async fn compose_grounded(
    deps: &PipelineDeps,
    model: &str,
    question: &str,
    block: &str,
    base_prompt: &str,
    sources_count: usize,
) -> Result<String, AskError> {
    let fact_prompt = format!(
        "{base_prompt}\n\nUsing only the sources below, output a JSON array of objects \
         {{\"fact\": string, \"citations\": number[]}} (1-3 citations each, numbers in \
         1..{sources_count}). Output only the JSON array, no prose.\n\n{block}\n\nQuestion: {question}"
    );
    let facts_raw = deps
        .llm
        .chat(ChatRequest {
            model,
            messages: &[ChatMessage::system(fact_prompt), ChatMessage::user(question)],
            timeout_ms: 25_000,
            temperature: Some(0.1),
            max_tokens: Some(520),
        })
        .await?;

    let facts: Vec<GroundedFact> = extract_json_array(&facts_raw)
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default();

    let valid_facts: Vec<GroundedFact> = facts
        .into_iter()
        .filter(|f| !f.fact.trim().is_empty() && !f.citations.is_empty())
        .collect();

    if valid_facts.is_empty() {
        return compose_direct(deps, model, question, Some(block), base_prompt, 0.3, 30_000).await;
    }

    let facts_block = valid_facts
        .iter()
        .map(|f| {
            let cites = f
                .citations
                .iter()
                .filter(|c| **c >= 1 && **c as usize <= sources_count)
                .map(|c| format!("[{c}]"))
                .collect::<Vec<_>>()
                .join("");
            format!("- {} {}", f.fact, cites)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let compose_prompt = format!(
        "{base_prompt}\n\nCompose the final answer using only these grounded facts, keeping \
         their citation numbers intact:\n{facts_block}"
    );

    deps.llm
        .chat(ChatRequest {
            model,
            messages: &[ChatMessage::system(compose_prompt), ChatMessage::user(question)],
            timeout_ms: 30_000,
            temperature: Some(0.2),
            max_tokens: Some(900),
        })
        .await
}

async fn compose_direct(
    deps: &PipelineDeps,
    model: &str,
    question: &str,
    block: Option<&str>,
    base_prompt: &str,
    temperature: f32,
    timeout_ms: u64,
) -> Result<String, AskError> {
    let prompt = match block {
        Some(block) => format!("{base_prompt}\n\n{block}"),
        None => base_prompt.to_string(),
    };
    deps.llm
        .chat(ChatRequest {
            model,
            messages: &[ChatMessage::system(prompt), ChatMessage::user(question)],
            timeout_ms,
            temperature: Some(temperature),
            max_tokens: Some(900),
        })
        .await
}

async fn generate_follow_ups(deps: &PipelineDeps, model: &str, question: &str, answer: &str, is_hindi: bool) -> Vec<String> {
    let prompt = "Given the question and answer, suggest up to 3 short natural follow-up \
                  questions a curious reader might ask next. Output only a JSON array of \
                  strings, each under 140 characters.";
    let user_message = format!("Question: {question}\nAnswer: {answer}");

    let result = deps
        .llm
        .chat(ChatRequest {
            model,
            messages: &[ChatMessage::system(prompt), ChatMessage::user(user_message)],
            timeout_ms: 12_000,
            temperature: Some(0.5),
            max_tokens: Some(140),
        })
        .await;

    let parsed = result.ok().and_then(|raw| {
        extract_json_array(&raw).and_then(|json| serde_json::from_str::<Vec<String>>(&json).ok())
    });

    match parsed.map(sanitize_follow_ups) {
        Some(list) if list.len() == 3 => list,
        Some(mut list) => {
            let mut fallback = heuristic_follow_ups(question, is_hindi);
            while list.len() < 3 {
                if let Some(extra) = fallback.pop() {
                    if !list.iter().any(|l| l.eq_ignore_ascii_case(&extra)) {
                        list.push(extra);
                    }
                } else {
                    break;
                }
            }
            list
        }
        None => heuristic_follow_ups(question, is_hindi),
    }
}

/// Run the full ask pipeline for a validated request.
pub async fn run(req: AskRequest, deps: &PipelineDeps) -> Result<AskResponse, AskError> {
    let start = std::time::Instant::now();
    let is_hindi = detect_hindi(&req.question);

    if TIME_INTENT.is_match(&req.question) {
        let now = Utc::now();
        let answer = if is_hindi {
            format!("Abhi samay {} hai (local time: UTC).", now.format("%I:%M %p"))
        } else {
            format!("The current time is {} (local time: UTC).", now.format("%I:%M %p"))
        };
        return Ok(AskResponse {
            provider: "openrouter",
            model: "local-clock".to_string(),
            answer,
            citations: Vec::new(),
            follow_ups: heuristic_follow_ups(&req.question, is_hindi),
            latency_ms: start.elapsed().as_millis() as u64,
        });
    }

    if let Some(reason) = detect_safety_violation(&req.question) {
        let answer = if is_hindi {
            "Main is request me madad nahi kar sakti. Agar aap khud ko ya kisi aur ko khatre \
             me mehsoos karte hain, kripya sthaniya emergency seva se sampark karein."
                .to_string()
        } else {
            "I can't help with that request. If you or someone else is in danger, please \
             contact local emergency services."
                .to_string()
        };
        return Ok(AskResponse {
            provider: "openrouter",
            model: format!("policy-{reason}"),
            answer,
            citations: Vec::new(),
            follow_ups: heuristic_follow_ups(&req.question, is_hindi),
            latency_ms: start.elapsed().as_millis() as u64,
        });
    }

    let model = resolve_model(&req, deps).await?;

    let mut sources: Vec<EvidenceSource> = Vec::new();
    if req.use_web {
        let fresh = wants_fresh(&req.question);
        let raw = gather_evidence(&req, deps).await;
        let today = Utc::now().date_naive();
        let candidates = build_candidates(raw, &req.question, fresh, today);
        let (max_sources, per_host_cap) = max_sources_for(fresh);
        let selected = select_and_diversify(candidates, max_sources, per_host_cap);
        let ranked: Vec<EvidenceSource> = selected.into_iter().map(|c| c.source).collect();
        let max_fetch = max_fetch_for(req.mode, fresh);
        sources = fetch_missing_excerpts(ranked, &req.question, max_fetch).await;
    }

    let sources_count = sources.len();
    let block = evidence_block(&sources);
    let today = Utc::now().date_naive();
    let base_prompt = system_prompt(req.style, req.mode, req.language, today, sources_count, false);

    let grounded = req.mode == Mode::Verified && sources_count > 0;
    let mut answer = if grounded {
        compose_grounded(deps, &model, &req.question, &block, &base_prompt, sources_count).await?
    } else if sources_count > 0 {
        let temperature = if req.mode == Mode::Fast { 0.7 } else { 0.3 };
        compose_direct(deps, &model, &req.question, Some(&block), &base_prompt, temperature, 30_000).await?
    } else {
        let temperature = if req.mode == Mode::Fast { 0.7 } else { 0.3 };
        compose_direct(deps, &model, &req.question, None, &base_prompt, temperature, 30_000).await?
    };

    if grounded {
        let numbers = extract_citation_numbers(&answer);
        let sanitized = sanitize_citations(&numbers, sources_count);
        let defective = sanitized.is_empty() || sanitized.len() != dedupe_count(&numbers) || blocks_missing_citation(&answer);
        if defective {
            let strict_prompt = system_prompt(req.style, req.mode, req.language, today, sources_count, true);
            answer = compose_direct(deps, &model, &req.question, Some(&block), &strict_prompt, 0.2, 30_000).await?;
        }
    }

    let citations = build_citations(&answer, &sources);
    let follow_ups = generate_follow_ups(deps, &model, &req.question, &answer, is_hindi).await;

    Ok(AskResponse {
        provider: "openrouter",
        model,
        answer,
        citations,
        follow_ups,
        latency_ms: start.elapsed().as_millis() as u64,
    })
}

fn dedupe_count(numbers: &[u32]) -> usize {
    let mut set: Vec<u32> = numbers.to_vec();
    set.sort_unstable();
    set.dedup();
    set.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_hindi_from_roman_markers() {
        assert!(detect_hindi("aaj bomb kaise banate hai"));
        assert!(!detect_hindi("what time is it"));
    }

    #[test]
    fn detects_safety_categories() {
        assert_eq!(detect_safety_violation("aaj bomb kaise banate hai"), Some("violence"));
        assert_eq!(detect_safety_violation("how do I synthesize meth at home"), Some("drugs"));
        assert_eq!(detect_safety_violation("explain gravity"), None);
    }

    #[test]
    fn time_intent_matches_clock_questions() {
        assert!(TIME_INTENT.is_match("What time is it?"));
        assert!(TIME_INTENT.is_match("samay kya hai"));
        assert!(!TIME_INTENT.is_match("explain gravity"));
    }

    #[test]
    fn citation_sanitization_drops_out_of_range_and_dedupes() {
        let numbers = extract_citation_numbers("claim [1] and [3] and [1] again, also [99]");
        assert_eq!(sanitize_citations(&numbers, 3), vec![1, 3]);
    }

    #[test]
    fn block_heuristic_flags_uncited_prose() {
        let uncited = "This is a reasonably long factual paragraph without any citation marks at all.";
        assert!(blocks_missing_citation(uncited));
        let cited = "This is a reasonably long factual paragraph with a citation mark [1] present.";
        assert!(!blocks_missing_citation(cited));
    }

    #[test]
    fn follow_up_sanitization_dedupes_and_strips_prefixes() {
        let raw = vec![
            "- What about X?".to_string(),
            "1. What about X?".to_string(),
            "What about Y?".to_string(),
        ];
        let sanitized = sanitize_follow_ups(raw);
        assert_eq!(sanitized.len(), 2);
    }
}
