//! Excerpt building: relevance-weighted window selection from long page
//! text.

const WINDOW_CHARS: usize = 520;
const STRIDE_CHARS: usize = 320;
const MIN_PICK_DISTANCE: usize = 220;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "with", "that", "this", "from", "have", "has",
    "what", "who", "where", "when", "why", "how", "does", "did", "you", "your", "about",
];

fn question_tokens(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

struct Window {
    start: usize,
    text: String,
    score: usize,
}

fn windows(text: &str) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + WINDOW_CHARS).min(chars.len());
        result.push((start, chars[start..end].iter().collect::<String>()));
        if end == chars.len() {
            break;
        }
        start += STRIDE_CHARS;
    }
    result
}

fn score_window(window: &str, tokens: &[String]) -> usize {
    let lowered = window.to_lowercase();
    tokens.iter().filter(|t| lowered.contains(t.as_str())).count()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Build an excerpt from `text` relevant to `question`, selecting at most
/// `max_chunks` windows with a minimum start-index distance between picks,
/// joined in original order and capped at `max_total_chars`.
pub fn build_excerpt(text: &str, question: &str, max_chunks: usize, max_total_chars: usize) -> String {
    let tokens = question_tokens(question);
    let mut candidates: Vec<Window> = windows(text)
        .into_iter()
        .map(|(start, chunk)| {
            let score = score_window(&chunk, &tokens);
            Window { start, text: chunk, score }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.start.cmp(&b.start)));

    let mut picked: Vec<&Window> = Vec::new();
    for candidate in &candidates {
        if candidate.score == 0 {
            break;
        }
        if picked.len() >= max_chunks {
            break;
        }
        let far_enough = picked
            .iter()
            .all(|p| p.start.abs_diff(candidate.start) >= MIN_PICK_DISTANCE);
        if far_enough {
            picked.push(candidate);
        }
    }

    if picked.is_empty() {
        return truncate_chars(text, max_total_chars);
    }

    picked.sort_by_key(|w| w.start);
    let joined = picked
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(&joined, max_total_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_truncated_text_when_nothing_scores() {
        let text = "x".repeat(1000);
        let excerpt = build_excerpt(&text, "gravity force", 3, 100);
        assert_eq!(excerpt.chars().count(), 100);
    }

    #[test]
    fn picks_relevant_window() {
        let mut text = "irrelevant filler ".repeat(50);
        text.push_str("gravity is a fundamental force of nature that pulls objects together across the universe. ");
        text.push_str(&"more filler text here ".repeat(50));
        let excerpt = build_excerpt(&text, "what is gravity force", 2, 2000);
        assert!(excerpt.contains("gravity is a fundamental force"));
    }

    #[test]
    fn respects_max_total_chars() {
        let mut text = String::new();
        for _ in 0..5 {
            text.push_str("gravity force nature ");
            text.push_str(&"padding ".repeat(100));
        }
        let excerpt = build_excerpt(&text, "gravity force", 3, 50);
        assert!(excerpt.chars().count() <= 50);
    }
}
