//! Bounded page fetcher: SSRF-checked GET with a byte cap and HTML→text
//! extraction.
//!
//! The extraction pass revives the naive tag-stripping idiom that sits dead
//! in the teacher's `extract` module (a raw character-by-character walk
//! rather than a DOM parser), extended with block removal for
//! `<script>/<style>/<noscript>` and a minimal HTML entity table, as the
//! spec requires.

use std::time::Duration;

use askline_common::AskError;
use futures::StreamExt;
use reqwest::Client;

use crate::ssrf::check_url_safe;

/// Fetch `url`'s page text, respecting `timeout_ms` and `max_bytes`.
///
/// The SSRF guard runs first; only the initial URL is validated (the spec
/// treats per-redirect-hop re-validation as a recommendation, not a
/// requirement — `reqwest`'s default redirect policy is left in place).
pub async fn fetch_page_text(url: &str, timeout_ms: u64, max_bytes: usize) -> Result<String, AskError> {
    let checked = check_url_safe(url).await?;

    let client = Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| AskError::UpstreamFetch(e.to_string()))?;

    let resp = client
        .get(checked)
        .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
        .send()
        .await
        .map_err(|e| AskError::UpstreamFetch(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(AskError::UpstreamFetch(format!("status {status}")));
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
        return Err(AskError::UnsupportedMediaType(content_type));
    }

    let mut body = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AskError::UpstreamFetch(e.to_string()))?;
        if body.len() + chunk.len() > max_bytes {
            return Err(AskError::PayloadTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    let html = String::from_utf8_lossy(&body);
    Ok(extract_text(&html))
}

/// Strip `<script>/<style>/<noscript>` blocks, remaining tags, decode a
/// minimal entity set, and collapse whitespace.
pub fn extract_text(html: &str) -> String {
    let stripped_blocks = strip_blocks(html, &["script", "style", "noscript"]);
    let mut out = String::with_capacity(stripped_blocks.len() / 4);
    let mut in_tag = false;
    for ch in stripped_blocks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = decode_entities(&out);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_blocks(html: &str, tags: &[&str]) -> String {
    let mut result = html.to_string();
    for tag in tags {
        let open_needle = format!("<{tag}");
        let close_needle = format!("</{tag}>");
        loop {
            let lower = result.to_ascii_lowercase();
            let Some(open_start) = lower.find(&open_needle) else {
                break;
            };
            let Some(open_end_rel) = lower[open_start..].find('>') else {
                break;
            };
            let open_end = open_start + open_end_rel + 1;
            let Some(close_start_rel) = lower[open_end..].find(&close_needle) else {
                // unterminated block: drop everything from the open tag onward
                result.truncate(open_start);
                break;
            };
            let close_start = open_end + close_start_rel;
            let close_end = close_start + close_needle.len();
            result.replace_range(open_start..close_end, "");
        }
    }
    result
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_blocks() {
        let html = "<html><head><style>body{color:red}</style></head><body><script>alert(1)</script><p>Hello</p></body></html>";
        let text = extract_text(html);
        assert_eq!(text, "Hello");
    }

    #[test]
    fn decodes_minimal_entity_set() {
        let html = "<p>Tom &amp; Jerry say &quot;hi&quot; &lt;3&gt;</p>";
        let text = extract_text(html);
        assert_eq!(text, "Tom & Jerry say \"hi\" <3>");
    }

    #[test]
    fn collapses_whitespace() {
        let html = "<p>a\n\n  b   \t c</p>";
        assert_eq!(extract_text(html), "a b c");
    }

    #[test]
    fn strips_noscript_blocks() {
        let html = "<noscript>fallback content</noscript><p>real</p>";
        assert_eq!(extract_text(html), "real");
    }
}
