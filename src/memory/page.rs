//! URL and page-title extraction from memory text.

use regex::Regex;
use std::sync::LazyLock;

/// First `http://` or `https://` run up to whitespace.
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid URL regex"));

/// Page fields recovered from a record, by whichever route was available.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageInfo {
    pub title: String,
    pub url: Option<String>,
    pub synopsis: Option<String>,
    pub domain: Option<String>,
}

/// Return the first URL that appears in `text`.
pub fn find_url(text: &str) -> Option<&str> {
    if !text.contains("http") {
        return None;
    }
    URL_PATTERN.find(text).map(|m| m.as_str())
}

/// Lowercased host of `url` with a leading `www.` removed.
///
/// Returns `None` for strings that do not parse as absolute URLs with a host.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    let domain = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    };
    Some(domain)
}

/// Domain for chunk bookkeeping, `"unknown"` when the URL has no host.
pub fn source_id_for(url: &str) -> String {
    extract_domain(url).unwrap_or_else(|| "unknown".into())
}

/// Recover page fields from free text.
///
/// Reads `Visited:` / `URL:` / `Summary:` lines first, then falls back to the
/// first URL in the text and a 100-character title excerpt.
pub fn infer_page_info(text: &str) -> PageInfo {
    let mut info = PageInfo::default();
    let mut title = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Visited:") {
            title = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("URL:") {
            info.url = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Summary:") {
            info.synopsis = Some(rest.trim().to_string());
        }
    }

    if info.url.is_none() {
        info.url = find_url(text).map(str::to_string);
    }

    info.title = match title {
        Some(t) if !t.is_empty() => t,
        _ if text.chars().count() > 10 => truncate_chars(text, 100),
        _ => "Untitled".into(),
    };
    info.domain = info.url.as_deref().and_then(extract_domain);
    info
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
