//! Page text → quality-filtered, context-enhanced chunks.
//!
//! [`smart_chunk`] runs the whole pipeline: skip low-value pages, normalize
//! whitespace, split recursively on paragraph, line, sentence and word
//! boundaries, drop junk chunks, then prefix each survivor with the page title
//! and site so the embedding knows where it came from.

use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use super::types::{ContentType, PageChunk};
use crate::config::ContentConfig;
use crate::memory::page::source_id_for;

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid blank-line regex"));
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +").expect("valid space regex"));
static RULE_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"={3,}|-{3,}").expect("valid rule regex"));
static GLUED_SENTENCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])([A-Z])").expect("valid sentence regex"));

/// Separators tried in order by the splitter; `""` splits between characters.
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

const MIN_PAGE_CHARS: usize = 200;
const GENERIC_PHRASES: &[&str] = &[
    "is a website",
    "is a social",
    "users can",
    "social news website",
    "please enable javascript",
    "404 not found",
    "page not found",
    "cookies are disabled",
    "sorry, this page",
    "under construction",
];
const UI_WORDS: &[&str] = &["click here", "menu", "navigation", "sidebar", "footer", "header"];

/// Window (in characters) checked for an existing mention before adding context.
const CONTEXT_PROBE_CHARS: usize = 200;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// `true` for pages too short, too generic or too navigational to index.
pub fn should_skip_content(content: &str) -> bool {
    let length = char_len(content.trim());
    if length < MIN_PAGE_CHARS {
        return true;
    }

    let lower = content.to_lowercase();
    let generic = GENERIC_PHRASES.iter().filter(|p| lower.contains(*p)).count();
    if length < 1000 && generic >= 2 {
        return true;
    }

    let ui = UI_WORDS.iter().filter(|w| lower.contains(*w)).count();
    length < 1500 && ui >= 3
}

/// Normalize whitespace and section rules before splitting.
pub fn preprocess(content: &str) -> String {
    let text = BLANK_LINES.replace_all(content, "\n\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = RULE_LINES.replace_all(&text, "\n\n");
    let text = GLUED_SENTENCES.replace_all(&text, "$1 $2");
    text.trim().to_string()
}

/// Recursive character splitter with overlap, counting characters.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (sep, finer) = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .map(|i| (separators[i], &separators[i + 1..]))
            .unwrap_or(("", &[]));

        let pieces: Vec<&str> = if sep.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(sep).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending, sep));
                pending.clear();
            }
            if finer.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_with(piece, finer));
            }
        }
        if !pending.is_empty() {
            out.extend(self.merge(&pending, sep));
        }
        out
    }

    /// Greedily join pieces up to `chunk_size`, carrying up to `chunk_overlap`
    /// characters of trailing pieces into the next chunk.
    fn merge(&self, pieces: &[&str], sep: &str) -> Vec<String> {
        let sep_len = char_len(sep);
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut docs, &window, sep);
                while total > self.chunk_overlap
                    || (total > 0 && total + len + sep_len > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let dropped = char_len(first) + if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(dropped);
                }
            }

            let joiner = if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut docs, &window, sep);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<&str>, sep: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(sep);
    let joined = joined.trim();
    if !joined.is_empty() {
        docs.push(joined.to_string());
    }
}

/// Reject chunks that are short, symbol-heavy or repetitive.
pub fn is_quality_chunk(chunk: &str) -> bool {
    let chunk = chunk.trim();
    let length = char_len(chunk);
    if length < 50 {
        return false;
    }

    let words: Vec<&str> = chunk.split_whitespace().collect();
    if words.len() < 8 {
        return false;
    }

    let alpha = chunk.chars().filter(|c| c.is_alphabetic()).count();
    if (alpha as f64) / (length as f64) < 0.5 {
        return false;
    }

    let unique: HashSet<&str> = words.iter().copied().collect();
    !(words.len() > 20 && (unique.len() as f64) / (words.len() as f64) < 0.3)
}

/// Prefix `chunk` with `Source: {title} | Website: {domain}` parts it does not already mention.
pub fn enhance_chunk_with_context(chunk: &str, title: &str, url: &str) -> String {
    let domain = source_id_for(url);
    let lower = chunk.to_lowercase();

    let mut parts = Vec::new();
    if char_len(title) > 5 && !lower.contains(&title.to_lowercase()) {
        parts.push(format!("Source: {title}"));
    }
    if domain != "unknown" && !lower.contains(&domain) {
        parts.push(format!("Website: {domain}"));
    }

    if parts.is_empty() {
        chunk.to_string()
    } else {
        format!("{}\n\n{chunk}", parts.join(" | "))
    }
}

/// Metadata folded into the text that gets embedded.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingContext<'a> {
    pub title: Option<&'a str>,
    pub content_type: Option<ContentType>,
    pub source_id: Option<&'a str>,
}

/// Prepend document title, content type and source domain when the text's
/// opening does not already mention them.
pub fn enhance_text_for_embedding(text: &str, ctx: &EmbeddingContext<'_>) -> String {
    let opening: String = text.chars().take(CONTEXT_PROBE_CHARS).collect::<String>().to_lowercase();

    let mut parts = Vec::new();
    if let Some(title) = ctx.title.filter(|t| !t.is_empty()) {
        if !opening.contains(&title.to_lowercase()) {
            parts.push(format!("Document title: {title}"));
        }
    }
    if let Some(kind) = ctx.content_type.filter(|k| *k != ContentType::General) {
        parts.push(format!("Content type: {kind}"));
    }
    if let Some(domain) = ctx.source_id.filter(|d| *d != "unknown") {
        if !opening.contains(domain) {
            parts.push(format!("Source domain: {domain}"));
        }
    }

    if parts.is_empty() {
        text.to_string()
    } else {
        format!("{}\n\n{text}", parts.join(" | "))
    }
}

pub fn classify_content_type(chunk: &str) -> ContentType {
    let lower = chunk.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if any(&["price", "$", "cost", "buy", "purchase"]) {
        ContentType::Commerce
    } else if any(&["how to", "step", "tutorial", "guide"]) {
        ContentType::Instructional
    } else if any(&["news", "today", "yesterday", "breaking"]) {
        ContentType::News
    } else if any(&["about us", "contact", "company", "team"]) {
        ContentType::Organizational
    } else {
        ContentType::General
    }
}

/// Heuristic quality in `[0, 1]` from length, sentence count and word variety.
pub fn chunk_quality(chunk: &str) -> f64 {
    let mut score = 0.5;

    let length = char_len(chunk);
    if (200..=2000).contains(&length) {
        score += 0.2;
    } else if length < 100 {
        score -= 0.3;
    }

    let sentences = chunk.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    if sentences >= 2 {
        score += 0.15;
    }

    let words: Vec<&str> = chunk.split_whitespace().collect();
    if words.len() > 10 {
        let unique: HashSet<&str> = words.iter().copied().collect();
        score += (unique.len() as f64 / words.len() as f64) * 0.15;
    }

    score.clamp(0.0, 1.0)
}

/// Full pipeline for one page. Returns no chunks for skipped pages.
pub fn smart_chunk(content: &str, title: &str, url: &str, config: &ContentConfig) -> Vec<PageChunk> {
    if config.content_filtering && should_skip_content(content) {
        tracing::debug!(url, "page skipped as low-value");
        return Vec::new();
    }

    let splitter = RecursiveSplitter::new(config.chunk_size, config.chunk_overlap);
    let pieces = splitter.split_text(&preprocess(content));
    let total_chunks = pieces.len();
    let source_id = source_id_for(url);

    pieces
        .iter()
        .enumerate()
        .filter(|(_, piece)| !config.content_filtering || is_quality_chunk(piece))
        .map(|(i, piece)| {
            let enhanced = enhance_chunk_with_context(piece, title, url);
            PageChunk {
                url: url.to_string(),
                title: title.to_string(),
                chunk_number: i + 1,
                word_count: enhanced.split_whitespace().count(),
                content: enhanced,
                original_content: piece.trim().to_string(),
                source_id: source_id.clone(),
                content_type: classify_content_type(piece),
                quality_score: chunk_quality(piece),
                chunk_index: i,
                total_chunks,
            }
        })
        .collect()
}
