//! Human-readable trace of a ranking, for logs and tool responses.

use std::fmt::Write;

use super::intent::QueryIntent;
use super::profile::TemporalProfile;
use super::scoring::RankedMemory;
use crate::memory::page::truncate_chars;

const EXPLAINED_ENTRIES: usize = 3;
const EXCERPT_CHARS: usize = 50;

/// Describe how `ranked` was produced. Never fails.
pub fn explain_ranking(
    ranked: &[RankedMemory],
    intent: QueryIntent,
    profile: Option<&TemporalProfile>,
) -> String {
    match render(ranked, intent, profile) {
        Ok(text) => text,
        Err(_) => format!("Query processed with intent: {intent}"),
    }
}

fn render(
    ranked: &[RankedMemory],
    intent: QueryIntent,
    profile: Option<&TemporalProfile>,
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Query Intent: {intent}")?;

    if let Some(p) = profile.filter(|_| intent != QueryIntent::SemanticOnly) {
        writeln!(
            out,
            "Temporal Profile: Recent threshold: {:.1}h, Old threshold: {:.1}h",
            p.recent_threshold_hours, p.old_threshold_hours
        )?;
    }

    write!(out, "Top {EXPLAINED_ENTRIES} Rankings:")?;
    for (i, entry) in ranked.iter().take(EXPLAINED_ENTRIES).enumerate() {
        let age = entry
            .age_hours
            .map(|a| format!("{a:.1}h"))
            .unwrap_or_else(|| "unknown".into());
        let temporal = entry
            .temporal_score
            .map(|t| format!("{t:.3}"))
            .unwrap_or_else(|| "n/a".into());
        write!(
            out,
            "\n  {}. Age: {}, Temporal: {}, Semantic: {:.3} - {}",
            i + 1,
            age,
            temporal,
            entry.original_semantic_score,
            truncate_chars(&entry.record.memory, EXCERPT_CHARS)
        )?;
    }
    Ok(out)
}
