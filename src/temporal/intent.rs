//! Query intent classification along the temporal-vs-semantic axis.
//!
//! Three independent signals are combined into one confidence value:
//!
//! | Signal | Weight | Source |
//! |--------|--------|--------|
//! | Semantic pattern | 0.4 | max cosine similarity to [`TEMPORAL_TEMPLATES`] |
//! | Temporal benefit | 0.3 | share of fresh records and spread of ages |
//! | Linguistic | 0.3 | keyword families in the query text |
//!
//! Each signal returns a `Result`; failures contribute 0.0.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::profile::{collect_ages, population_variance};
use crate::embedding::{cosine_similarity, EmbeddingError, EmbeddingProvider};
use crate::memory::types::MemoryRecord;

pub const SEMANTIC_PATTERN_WEIGHT: f64 = 0.4;
pub const TEMPORAL_BENEFIT_WEIGHT: f64 = 0.3;
pub const LINGUISTIC_WEIGHT: f64 = 0.3;

/// Confidence at or above which time dominates relevance.
pub const PRIMARY_THRESHOLD: f64 = 0.7;
/// Confidence at or above which time contributes to relevance.
pub const SECONDARY_THRESHOLD: f64 = 0.3;

/// Records younger than this count toward the recent factor.
pub const RECENT_AGE_HOURS: f64 = 24.0;
pub const RECENT_FACTOR_WEIGHT: f64 = 0.6;
pub const VARIANCE_FACTOR_WEIGHT: f64 = 0.4;
/// Age variance (hours²) that saturates the variance factor.
pub const VARIANCE_SATURATION: f64 = 1000.0;

pub const SHORT_QUERY_BONUS: f64 = 0.2;
pub const SHORT_QUERY_MAX_TOKENS: usize = 6;

/// Canonical phrasings of time-oriented requests.
pub const TEMPORAL_TEMPLATES: [&str; 6] = [
    "show me the most recent information",
    "what was the latest thing I accessed",
    "find my recent activity",
    "chronological order of my browsing",
    "time-based search results",
    "newest entries in my history",
];

const PATTERN_FAMILIES: [&[&str]; 5] = [
    &["when", "what time", "how long ago"],
    &["most", "latest", "newest", "oldest", "first", "last"],
    &["order", "sequence", "chronological", "timeline"],
    &["recent", "new", "fresh"],
    &["before", "after", "since"],
];

const INTERROGATIVE_PREFIXES: [&str; 3] = ["what was", "show me", "find my"];


/// How much weight time should carry for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    TemporalPrimary,
    TemporalSecondary,
    SemanticOnly,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemporalPrimary => "temporal_primary",
            Self::TemporalSecondary => "temporal_secondary",
            Self::SemanticOnly => "semantic_only",
        }
    }

    /// Map a confidence to an intent. Lower bounds are inclusive.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= PRIMARY_THRESHOLD {
            Self::TemporalPrimary
        } else if confidence >= SECONDARY_THRESHOLD {
            Self::TemporalSecondary
        } else {
            Self::SemanticOnly
        }
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a signal could not be computed.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("no parseable timestamps in collection")]
    NoTimestamps,
    #[error("signal evaluated to a non-finite value")]
    NonFinite,
}

/// The three sub-scores behind one classification, each already degraded to 0.0 on failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntentSignals {
    pub semantic_pattern: f64,
    pub temporal_benefit: f64,
    pub linguistic: f64,
}

impl IntentSignals {
    pub fn confidence(&self) -> f64 {
        let combined = SEMANTIC_PATTERN_WEIGHT * self.semantic_pattern
            + TEMPORAL_BENEFIT_WEIGHT * self.temporal_benefit
            + LINGUISTIC_WEIGHT * self.linguistic;
        if combined.is_finite() {
            combined.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Classifies queries. Query and template embeddings go through the injected
/// provider, so a [`CachedEmbeddingProvider`](crate::embedding::cache::CachedEmbeddingProvider)
/// there is the only cache they land in.
pub struct IntentClassifier {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IntentClassifier {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    /// Classify `query` against `records` as seen at `now`. Never fails.
    pub fn analyze(
        &self,
        query: &str,
        records: &[MemoryRecord],
        now: DateTime<Utc>,
    ) -> (QueryIntent, f64) {
        let signals = self.signals(query, records, now);
        let confidence = signals.confidence();
        let intent = QueryIntent::from_confidence(confidence);
        tracing::debug!(
            semantic = signals.semantic_pattern,
            benefit = signals.temporal_benefit,
            linguistic = signals.linguistic,
            confidence,
            intent = %intent,
            "intent analyzed"
        );
        (intent, confidence)
    }

    pub fn signals(
        &self,
        query: &str,
        records: &[MemoryRecord],
        now: DateTime<Utc>,
    ) -> IntentSignals {
        IntentSignals {
            semantic_pattern: degrade("semantic_pattern", self.semantic_pattern_score(query)),
            temporal_benefit: degrade("temporal_benefit", temporal_benefit_score(records, now)),
            linguistic: linguistic_score(query),
        }
    }

    /// Highest cosine similarity between the query and any temporal template, floored at 0.
    pub fn semantic_pattern_score(&self, query: &str) -> Result<f64, SignalError> {
        let query_embedding = self.embedder.embed(query)?;
        let mut best = 0.0f64;
        for template in TEMPORAL_TEMPLATES {
            let template_embedding = self.embedder.embed(template)?;
            let similarity = cosine_similarity(&query_embedding, &template_embedding);
            if similarity > best {
                best = similarity;
            }
        }
        finite(best.min(1.0))
    }

}

/// Estimate how much a time-aware ranking would help for this collection.
pub fn temporal_benefit_score(
    records: &[MemoryRecord],
    now: DateTime<Utc>,
) -> Result<f64, SignalError> {
    let ages = collect_ages(records, now);
    if ages.is_empty() {
        return Err(SignalError::NoTimestamps);
    }

    let n = ages.len() as f64;
    let recent_factor = ages.iter().filter(|&&a| a < RECENT_AGE_HOURS).count() as f64 / n;
    let mean = ages.iter().sum::<f64>() / n;
    let variance_factor = (population_variance(&ages, mean) / VARIANCE_SATURATION).min(1.0);

    finite(RECENT_FACTOR_WEIGHT * recent_factor + VARIANCE_FACTOR_WEIGHT * variance_factor)
}

/// Fraction of keyword families present in the query, plus a short-question bonus.
pub fn linguistic_score(query: &str) -> f64 {
    let query = query.trim().to_lowercase();
    let matched = PATTERN_FAMILIES
        .iter()
        .filter(|family| family.iter().any(|word| query.contains(word)))
        .count();
    let mut score = (matched as f64 / PATTERN_FAMILIES.len() as f64).min(1.0);

    let short = query.split_whitespace().count() <= SHORT_QUERY_MAX_TOKENS;
    if short && INTERROGATIVE_PREFIXES.iter().any(|p| query.starts_with(p)) {
        score += SHORT_QUERY_BONUS;
    }
    score.clamp(0.0, 1.0)
}

fn finite(value: f64) -> Result<f64, SignalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SignalError::NonFinite)
    }
}

fn degrade(signal: &'static str, result: Result<f64, SignalError>) -> f64 {
    result.unwrap_or_else(|e| {
        tracing::debug!(signal, error = %e, "signal unavailable, contributing 0.0");
        0.0
    })
}
