//! Temporal intelligence: decides how much recency should count for a query.
//!
//! The pipeline for one query is:
//!
//! 1. [`intent::IntentClassifier`] turns the query and the candidate records into a
//!    [`QueryIntent`] with a confidence in `[0, 1]`.
//! 2. [`router::route_query`] maps that to a [`Strategy`].
//! 3. The strategy runs as pure timestamp ordering ([`timeline`]), fused
//!    semantic+recency scoring ([`scoring`], parameterized by a [`profile`]),
//!    or a semantic pass-through.
//! 4. [`explain::explain_ranking`] renders a trace of the result.
//!
//! Every operation here is total: malformed timestamps, failed embeddings and
//! bad confidences degrade to defaults instead of surfacing errors.

pub mod explain;
pub mod intent;
pub mod profile;
pub mod router;
pub mod scoring;
pub mod timeline;
pub mod timestamp;

use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use intent::{IntentClassifier, QueryIntent};
pub use profile::TemporalProfile;
pub use router::Strategy;
pub use scoring::RankedMemory;

use crate::embedding::EmbeddingProvider;
use crate::memory::types::MemoryRecord;

/// Facade over the temporal pipeline. The embedder it is given should be the shared cached one.
pub struct TemporalIntelligence {
    classifier: IntentClassifier,
}

impl TemporalIntelligence {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            classifier: IntentClassifier::new(embedder),
        }
    }

    pub fn analyze_intent(
        &self,
        query: &str,
        records: &[MemoryRecord],
        now: DateTime<Utc>,
    ) -> (QueryIntent, f64) {
        self.classifier.analyze(query, records, now)
    }

    pub fn route(
        &self,
        query: &str,
        records: &[MemoryRecord],
        intent: QueryIntent,
        confidence: f64,
    ) -> Strategy {
        router::route_query(query, records, intent, confidence)
    }

    /// Profile `records` and rank them for the intent. Returns the profile used.
    pub fn score(
        &self,
        records: Vec<MemoryRecord>,
        intent: QueryIntent,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> (Vec<RankedMemory>, TemporalProfile) {
        let profile = profile::build_profile(&records, now);
        let ranked = scoring::score_memories(records, intent, confidence, &profile, now);
        (ranked, profile)
    }

    pub fn by_timestamp(
        &self,
        records: Vec<MemoryRecord>,
        limit: usize,
        time_filter_hours: Option<f64>,
        now: DateTime<Utc>,
    ) -> Vec<RankedMemory> {
        timeline::memories_by_timestamp(records, limit, time_filter_hours, now)
    }

    pub fn explain(
        &self,
        ranked: &[RankedMemory],
        intent: QueryIntent,
        profile: Option<&TemporalProfile>,
    ) -> String {
        explain::explain_ranking(ranked, intent, profile)
    }
}
