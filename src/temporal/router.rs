//! Strategy selection from a classified intent.

use serde::Serialize;

use super::intent::QueryIntent;
use super::scoring::SECONDARY_WEIGHT_FACTOR;
use crate::memory::types::MemoryRecord;

/// Primary intents above this confidence skip semantic search entirely.
pub const TIMESTAMP_DIRECT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_STRATEGY_LIMIT: usize = 5;
pub const PRIMARY_HYBRID_MULTIPLIER: usize = 3;
pub const SECONDARY_HYBRID_MULTIPLIER: usize = 2;

/// A named retrieval plan with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "name", content = "params", rename_all = "snake_case")]
pub enum Strategy {
    /// Rank purely by creation time, newest first.
    TimestampDirect {
        limit: usize,
        time_filter_hours: Option<f64>,
    },
    /// Fuse semantic and recency scores over a widened candidate set.
    SemanticTemporalHybrid {
        semantic_limit_multiplier: usize,
        temporal_weight: f64,
        use_fresh_memory_boost: bool,
    },
    /// Keep the store's semantic ranking.
    SemanticOnly { limit: usize, use_reranking: bool },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TimestampDirect { .. } => "timestamp_direct",
            Self::SemanticTemporalHybrid { .. } => "semantic_temporal_hybrid",
            Self::SemanticOnly { .. } => "semantic_only",
        }
    }

    /// Plan used whenever routing cannot decide.
    pub fn fallback() -> Self {
        Self::SemanticOnly {
            limit: DEFAULT_STRATEGY_LIMIT,
            use_reranking: true,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RoutingError {
    #[error("confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),
}

/// Choose a strategy. Any routing error yields [`Strategy::fallback`].
pub fn route_query(
    query: &str,
    records: &[MemoryRecord],
    intent: QueryIntent,
    confidence: f64,
) -> Strategy {
    match try_route(intent, confidence) {
        Ok(strategy) => {
            tracing::debug!(
                query,
                candidates = records.len(),
                strategy = %strategy,
                "query routed"
            );
            strategy
        }
        Err(e) => {
            tracing::warn!(error = %e, "routing failed, using semantic_only");
            Strategy::fallback()
        }
    }
}

pub fn try_route(intent: QueryIntent, confidence: f64) -> Result<Strategy, RoutingError> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(RoutingError::InvalidConfidence(confidence));
    }

    let strategy = match intent {
        QueryIntent::TemporalPrimary if confidence > TIMESTAMP_DIRECT_THRESHOLD => {
            Strategy::TimestampDirect {
                limit: DEFAULT_STRATEGY_LIMIT,
                time_filter_hours: None,
            }
        }
        QueryIntent::TemporalPrimary => Strategy::SemanticTemporalHybrid {
            semantic_limit_multiplier: PRIMARY_HYBRID_MULTIPLIER,
            temporal_weight: confidence,
            use_fresh_memory_boost: true,
        },
        QueryIntent::TemporalSecondary => Strategy::SemanticTemporalHybrid {
            semantic_limit_multiplier: SECONDARY_HYBRID_MULTIPLIER,
            temporal_weight: confidence * SECONDARY_WEIGHT_FACTOR,
            use_fresh_memory_boost: false,
        },
        QueryIntent::SemanticOnly => Strategy::SemanticOnly {
            limit: DEFAULT_STRATEGY_LIMIT,
            use_reranking: true,
        },
    };
    Ok(strategy)
}
