//! Recency scoring and semantic/temporal fusion.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::intent::QueryIntent;
use super::profile::{AgeBucket, TemporalProfile};
use super::timestamp::age_hours;
use crate::memory::types::MemoryRecord;

pub const RECENT_BOOST: f64 = 1.2;
pub const MEDIUM_BOOST: f64 = 1.0;
pub const OLD_PENALTY: f64 = 0.8;
/// Share of the confidence used as temporal weight for secondary intents.
pub const SECONDARY_WEIGHT_FACTOR: f64 = 0.5;

/// A record decorated for one ranking pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMemory {
    pub record: MemoryRecord,
    /// Score the strategy ranked by.
    pub final_score: f64,
    /// Recency component, when one was computed.
    pub temporal_score: Option<f64>,
    pub original_semantic_score: f64,
    pub age_hours: Option<f64>,
}

impl RankedMemory {
    /// Wrap a record without any temporal decoration.
    pub fn passthrough(record: MemoryRecord) -> Self {
        let semantic = record.score.unwrap_or(0.0);
        Self {
            record,
            final_score: semantic,
            temporal_score: None,
            original_semantic_score: semantic,
            age_hours: None,
        }
    }
}

/// Recency score of an age under `profile`.
///
/// Decays per day at `1 / (std + 1)`, so collections with a wide age spread
/// decay more slowly. The bucket multiplier can lift the result above 1.0.
pub fn recency_score(age_hours: f64, profile: &TemporalProfile) -> f64 {
    let decay_rate = 1.0 / (profile.std_age_hours + 1.0);
    let base = (-decay_rate * age_hours / 24.0).exp();
    let multiplier = match profile.bucket(age_hours) {
        AgeBucket::Recent => RECENT_BOOST,
        AgeBucket::Medium => MEDIUM_BOOST,
        AgeBucket::Old => OLD_PENALTY,
    };
    base * multiplier
}

/// Blend a semantic and a temporal score according to the intent.
pub fn fuse(semantic: f64, temporal: f64, intent: QueryIntent, confidence: f64) -> f64 {
    match intent {
        QueryIntent::TemporalPrimary => temporal * confidence + semantic * (1.0 - confidence),
        QueryIntent::TemporalSecondary => {
            let weight = confidence * SECONDARY_WEIGHT_FACTOR;
            semantic * (1.0 - weight) + temporal * weight
        }
        QueryIntent::SemanticOnly => semantic,
    }
}

/// Score and rank `records` for a classified query.
///
/// Semantic-only intents pass records through in their given order. Otherwise
/// each record is fused with its recency score and the list is stably sorted
/// descending; records without a parseable timestamp keep their semantic score.
pub fn score_memories(
    records: Vec<MemoryRecord>,
    intent: QueryIntent,
    confidence: f64,
    profile: &TemporalProfile,
    now: DateTime<Utc>,
) -> Vec<RankedMemory> {
    if intent == QueryIntent::SemanticOnly {
        return records.into_iter().map(RankedMemory::passthrough).collect();
    }

    let mut ranked: Vec<RankedMemory> = records
        .into_iter()
        .map(|record| {
            let semantic = record.score.unwrap_or(0.0);
            let age = age_hours(&record, now);
            let temporal = age.map(|a| recency_score(a, profile));
            let final_score = match temporal {
                Some(t) => fuse(semantic, t, intent, confidence),
                None => semantic,
            };
            RankedMemory {
                record,
                final_score,
                temporal_score: temporal,
                original_semantic_score: semantic,
                age_hours: age,
            }
        })
        .collect();

    sort_descending(&mut ranked);
    ranked
}

/// Stable descending sort by `final_score`.
pub fn sort_descending(ranked: &mut [RankedMemory]) {
    ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::profile::profile_from_ages;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn aged(id: &str, hours: i64, score: f64) -> MemoryRecord {
        let ts = now() - Duration::hours(hours);
        MemoryRecord::new(id, format!("memory {id}"))
            .with_created_at(ts.to_rfc3339().as_str())
            .with_score(score)
    }

    #[test]
    fn recency_applies_bucket_multipliers() {
        let profile = TemporalProfile::default(); // std 12, thresholds 1h / 168h
        let decay: f64 = 1.0 / 13.0;
        assert!((recency_score(0.5, &profile) - 1.2 * (-decay * 0.5 / 24.0).exp()).abs() < 1e-12);
        assert!((recency_score(48.0, &profile) - (-decay * 2.0).exp()).abs() < 1e-12);
        assert!((recency_score(200.0, &profile) - 0.8 * (-decay * 200.0 / 24.0).exp()).abs() < 1e-12);
    }

    #[test]
    fn recent_boost_can_exceed_one() {
        assert!(recency_score(0.0, &TemporalProfile::default()) > 1.0);
    }

    #[test]
    fn fuse_by_intent() {
        assert!((fuse(0.2, 1.0, QueryIntent::TemporalPrimary, 0.75) - 0.8).abs() < 1e-12);
        // weight = 0.25
        assert!((fuse(0.2, 1.0, QueryIntent::TemporalSecondary, 0.5) - 0.4).abs() < 1e-12);
        assert_eq!(fuse(0.2, 1.0, QueryIntent::SemanticOnly, 0.9), 0.2);
    }

    #[test]
    fn semantic_only_preserves_order() {
        let records = vec![aged("a", 500, 0.9), aged("b", 1, 0.5), aged("c", 2, 0.7)];
        let ranked = score_memories(
            records,
            QueryIntent::SemanticOnly,
            0.1,
            &TemporalProfile::default(),
            now(),
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(ranked.iter().all(|r| r.final_score == r.original_semantic_score));
    }

    #[test]
    fn primary_intent_lifts_recent_records() {
        let records = vec![aged("old", 600, 0.6), aged("new", 1, 0.5)];
        let profile = profile_from_ages(&[600.0, 1.0]);
        let ranked = score_memories(records, QueryIntent::TemporalPrimary, 0.75, &profile, now());
        assert_eq!(ranked[0].record.id, "new");
        assert_eq!(ranked[0].age_hours, Some(1.0));
        assert!(ranked[0].temporal_score.is_some());
    }

    #[test]
    fn ties_keep_input_order() {
        let records = vec![
            MemoryRecord::new("x", "no time").with_score(0.4),
            MemoryRecord::new("y", "no time").with_score(0.4),
        ];
        let ranked = score_memories(
            records,
            QueryIntent::TemporalPrimary,
            0.9,
            &TemporalProfile::default(),
            now(),
        );
        assert_eq!(ranked[0].record.id, "x");
        assert_eq!(ranked[1].record.id, "y");
    }

    #[test]
    fn missing_timestamp_keeps_semantic_score_under_every_intent() {
        for intent in [
            QueryIntent::TemporalPrimary,
            QueryIntent::TemporalSecondary,
            QueryIntent::SemanticOnly,
        ] {
            let record = MemoryRecord::new("z", "undated").with_score(0.37);
            let ranked =
                score_memories(vec![record], intent, 0.65, &TemporalProfile::default(), now());
            assert_eq!(ranked[0].final_score, 0.37);
            assert_eq!(ranked[0].temporal_score, None);
        }
    }

    #[test]
    fn output_is_sorted_descending() {
        let records: Vec<_> = (0..12)
            .map(|i| aged(&i.to_string(), i * 37 % 400, (i as f64 * 0.13) % 1.0))
            .collect();
        let profile = TemporalProfile::default();
        let ranked = score_memories(records, QueryIntent::TemporalSecondary, 0.5, &profile, now());
        assert!(ranked.windows(2).all(|w| w[0].final_score >= w[1].final_score));
    }

    proptest! {
        #[test]
        fn younger_never_scores_lower_within_a_bucket(a in 0.0f64..5000.0, b in 0.0f64..5000.0) {
            let profile = profile_from_ages(&[2.0, 10.0, 30.0, 90.0, 300.0]);
            let (young, old) = if a <= b { (a, b) } else { (b, a) };
            prop_assume!(profile.bucket(young) == profile.bucket(old));
            prop_assert!(recency_score(young, &profile) >= recency_score(old, &profile));
        }

        #[test]
        fn base_component_is_bounded(age in 0.0f64..100000.0, std in 0.0f64..10000.0) {
            let profile = TemporalProfile { std_age_hours: std, ..TemporalProfile::default() };
            let score = recency_score(age, &profile);
            prop_assert!(score >= 0.0 && score <= RECENT_BOOST);
        }
    }
}
