//! Statistical profile of a collection's age distribution.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::timestamp::age_hours;
use crate::memory::types::MemoryRecord;

/// Lower bound for the recent-bucket threshold, in hours.
pub const MIN_RECENT_THRESHOLD_HOURS: f64 = 1.0;
/// Upper bound for the old-bucket threshold, in hours (one week).
pub const MAX_OLD_THRESHOLD_HOURS: f64 = 168.0;

/// Fractions of a collection in each age bucket. Sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketDistribution {
    pub recent: f64,
    pub medium: f64,
    pub old: f64,
}

/// Age statistics for one collection at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemporalProfile {
    pub mean_age_hours: f64,
    pub std_age_hours: f64,
    pub recent_threshold_hours: f64,
    pub old_threshold_hours: f64,
    pub distribution: BucketDistribution,
}

impl Default for TemporalProfile {
    /// Profile used when no record has a parseable timestamp.
    fn default() -> Self {
        Self {
            mean_age_hours: 24.0,
            std_age_hours: 12.0,
            recent_threshold_hours: 1.0,
            old_threshold_hours: 168.0,
            distribution: BucketDistribution {
                recent: 0.0,
                medium: 0.0,
                old: 1.0,
            },
        }
    }
}

/// Which side of the profile thresholds an age falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    Recent,
    Medium,
    Old,
}

impl TemporalProfile {
    pub fn bucket(&self, age_hours: f64) -> AgeBucket {
        if age_hours <= self.recent_threshold_hours {
            AgeBucket::Recent
        } else if age_hours <= self.old_threshold_hours {
            AgeBucket::Medium
        } else {
            AgeBucket::Old
        }
    }
}

/// Ages in hours of every record with a parseable timestamp.
pub fn collect_ages(records: &[MemoryRecord], now: DateTime<Utc>) -> Vec<f64> {
    records.iter().filter_map(|r| age_hours(r, now)).collect()
}

/// Build the profile of `records` as seen at `now`. Total over any input.
pub fn build_profile(records: &[MemoryRecord], now: DateTime<Utc>) -> TemporalProfile {
    profile_from_ages(&collect_ages(records, now))
}

pub fn profile_from_ages(ages: &[f64]) -> TemporalProfile {
    if ages.is_empty() {
        return TemporalProfile::default();
    }

    let n = ages.len() as f64;
    let mean = ages.iter().sum::<f64>() / n;
    let std = population_variance(ages, mean).sqrt();

    let mut sorted = ages.to_vec();
    sorted.sort_by(f64::total_cmp);
    let recent_threshold = percentile(&sorted, 25.0).max(MIN_RECENT_THRESHOLD_HOURS);
    let old_threshold = percentile(&sorted, 75.0).min(MAX_OLD_THRESHOLD_HOURS);

    let mut profile = TemporalProfile {
        mean_age_hours: mean,
        std_age_hours: std,
        recent_threshold_hours: recent_threshold,
        old_threshold_hours: old_threshold,
        distribution: BucketDistribution {
            recent: 0.0,
            medium: 0.0,
            old: 0.0,
        },
    };

    let (mut recent, mut medium, mut old) = (0usize, 0usize, 0usize);
    for &age in ages {
        match profile.bucket(age) {
            AgeBucket::Recent => recent += 1,
            AgeBucket::Medium => medium += 1,
            AgeBucket::Old => old += 1,
        }
    }
    profile.distribution = BucketDistribution {
        recent: recent as f64 / n,
        medium: medium as f64 / n,
        old: old as f64 / n,
    };
    profile
}

pub(crate) fn population_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Percentile of an ascending slice, interpolating linearly between closest ranks.
pub(crate) fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = pct / 100.0 * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn aged(id: &str, hours: f64) -> MemoryRecord {
        let ts = now() - Duration::milliseconds((hours * 3_600_000.0) as i64);
        MemoryRecord::new(id, "m").with_created_at(ts.to_rfc3339().as_str())
    }

    #[test]
    fn empty_collection_gets_default_profile() {
        assert_eq!(build_profile(&[], now()), TemporalProfile::default());
    }

    #[test]
    fn malformed_timestamps_are_skipped() {
        let records = vec![
            MemoryRecord::new("a", "x").with_created_at("not a date"),
            MemoryRecord::new("b", "y"),
        ];
        assert_eq!(build_profile(&records, now()), TemporalProfile::default());
    }

    #[test]
    fn percentile_matches_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&sorted, 75.0) - 3.25).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 25.0), 7.0);
    }

    #[test]
    fn thresholds_are_clamped() {
        // All very young: p25 below the 1h floor.
        let young = profile_from_ages(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(young.recent_threshold_hours, 1.0);

        // All very old: p75 above the one-week cap.
        let old = profile_from_ages(&[500.0, 600.0, 700.0, 800.0]);
        assert_eq!(old.old_threshold_hours, 168.0);
        // p25 = 575h: only the 500h record is "recent" relative to this collection
        assert_eq!(old.recent_threshold_hours, 575.0);
        assert_eq!(old.distribution.recent, 0.25);
        assert_eq!(old.distribution.old, 0.75);
    }

    #[test]
    fn buckets_split_on_thresholds() {
        let profile = profile_from_ages(&[2.0, 4.0, 6.0, 8.0, 10.0]);
        // p25 = 4, p75 = 8
        assert_eq!(profile.recent_threshold_hours, 4.0);
        assert_eq!(profile.old_threshold_hours, 8.0);
        assert!((profile.distribution.recent - 0.4).abs() < 1e-12);
        assert!((profile.distribution.medium - 0.4).abs() < 1e-12);
        assert!((profile.distribution.old - 0.2).abs() < 1e-12);
        assert!((profile.mean_age_hours - 6.0).abs() < 1e-12);
        assert!((profile.std_age_hours - 8.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn floor_above_old_threshold_still_sums_to_one() {
        // recent floor (1.0) exceeds p75 (0.65): every age lands in one bucket.
        let profile = profile_from_ages(&[0.2, 0.4, 0.6, 0.8]);
        let d = profile.distribution;
        assert!((d.recent + d.medium + d.old - 1.0).abs() < 1e-12);
        assert_eq!(d.recent, 1.0);
    }

    #[test]
    fn builds_from_records() {
        let records = vec![aged("a", 1.0), aged("b", 3.0), aged("c", 48.0)];
        let profile = build_profile(&records, now());
        assert!((profile.mean_age_hours - 52.0 / 3.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn distribution_always_sums_to_one(ages in proptest::collection::vec(0.0f64..5000.0, 1..60)) {
            let d = profile_from_ages(&ages).distribution;
            prop_assert!((d.recent + d.medium + d.old - 1.0).abs() < 1e-6);
        }

        #[test]
        fn thresholds_respect_bounds(ages in proptest::collection::vec(-10.0f64..5000.0, 0..60)) {
            let p = profile_from_ages(&ages);
            prop_assert!(p.recent_threshold_hours >= 1.0);
            prop_assert!(p.old_threshold_hours <= 168.0);
        }
    }
}
