//! Pure timestamp ordering, bypassing semantic scores.

use chrono::{DateTime, Utc};

use super::scoring::RankedMemory;
use super::timestamp::{epoch_seconds, record_timestamp};
use crate::memory::types::MemoryRecord;

/// Newest records first, at most `limit`, optionally no older than `time_filter_hours`.
///
/// Records without a parseable timestamp cannot be placed on the timeline and
/// are left out. Each result carries its `age_hours`; `final_score` is the
/// record's semantic score or 0.0.
pub fn memories_by_timestamp(
    records: Vec<MemoryRecord>,
    limit: usize,
    time_filter_hours: Option<f64>,
    now: DateTime<Utc>,
) -> Vec<RankedMemory> {
    let now_secs = epoch_seconds(now);

    let mut dated: Vec<(f64, MemoryRecord)> = records
        .into_iter()
        .filter_map(|r| record_timestamp(&r).map(|ts| (ts, r)))
        .filter(|(ts, _)| match time_filter_hours {
            Some(max_age) => (now_secs - ts) / 3600.0 <= max_age,
            None => true,
        })
        .collect();

    dated.sort_by(|a, b| b.0.total_cmp(&a.0));
    dated.truncate(limit);

    dated
        .into_iter()
        .map(|(ts, record)| {
            let mut ranked = RankedMemory::passthrough(record);
            ranked.age_hours = Some((now_secs - ts) / 3600.0);
            ranked
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn aged(id: &str, hours: i64) -> MemoryRecord {
        MemoryRecord::new(id, "m").with_created_at((now() - Duration::hours(hours)).to_rfc3339().as_str())
    }

    #[test]
    fn filter_keeps_last_day_newest_first() {
        let records = vec![
            aged("a", 30),
            aged("b", 2),
            aged("c", 24),
            aged("d", 500),
            aged("e", 10),
            MemoryRecord::new("f", "undated"),
        ];
        let result = memories_by_timestamp(records, 10, Some(24.0), now());
        let ids: Vec<_> = result.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "e", "c"]);
        assert!(result.iter().all(|r| r.age_hours.unwrap() <= 24.0));
    }

    #[test]
    fn limit_truncates() {
        let records = (1..=8).map(|h| aged(&h.to_string(), h)).collect();
        let result = memories_by_timestamp(records, 3, None, now());
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].record.id, "1");
        assert_eq!(result[0].age_hours, Some(1.0));
    }

    #[test]
    fn mixed_encodings_sort_together() {
        let epoch = epoch_seconds(now() - Duration::hours(5));
        let records = vec![
            aged("iso_old", 9),
            MemoryRecord::new("epoch", "m").with_created_at(epoch),
            aged("iso_new", 1),
        ];
        let result = memories_by_timestamp(records, 5, None, now());
        let ids: Vec<_> = result.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["iso_new", "epoch", "iso_old"]);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(memories_by_timestamp(vec![], 5, Some(1.0), now()).is_empty());
    }
}
