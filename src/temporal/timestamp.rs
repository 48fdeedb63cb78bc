//! Normalization of `created_at` values to epoch seconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::memory::types::{CreatedAt, MemoryRecord};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 string to epoch seconds.
///
/// Accepts RFC 3339 (trailing `Z` or an explicit offset), naive date-times
/// with `T` or space separators, and bare dates. Naive values are read as UTC.
pub fn parse_iso(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(epoch_seconds(dt.with_timezone(&Utc)));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(epoch_seconds(naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| epoch_seconds(naive.and_utc()))
}

/// Normalize a stored creation time: ISO-8601 first, then a numeric epoch.
pub fn parse_created_at(value: &CreatedAt) -> Option<f64> {
    let secs = match value {
        CreatedAt::Epoch(secs) => Some(*secs),
        CreatedAt::Iso(s) => parse_iso(s).or_else(|| s.trim().parse::<f64>().ok()),
    }?;
    secs.is_finite().then_some(secs)
}

/// Epoch seconds of a record's creation time, if it has a parseable one.
pub fn record_timestamp(record: &MemoryRecord) -> Option<f64> {
    record.created_at.as_ref().and_then(parse_created_at)
}

/// Age in hours of a record relative to `now`.
pub fn age_hours(record: &MemoryRecord, now: DateTime<Utc>) -> Option<f64> {
    record_timestamp(record).map(|ts| (epoch_seconds(now) - ts) / 3600.0)
}

pub fn epoch_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1_000_000.0
}
