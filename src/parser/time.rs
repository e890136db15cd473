//! Timestamp parsing and formatting
//!
//! Record CSVs carry millisecond UTC timestamps (`2024-07-20T10:37:49.167Z`).
//! Timestamps handed to child processes keep nanoseconds so frame indices
//! computed from them stay exact.

use crate::error::{OverlayError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 timestamp taken as UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(OverlayError::InvalidTimestamp(value.to_string()))
}

/// Format a timestamp the way record CSVs store it
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format a timestamp without losing sub-millisecond precision
pub fn format_timestamp_precise(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

/// Elapsed seconds from `from` to `to` (negative when `to` is earlier)
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Serde adapter for the CSV `time` column
pub mod record_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_timestamp(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_rfc3339_with_z() {
        let t = parse_timestamp("2024-07-20T10:37:49.167Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 7, 20, 10, 37, 49).unwrap() + chrono::Duration::milliseconds(167));
    }

    #[test]
    fn test_parse_with_offset_normalises_to_utc() {
        let t = parse_timestamp("2024-07-20T12:37:49+02:00").unwrap();
        assert_eq!(t.hour(), 10);
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let t = parse_timestamp("2024-07-20T10:37:49").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 7, 20, 10, 37, 49).unwrap());
        let t = parse_timestamp("2024-07-20 10:37:49.5").unwrap();
        assert_eq!(t.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(OverlayError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_format_round_trip() {
        let text = "2024-07-20T10:37:49.167Z";
        let t = parse_timestamp(text).unwrap();
        assert_eq!(format_timestamp(&t), text);
        assert_eq!(parse_timestamp(&format_timestamp_precise(&t)).unwrap(), t);
    }

    #[test]
    fn test_seconds_between() {
        let a = parse_timestamp("2024-07-20T10:00:00Z").unwrap();
        let b = parse_timestamp("2024-07-20T10:00:02.5Z").unwrap();
        assert_eq!(seconds_between(a, b), 2.5);
        assert_eq!(seconds_between(b, a), -2.5);
    }
}
