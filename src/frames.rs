//! Frame schedule and per-frame track interpolation
//!
//! A schedule lists evenly spaced timestamps between a start and an end.
//! Timestamps are computed as `start + k * interval` in whole nanoseconds so
//! that a schedule split across processes lands on exactly the same instants
//! and frame numbers as the unsplit one.

use crate::conversion::{lerp, lerp_optional};
use crate::error::{OverlayError, Result};
use crate::parser::time::{format_timestamp, seconds_between};
use crate::types::{FrameSlot, GpsRecord, TrackSample};
use chrono::{DateTime, Duration, Utc};

/// Default overlay frame rate (NTSC 60p)
pub const DEFAULT_FPS: f64 = 59.9401;

/// Brackets wider than this are treated as a stop rather than interpolated
pub const HOLD_GAP_SECONDS: f64 = 5.0;

/// Widest speed window accepted, in seconds either side of a frame
pub const MAX_WINDOW_SECONDS: f64 = 86_400.0;

/// Evenly spaced frame timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSchedule {
    start: DateTime<Utc>,
    interval_ns: i64,
    count: usize,
    first_index: usize,
}

impl FrameSchedule {
    /// Every `start + k / fps` that is not later than `end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(OverlayError::InvalidOption(format!("frame rate must be positive, got {fps}")));
        }
        if end < start {
            return Err(OverlayError::InvalidOption(format!(
                "end {} is before start {}",
                format_timestamp(&end),
                format_timestamp(&start)
            )));
        }

        let interval_ns = (1e9 / fps).round() as i64;
        if interval_ns <= 0 {
            return Err(OverlayError::InvalidOption(format!("frame rate {fps} is too high")));
        }
        let span_ns = (end - start)
            .num_nanoseconds()
            .ok_or_else(|| OverlayError::InvalidOption("time range is too long".to_string()))?;

        Ok(Self {
            start,
            interval_ns,
            count: (span_ns / interval_ns) as usize + 1,
            first_index: 0,
        })
    }

    /// Number frames relative to `origin` instead of `start`
    pub fn with_origin(mut self, origin: DateTime<Utc>) -> Result<Self> {
        let offset_ns = (self.start - origin)
            .num_nanoseconds()
            .ok_or_else(|| OverlayError::InvalidOption("origin is too far from start".to_string()))?;
        if offset_ns < 0 {
            return Err(OverlayError::InvalidOption(format!(
                "origin {} is after start {}",
                format_timestamp(&origin),
                format_timestamp(&self.start)
            )));
        }
        self.first_index = (offset_ns as f64 / self.interval_ns as f64).round() as usize;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn interval(&self) -> Duration {
        Duration::nanoseconds(self.interval_ns)
    }

    /// Frame rate implied by the interval
    pub fn fps(&self) -> f64 {
        1e9 / self.interval_ns as f64
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Timestamp of the last frame
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp(self.count.saturating_sub(1))
    }

    /// Global index of the first frame
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Timestamp of the frame `offset` places after the first
    pub fn timestamp(&self, offset: usize) -> DateTime<Utc> {
        self.start + Duration::nanoseconds(self.interval_ns * offset as i64)
    }

    pub fn slot(&self, offset: usize) -> FrameSlot {
        FrameSlot {
            index: self.first_index + offset,
            time: self.timestamp(offset),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = FrameSlot> + '_ {
        (0..self.count).map(move |offset| self.slot(offset))
    }

    /// `len` consecutive frames starting `offset` frames in, keeping global numbering
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let offset = offset.min(self.count);
        Self {
            start: self.timestamp(offset),
            interval_ns: self.interval_ns,
            count: len.min(self.count - offset),
            first_index: self.first_index + offset,
        }
    }
}

/// File name of a frame, zero padded so lexical order is frame order
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{index:06}.png")
}

fn sample_from(record: &GpsRecord, time: DateTime<Utc>) -> TrackSample {
    TrackSample {
        time,
        latitude: record.latitude,
        longitude: record.longitude,
        elevation: record.elevation,
        temperature: record.temperature,
        heart_rate: record.heart_rate.map(f64::from),
        cadence: record.cadence.map(f64::from),
        speed: record.speed,
        total_distance: record.total_distance,
        total_ascent: record.total_ascent,
        total_descent: record.total_descent,
    }
}

/// Interpolate the track state at `time`
///
/// `records` must be ordered by time. Every numeric field is interpolated
/// linearly between the bracketing records; when the bracket spans more than
/// [`HOLD_GAP_SECONDS`] the earlier record is held with zero speed.
pub fn interpolate_at(records: &[GpsRecord], time: DateTime<Utc>) -> Result<TrackSample> {
    let (first, last) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(OverlayError::EmptyTrack),
    };
    if time < first.time || time > last.time {
        return Err(OverlayError::OutOfRange(format!(
            "{} not in {} .. {}",
            format_timestamp(&time),
            format_timestamp(&first.time),
            format_timestamp(&last.time)
        )));
    }

    let after_index = records.partition_point(|r| r.time <= time);
    if after_index == records.len() {
        // time == last.time
        return Ok(sample_from(last, time));
    }
    let before = &records[after_index - 1];
    let after = &records[after_index];

    let span = seconds_between(before.time, after.time);
    if span > HOLD_GAP_SECONDS {
        let mut held = sample_from(before, time);
        held.speed = 0.0;
        return Ok(held);
    }
    let ratio = seconds_between(before.time, time) / span;

    Ok(TrackSample {
        time,
        latitude: lerp(before.latitude, after.latitude, ratio),
        longitude: lerp(before.longitude, after.longitude, ratio),
        elevation: lerp(before.elevation, after.elevation, ratio),
        temperature: lerp_optional(before.temperature, after.temperature, ratio),
        heart_rate: lerp_optional(
            before.heart_rate.map(f64::from),
            after.heart_rate.map(f64::from),
            ratio,
        ),
        cadence: lerp_optional(
            before.cadence.map(f64::from),
            after.cadence.map(f64::from),
            ratio,
        ),
        speed: lerp(before.speed, after.speed, ratio),
        total_distance: lerp(before.total_distance, after.total_distance, ratio),
        total_ascent: lerp(before.total_ascent, after.total_ascent, ratio),
        total_descent: lerp(before.total_descent, after.total_descent, ratio),
    })
}

/// Records within `seconds` either side of `time`
///
/// `seconds` is capped at [`MAX_WINDOW_SECONDS`].
pub fn window(records: &[GpsRecord], time: DateTime<Utc>, seconds: f64) -> &[GpsRecord] {
    let half = Duration::milliseconds((seconds.clamp(0.0, MAX_WINDOW_SECONDS) * 1000.0) as i64);
    let lo = match time.checked_sub_signed(half) {
        Some(from) => records.partition_point(|r| r.time < from),
        None => 0,
    };
    let hi = match time.checked_add_signed(half) {
        Some(to) => records.partition_point(|r| r.time <= to),
        None => records.len(),
    };
    &records[lo..hi.max(lo)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::time::parse_timestamp;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn record(time: &str, lat: f64, speed: f64, distance: f64) -> GpsRecord {
        let mut r = GpsRecord::new(ts(time), lat, 7.0, 100.0);
        r.speed = speed;
        r.total_distance = distance;
        r
    }

    #[test]
    fn test_schedule_count_matches_even_spacing() {
        let s = FrameSchedule::new(ts("2024-07-20T10:00:00Z"), ts("2024-07-20T10:00:01Z"), 10.0).unwrap();
        assert_eq!(s.len(), 11);
        assert_eq!(s.end(), ts("2024-07-20T10:00:01Z"));

        let s = FrameSchedule::new(ts("2024-07-20T10:00:00Z"), ts("2024-07-20T10:01:00Z"), DEFAULT_FPS).unwrap();
        // floor(60 * 59.9401) + 1
        assert_eq!(s.len(), 3597);
    }

    #[test]
    fn test_schedule_single_frame_when_start_equals_end() {
        let t = ts("2024-07-20T10:00:00Z");
        let s = FrameSchedule::new(t, t, 30.0).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.slot(0), FrameSlot { index: 0, time: t });
    }

    #[test]
    fn test_schedule_rejects_bad_input() {
        let t = ts("2024-07-20T10:00:00Z");
        assert!(FrameSchedule::new(t, t - Duration::seconds(1), 30.0).is_err());
        assert!(FrameSchedule::new(t, t, 0.0).is_err());
        assert!(FrameSchedule::new(t, t, f64::NAN).is_err());
    }

    #[test]
    fn test_origin_and_slice_keep_global_numbering() {
        let full = FrameSchedule::new(ts("2024-07-20T10:00:00Z"), ts("2024-07-20T10:00:10Z"), DEFAULT_FPS).unwrap();
        let part = full.slice(100, 50);
        assert_eq!(part.first_index(), 100);
        assert_eq!(part.slot(0), full.slot(100));

        let rebuilt = FrameSchedule::new(part.start(), part.end(), DEFAULT_FPS)
            .unwrap()
            .with_origin(full.start())
            .unwrap();
        assert_eq!(rebuilt.len(), 50);
        assert!(rebuilt.iter().eq(part.iter()));
    }

    #[test]
    fn test_origin_after_start_is_rejected() {
        let s = FrameSchedule::new(ts("2024-07-20T10:00:00Z"), ts("2024-07-20T10:00:01Z"), 10.0).unwrap();
        assert!(s.with_origin(ts("2024-07-20T10:00:05Z")).is_err());
    }

    #[test]
    fn test_frame_file_name_sorts_lexically() {
        assert_eq!(frame_file_name(7), "frame_000007.png");
        assert!(frame_file_name(99) < frame_file_name(100));
    }

    #[test]
    fn test_interpolate_between_records() {
        let records = vec![
            record("2024-07-20T10:00:00Z", 50.0, 10.0, 1.0),
            record("2024-07-20T10:00:02Z", 50.002, 20.0, 1.01),
        ];
        let sample = interpolate_at(&records, ts("2024-07-20T10:00:00.5Z")).unwrap();
        assert!((sample.latitude - 50.0005).abs() < 1e-9);
        assert!((sample.speed - 12.5).abs() < 1e-9);
        assert!((sample.total_distance - 1.0025).abs() < 1e-9);
        assert_eq!(sample.heart_rate, None);
    }

    #[test]
    fn test_interpolate_at_exact_ends() {
        let records = vec![
            record("2024-07-20T10:00:00Z", 50.0, 10.0, 1.0),
            record("2024-07-20T10:00:01Z", 50.001, 20.0, 1.01),
        ];
        assert_eq!(interpolate_at(&records, ts("2024-07-20T10:00:00Z")).unwrap().speed, 10.0);
        assert_eq!(interpolate_at(&records, ts("2024-07-20T10:00:01Z")).unwrap().speed, 20.0);
    }

    #[test]
    fn test_interpolate_holds_across_long_gap() {
        let records = vec![
            record("2024-07-20T10:00:00Z", 50.0, 10.0, 1.0),
            record("2024-07-20T10:00:30Z", 50.1, 20.0, 2.0),
        ];
        let sample = interpolate_at(&records, ts("2024-07-20T10:00:15Z")).unwrap();
        assert_eq!(sample.latitude, 50.0);
        assert_eq!(sample.speed, 0.0);
        assert_eq!(sample.total_distance, 1.0);
    }

    #[test]
    fn test_interpolate_out_of_range() {
        let records = vec![record("2024-07-20T10:00:00Z", 50.0, 10.0, 1.0)];
        assert!(matches!(
            interpolate_at(&records, ts("2024-07-20T09:59:59Z")),
            Err(OverlayError::OutOfRange(_))
        ));
        assert!(matches!(
            interpolate_at(&[], ts("2024-07-20T10:00:00Z")),
            Err(OverlayError::EmptyTrack)
        ));
        assert!(interpolate_at(&records, ts("2024-07-20T10:00:00Z")).is_ok());
    }

    #[test]
    fn test_window_selects_neighbourhood() {
        let records: Vec<GpsRecord> = (0..10)
            .map(|s| record(&format!("2024-07-20T10:00:0{s}Z"), 50.0, s as f64, 0.0))
            .collect();
        let slice = window(&records, ts("2024-07-20T10:00:05Z"), 2.0);
        let speeds: Vec<f64> = slice.iter().map(|r| r.speed).collect();
        assert_eq!(speeds, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert!(window(&records, ts("2024-07-20T11:00:00Z"), 2.0).is_empty());
    }

    #[test]
    fn test_window_handles_huge_spans() {
        let records: Vec<GpsRecord> = (0..3)
            .map(|s| record(&format!("2024-07-20T10:00:0{s}Z"), 50.0, s as f64, 0.0))
            .collect();
        let t = ts("2024-07-20T10:00:01Z");
        assert_eq!(window(&records, t, 1e13).len(), 3);
        assert_eq!(window(&records, t, f64::INFINITY).len(), 3);
        assert_eq!(window(&records, DateTime::<Utc>::MAX_UTC, 60.0).len(), 0);
        assert_eq!(window(&records, DateTime::<Utc>::MIN_UTC, 60.0).len(), 0);
    }
}
