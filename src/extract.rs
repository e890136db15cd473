//! GPX extraction: gap filling and per-record metrics
//!
//! Recorders drop samples while stopped or when the fix is poor. Extraction
//! re-grids those gaps to one record per second and then derives speed,
//! cumulative distance, ascent and descent from consecutive positions.

use crate::conversion::{haversine_distance_m, lerp, lerp_optional, meters_to_km, mps_to_kmh, round_to};
use crate::error::{OverlayError, Result};
use crate::parser::gpx::parse_gpx;
use crate::parser::time::seconds_between;
use crate::types::GpsRecord;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::debug;

/// Steps this long or longer count as a stop: no speed, no distance
pub const MAX_MOVING_STEP_SECONDS: f64 = 3.0;

/// How synthetic records position themselves inside a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapFill {
    /// Move linearly from the earlier to the later sample
    #[default]
    Interpolate,
    /// Stay at the earlier sample (recorder paused while standing)
    Hold,
}

impl std::str::FromStr for GapFill {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "interpolate" => Ok(GapFill::Interpolate),
            "hold" => Ok(GapFill::Hold),
            other => Err(OverlayError::InvalidOption(format!("unknown gap fill mode '{other}'"))),
        }
    }
}

/// Options for [`extract_track`]
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub gap_fill: GapFill,
}

/// Fraction of the way from `from` to `to` that `at` lies
fn elapsed_ratio(from: DateTime<Utc>, to: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    let span = seconds_between(from, to);
    if span <= 0.0 {
        return 0.0;
    }
    seconds_between(from, at) / span
}

/// Insert one record per second into every gap longer than a second
///
/// Synthetic records interpolate temperature and heart rate (truncated to
/// whole units) and report cadence and speed as zero.
pub fn fill_gaps(records: &[GpsRecord], mode: GapFill) -> Vec<GpsRecord> {
    let step = Duration::seconds(1);
    let mut filled = Vec::with_capacity(records.len());

    for pair in records.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        filled.push(before.clone());

        let mut current = before.time;
        while after.time - current > step {
            current += step;
            let ratio = elapsed_ratio(before.time, after.time, current);
            let (latitude, longitude, elevation) = match mode {
                GapFill::Interpolate => (
                    lerp(before.latitude, after.latitude, ratio),
                    lerp(before.longitude, after.longitude, ratio),
                    lerp(before.elevation, after.elevation, ratio),
                ),
                GapFill::Hold => (before.latitude, before.longitude, before.elevation),
            };

            let mut synthetic = GpsRecord::new(current, latitude, longitude, elevation);
            synthetic.temperature =
                lerp_optional(before.temperature, after.temperature, ratio).map(f64::trunc);
            synthetic.heart_rate = lerp_optional(
                before.heart_rate.map(f64::from),
                after.heart_rate.map(f64::from),
                ratio,
            )
            .map(|hr| hr as u32);
            synthetic.cadence = Some(0);
            filled.push(synthetic);
        }
    }

    if let Some(last) = records.last() {
        filled.push(last.clone());
    }

    if filled.len() > records.len() {
        debug!("Filled {} missing seconds", filled.len() - records.len());
    }
    filled
}

/// Round positions to the precision written to CSV (6 decimals, whole metres)
pub fn round_positions(records: &mut [GpsRecord]) {
    for record in records.iter_mut() {
        record.latitude = round_to(record.latitude, 6);
        record.longitude = round_to(record.longitude, 6);
        record.elevation = round_to(record.elevation, 0);
    }
}

/// Derive speed, total distance, ascent and descent for every record
pub fn compute_metrics(records: &mut [GpsRecord]) {
    let mut total_distance_m = 0.0;
    let mut total_ascent = 0.0;
    let mut total_descent = 0.0;

    for i in 1..records.len() {
        let (prev, cur) = (&records[i - 1], &records[i]);
        let step = seconds_between(prev.time, cur.time);
        let elevation_delta = cur.elevation - prev.elevation;

        let speed = if step >= MAX_MOVING_STEP_SECONDS {
            0.0
        } else {
            let distance =
                haversine_distance_m(prev.latitude, prev.longitude, cur.latitude, cur.longitude);
            total_distance_m += distance;
            if step > 0.0 {
                round_to(mps_to_kmh(distance / step), 1)
            } else {
                0.0
            }
        };

        if elevation_delta > 0.0 {
            total_ascent += elevation_delta;
        } else {
            total_descent -= elevation_delta;
        }

        let record = &mut records[i];
        record.speed = speed;
        record.total_distance = round_to(meters_to_km(total_distance_m), 2);
        record.total_ascent = round_to(total_ascent, 2);
        record.total_descent = round_to(total_descent, 2);
    }

    if let Some(first) = records.first_mut() {
        first.speed = 0.0;
        first.total_distance = 0.0;
        first.total_ascent = 0.0;
        first.total_descent = 0.0;
    }
}

/// Parse a GPX file, fill its gaps and compute metrics
pub fn extract_track(path: &Path, options: &ExtractOptions) -> Result<Vec<GpsRecord>> {
    let mut parsed = parse_gpx(path)?;
    if parsed.is_empty() {
        return Err(OverlayError::EmptyTrack);
    }
    round_positions(&mut parsed);

    let mut records = fill_gaps(&parsed, options.gap_fill);
    round_positions(&mut records);
    compute_metrics(&mut records);
    Ok(records)
}
