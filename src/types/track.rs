use crate::parser::time::seconds_between;
use crate::types::GpsRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate figures for an extracted track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub records: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub distance_km: f64,
    pub ascent_m: f64,
    pub descent_m: f64,
    pub max_speed_kmh: f64,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<u32>,
}

impl TrackSummary {
    pub fn from_records(records: &[GpsRecord]) -> Self {
        let start = records.first().map(|r| r.time);
        let end = records.last().map(|r| r.time);
        let duration_seconds = match (start, end) {
            (Some(start), Some(end)) => seconds_between(start, end),
            _ => 0.0,
        };

        let heart_rates: Vec<u32> = records.iter().filter_map(|r| r.heart_rate).collect();
        let avg_heart_rate = if heart_rates.is_empty() {
            None
        } else {
            Some(heart_rates.iter().map(|&hr| hr as f64).sum::<f64>() / heart_rates.len() as f64)
        };

        Self {
            records: records.len(),
            start,
            end,
            duration_seconds,
            distance_km: records.last().map(|r| r.total_distance).unwrap_or(0.0),
            ascent_m: records.last().map(|r| r.total_ascent).unwrap_or(0.0),
            descent_m: records.last().map(|r| r.total_descent).unwrap_or(0.0),
            max_speed_kmh: records.iter().map(|r| r.speed).fold(0.0, f64::max),
            avg_heart_rate,
            max_heart_rate: heart_rates.iter().copied().max(),
        }
    }

    /// Check if the track carries heart rate readings
    pub fn has_heart_rate(&self) -> bool {
        self.max_heart_rate.is_some()
    }
}
