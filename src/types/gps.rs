use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of an extracted track, in CSV column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsRecord {
    #[serde(with = "crate::parser::time::record_time")]
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres
    pub elevation: f64,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Beats per minute
    pub heart_rate: Option<u32>,
    /// Revolutions per minute
    pub cadence: Option<u32>,
    /// km/h
    pub speed: f64,
    /// km
    pub total_distance: f64,
    /// Metres
    pub total_ascent: f64,
    /// Metres
    pub total_descent: f64,
}

impl GpsRecord {
    /// A bare position sample with every derived metric zeroed
    pub fn new(time: DateTime<Utc>, latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
            elevation,
            temperature: None,
            heart_rate: None,
            cadence: None,
            speed: 0.0,
            total_distance: 0.0,
            total_ascent: 0.0,
            total_descent: 0.0,
        }
    }
}

/// Speed/distance sample from an auxiliary sensor (TCX trackpoint)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub time: DateTime<Utc>,
    /// km/h
    pub speed: f64,
    /// Metres since the start of the activity
    pub distance: f64,
}

/// Point of a planned route drawn on the map and elevation profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres
    pub elevation: f64,
    /// km along the route
    pub distance: f64,
}

impl From<&GpsRecord> for RoutePoint {
    fn from(record: &GpsRecord) -> Self {
        Self {
            latitude: record.latitude,
            longitude: record.longitude,
            elevation: record.elevation,
            distance: record.total_distance,
        }
    }
}
