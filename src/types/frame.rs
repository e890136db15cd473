use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Track state interpolated at an arbitrary timestamp
///
/// Optional readings stay fractional here; they are only rounded when printed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSample {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub temperature: Option<f64>,
    pub heart_rate: Option<f64>,
    pub cadence: Option<f64>,
    pub speed: f64,
    pub total_distance: f64,
    pub total_ascent: f64,
    pub total_descent: f64,
}

/// One slot of a frame schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Global frame number, counted from the schedule origin
    pub index: usize,
    pub time: DateTime<Utc>,
}

/// A frame that could not be rendered
#[derive(Debug, Clone)]
pub struct FrameFailure {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub reason: String,
}

/// Outcome of rendering a schedule
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub rendered: Vec<PathBuf>,
    pub failed: Vec<FrameFailure>,
}

impl FrameReport {
    pub fn total(&self) -> usize {
        self.rendered.len() + self.failed.len()
    }
}
