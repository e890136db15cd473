//! TCX trackpoint parsing
//!
//! Reads `Time`, `DistanceMeters` and the ActivityExtension `Speed` of every
//! `Trackpoint`. Garmin devices write trackpoints without distance or speed
//! while paused, so those fields are optional: a missing distance repeats the
//! previous one and a missing speed reads as standing still.

use crate::conversion::{mps_to_kmh, round_to};
use crate::error::{OverlayError, Result};
use crate::parser::gpx::parse_number;
use crate::parser::time::parse_timestamp;
use crate::types::SensorRecord;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum TrackpointField {
    Time,
    Distance,
    Speed,
}

impl TrackpointField {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"Time" => Some(Self::Time),
            b"DistanceMeters" => Some(Self::Distance),
            b"Speed" => Some(Self::Speed),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct PendingTrackpoint {
    time: Option<DateTime<Utc>>,
    distance: Option<f64>,
    speed_mps: Option<f64>,
}

/// Parse TCX trackpoints from an XML string, ordered by time
///
/// Speeds are converted to km/h (1 decimal), distances kept in metres (3 decimals).
pub fn parse_tcx_str(xml: &str) -> Result<Vec<SensorRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut records: Vec<SensorRecord> = Vec::new();
    let mut point: Option<PendingTrackpoint> = None;
    let mut field: Option<TrackpointField> = None;
    let mut last_distance = 0.0;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                if e.local_name().as_ref() == b"Trackpoint" {
                    point = Some(PendingTrackpoint::default());
                } else if point.is_some() {
                    field = TrackpointField::from_local_name(e.local_name().as_ref());
                }
            }
            Event::Text(t) => {
                if let (Some(pending), Some(current)) = (point.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|err| OverlayError::Xml(err.to_string()))?;
                    match current {
                        TrackpointField::Time => pending.time = Some(parse_timestamp(&text)?),
                        TrackpointField::Distance => {
                            pending.distance = Some(parse_number("DistanceMeters", &text)?)
                        }
                        TrackpointField::Speed => {
                            pending.speed_mps = Some(parse_number("Speed", &text)?)
                        }
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"Trackpoint" {
                    if let Some(pending) = point.take() {
                        let time = pending.time.ok_or(OverlayError::MissingField {
                            element: "Trackpoint",
                            index: records.len(),
                            field: "Time",
                        })?;
                        let distance = pending.distance.unwrap_or(last_distance);
                        last_distance = distance;
                        records.push(SensorRecord {
                            time,
                            speed: round_to(mps_to_kmh(pending.speed_mps.unwrap_or(0.0)), 1),
                            distance: round_to(distance, 3),
                        });
                    }
                }
                field = None;
            }
            _ => {}
        }
        buf.clear();
    }

    records.sort_by_key(|r| r.time);
    debug!("Parsed {} TCX trackpoints", records.len());
    Ok(records)
}

/// Parse a TCX file
pub fn parse_tcx(path: &Path) -> Result<Vec<SensorRecord>> {
    let xml = fs::read_to_string(path)?;
    parse_tcx_str(&xml)
}
