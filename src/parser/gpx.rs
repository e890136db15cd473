//! GPX track parsing
//!
//! Collects every `trkpt` of every track segment, including the Garmin
//! TrackPointExtension readings (`atemp`, `hr`, `cad`). Namespace prefixes are
//! ignored so both `gpxtpx:hr` and `ns3:hr` are recognised.

use crate::error::{OverlayError, Result};
use crate::parser::time::parse_timestamp;
use crate::types::{GpsRecord, RoutePoint};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Text-bearing children of a `trkpt`
#[derive(Debug, Clone, Copy)]
enum PointField {
    Elevation,
    Time,
    Temperature,
    HeartRate,
    Cadence,
}

impl PointField {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"ele" => Some(Self::Elevation),
            b"time" => Some(Self::Time),
            b"atemp" => Some(Self::Temperature),
            b"hr" => Some(Self::HeartRate),
            b"cad" => Some(Self::Cadence),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct PendingPoint {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    time: Option<DateTime<Utc>>,
    temperature: Option<f64>,
    heart_rate: Option<u32>,
    cadence: Option<u32>,
    has_extension: bool,
}

impl PendingPoint {
    fn from_start(start: &BytesStart) -> Result<Self> {
        let mut point = Self::default();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| OverlayError::Xml(err.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|err| OverlayError::Xml(err.to_string()))?;
            match attr.key.local_name().as_ref() {
                b"lat" => point.latitude = Some(parse_number("lat", &value)?),
                b"lon" => point.longitude = Some(parse_number("lon", &value)?),
                _ => {}
            }
        }
        Ok(point)
    }

    fn set(&mut self, field: PointField, text: &str) -> Result<()> {
        match field {
            PointField::Elevation => self.elevation = Some(parse_number("ele", text)?),
            PointField::Time => self.time = Some(parse_timestamp(text)?),
            PointField::Temperature => self.temperature = Some(parse_number("atemp", text)?),
            PointField::HeartRate => self.heart_rate = Some(parse_number::<f64>("hr", text)? as u32),
            PointField::Cadence => self.cadence = Some(parse_number::<f64>("cad", text)? as u32),
        }
        Ok(())
    }

    fn finish(self, index: usize) -> Result<GpsRecord> {
        let missing = |field: &'static str| OverlayError::MissingField {
            element: "trkpt",
            index,
            field,
        };
        let mut record = GpsRecord::new(
            self.time.ok_or_else(|| missing("time"))?,
            self.latitude.ok_or_else(|| missing("lat"))?,
            self.longitude.ok_or_else(|| missing("lon"))?,
            self.elevation.ok_or_else(|| missing("ele"))?,
        );
        record.temperature = self.temperature;
        record.heart_rate = self.heart_rate;
        // A device that writes the extension but no cad has no cadence sensor
        record.cadence = match (self.cadence, self.has_extension) {
            (None, true) => Some(0),
            (cadence, _) => cadence,
        };
        Ok(record)
    }

    fn finish_route(self, index: usize) -> Result<RoutePoint> {
        let missing = |field: &'static str| OverlayError::MissingField {
            element: "route point",
            index,
            field,
        };
        Ok(RoutePoint {
            latitude: self.latitude.ok_or_else(|| missing("lat"))?,
            longitude: self.longitude.ok_or_else(|| missing("lon"))?,
            elevation: self.elevation.unwrap_or(0.0),
            distance: 0.0,
        })
    }
}

pub(crate) fn parse_number<T: std::str::FromStr>(field: &'static str, text: &str) -> Result<T> {
    text.trim()
        .parse::<T>()
        .map_err(|_| OverlayError::InvalidValue {
            field,
            value: text.to_string(),
        })
}

/// Run the event loop over `xml`, handing every point element to `finish`
fn read_points<T>(
    xml: &str,
    is_point: fn(&[u8]) -> bool,
    mut finish: impl FnMut(PendingPoint, usize) -> Result<T>,
) -> Result<Vec<T>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut points = Vec::new();
    let mut point: Option<PendingPoint> = None;
    let mut field: Option<PointField> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                if is_point(e.local_name().as_ref()) {
                    point = Some(PendingPoint::from_start(&e)?);
                } else if let Some(pending) = point.as_mut() {
                    if e.local_name().as_ref() == b"TrackPointExtension" {
                        pending.has_extension = true;
                    }
                    field = PointField::from_local_name(e.local_name().as_ref());
                }
            }
            Event::Empty(e) => {
                if is_point(e.local_name().as_ref()) {
                    let pending = PendingPoint::from_start(&e)?;
                    points.push(finish(pending, points.len())?);
                }
            }
            Event::Text(t) => {
                if let (Some(pending), Some(current)) = (point.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|err| OverlayError::Xml(err.to_string()))?;
                    pending.set(current, &text)?;
                }
            }
            Event::End(e) => {
                if is_point(e.local_name().as_ref()) {
                    if let Some(pending) = point.take() {
                        points.push(finish(pending, points.len())?);
                    }
                }
                field = None;
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(points)
}

/// Parse GPX track points from an XML string, ordered by time
pub fn parse_gpx_str(xml: &str) -> Result<Vec<GpsRecord>> {
    // Self-closing trkpt carries no time and fails in finish()
    let mut records = read_points(xml, |name| name == b"trkpt", PendingPoint::finish)?;

    // Stable: points sharing a timestamp keep document order
    records.sort_by_key(|r| r.time);
    debug!("Parsed {} GPX track points", records.len());
    Ok(records)
}

/// Parse the points of a planned route in document order
///
/// Accepts `rtept` as well as `trkpt`. Only `lat` and `lon` are required;
/// a point without `ele` sits at 0 m. Distances are left at 0.
pub fn parse_route_gpx_str(xml: &str) -> Result<Vec<RoutePoint>> {
    let points = read_points(
        xml,
        |name| name == b"trkpt" || name == b"rtept",
        PendingPoint::finish_route,
    )?;
    debug!("Parsed {} route points", points.len());
    Ok(points)
}

/// Parse a GPX file
pub fn parse_gpx(path: &Path) -> Result<Vec<GpsRecord>> {
    let xml = fs::read_to_string(path)?;
    parse_gpx_str(&xml)
}

/// Parse the planned route in a GPX file
pub fn parse_route_gpx(path: &Path) -> Result<Vec<RoutePoint>> {
    let xml = fs::read_to_string(path)?;
    parse_route_gpx_str(&xml)
}
