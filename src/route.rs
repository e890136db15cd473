//! Planned route shown behind the recorded track
//!
//! The map and elevation profile draw a route. By default that is the
//! recorded track itself; a separately planned route (GPX or record CSV)
//! can replace it, in which case the current position is placed on the
//! route point nearest to it.

use crate::conversion::{haversine_distance_m, meters_to_km};
use crate::error::{OverlayError, Result};
use crate::parser::gpx::parse_route_gpx;
use crate::parser::records::read_records_csv;
use crate::types::{GpsRecord, RoutePoint};
use std::path::Path;
use tracing::debug;

/// Ordered route points with cumulative distance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    points: Vec<RoutePoint>,
}

impl Route {
    /// Route through `points`, measuring distance along it from the first point
    pub fn from_positions(mut points: Vec<RoutePoint>) -> Self {
        let mut total_m = 0.0;
        for i in 0..points.len() {
            if i > 0 {
                let (prev, cur) = (&points[i - 1], &points[i]);
                total_m += haversine_distance_m(prev.latitude, prev.longitude, cur.latitude, cur.longitude);
            }
            points[i].distance = meters_to_km(total_m);
        }
        Self { points }
    }

    /// The recorded track as a route, keeping its computed distances
    pub fn from_records(records: &[GpsRecord]) -> Self {
        Self {
            points: records.iter().map(RoutePoint::from).collect(),
        }
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the route point closest to a position; the first one wins ties
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let d = haversine_distance_m(p.latitude, p.longitude, latitude, longitude);
            if best.map_or(true, |(_, min)| d < min) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Distance along the route of the point nearest to a position
    pub fn distance_at(&self, latitude: f64, longitude: f64) -> Option<f64> {
        self.nearest(latitude, longitude).map(|i| self.points[i].distance)
    }
}

/// Load a planned route from a `.gpx` file or a record CSV
pub fn load_route(path: &Path) -> Result<Route> {
    let is_gpx = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("gpx"));
    let route = if is_gpx {
        Route::from_positions(parse_route_gpx(path)?)
    } else {
        Route::from_records(&read_records_csv(path)?)
    };
    if route.is_empty() {
        return Err(OverlayError::EmptyTrack);
    }
    debug!("Loaded route of {} points from {}", route.len(), path.display());
    Ok(route)
}
