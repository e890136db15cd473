//! Plot panels composed into an overlay frame
//!
//! Each panel draws onto its own sub-area with a white line and black border
//! over the chroma background, and marks the current position in red.

use super::draw_err;
use crate::error::Result;
use crate::types::{GpsRecord, RoutePoint, TrackSample};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;

const PANEL_MARGIN: u32 = 6;
const MARKER_RADIUS: u32 = 5;
const BORDER_WIDTH: u32 = 4;
const LINE_WIDTH: u32 = 2;

/// Axis ranges giving a route equal metric scale on both axes
#[derive(Debug, Clone, PartialEq)]
pub struct MapBounds {
    pub longitude: Range<f64>,
    pub latitude: Range<f64>,
}

impl MapBounds {
    /// Fit the route into a `width` x `height` pixel panel without distortion
    pub fn fit(route: &[RoutePoint], width: u32, height: u32) -> Self {
        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
        for r in route {
            min_lat = min_lat.min(r.latitude);
            max_lat = max_lat.max(r.latitude);
            min_lon = min_lon.min(r.longitude);
            max_lon = max_lon.max(r.longitude);
        }
        if route.is_empty() {
            (min_lat, max_lat, min_lon, max_lon) = (0.0, 0.0, 0.0, 0.0);
        }

        let center_lat = (min_lat + max_lat) / 2.0;
        let center_lon = (min_lon + max_lon) / 2.0;
        // Degrees of longitude shrink towards the poles
        let lon_scale = center_lat.to_radians().cos().max(1e-6);
        let (width, height) = (width.max(1) as f64, height.max(1) as f64);

        let degrees_per_pixel = (((max_lon - min_lon) * lon_scale) / width)
            .max((max_lat - min_lat) / height)
            .max(1e-7)
            * 1.05;
        let half_lon = degrees_per_pixel * width / 2.0 / lon_scale;
        let half_lat = degrees_per_pixel * height / 2.0;

        Self {
            longitude: (center_lon - half_lon)..(center_lon + half_lon),
            latitude: (center_lat - half_lat)..(center_lat + half_lat),
        }
    }
}

/// Pad a value range by 10% and never let it collapse to a point
fn padded(min: f64, max: f64) -> Range<f64> {
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let pad = ((max - min) * 0.1).max(0.5);
    (min - pad)..(max + pad)
}

/// Whole route in map projection with the current position
pub fn draw_route_map<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    route: &[RoutePoint],
    current: &TrackSample,
) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    let bounds = MapBounds::fit(route, width, height);
    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .build_cartesian_2d(bounds.longitude, bounds.latitude)
        .map_err(draw_err)?;

    let line: Vec<(f64, f64)> = route.iter().map(|r| (r.longitude, r.latitude)).collect();
    chart
        .draw_series(LineSeries::new(line.iter().copied(), BLACK.stroke_width(BORDER_WIDTH)))
        .map_err(draw_err)?;
    chart
        .draw_series(LineSeries::new(line.iter().copied(), WHITE.stroke_width(LINE_WIDTH)))
        .map_err(draw_err)?;
    chart
        .draw_series(std::iter::once(Circle::new(
            (current.longitude, current.latitude),
            MARKER_RADIUS,
            RED.filled(),
        )))
        .map_err(draw_err)?;
    Ok(())
}

/// Elevation against distance for the whole route
///
/// The marker sits at `marker_distance` km along the route, at the current
/// elevation.
pub fn draw_elevation_profile<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    route: &[RoutePoint],
    marker_distance: f64,
    current: &TrackSample,
) -> Result<()> {
    let max_distance = route.iter().map(|r| r.distance).fold(0.0, f64::max);
    let min_elevation = route.iter().map(|r| r.elevation).fold(f64::INFINITY, f64::min);
    let max_elevation = route.iter().map(|r| r.elevation).fold(f64::NEG_INFINITY, f64::max);

    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .build_cartesian_2d(0.0..max_distance.max(0.001), padded(min_elevation, max_elevation))
        .map_err(draw_err)?;

    let line: Vec<(f64, f64)> = route.iter().map(|r| (r.distance, r.elevation)).collect();
    chart
        .draw_series(LineSeries::new(line.iter().copied(), BLACK.stroke_width(BORDER_WIDTH)))
        .map_err(draw_err)?;
    chart
        .draw_series(LineSeries::new(line.iter().copied(), WHITE.stroke_width(LINE_WIDTH)))
        .map_err(draw_err)?;
    chart
        .draw_series(std::iter::once(Circle::new(
            (marker_distance, current.elevation),
            MARKER_RADIUS,
            RED.filled(),
        )))
        .map_err(draw_err)?;
    Ok(())
}

/// Speed over the records around the current time; x is seconds from now
pub fn draw_speed_plot<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    nearby: &[GpsRecord],
    current: &TrackSample,
    window_seconds: f64,
) -> Result<()> {
    let half = window_seconds.max(1.0);
    let top = nearby
        .iter()
        .map(|r| r.speed)
        .fold(current.speed, f64::max)
        .max(1.0)
        * 1.1;

    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .build_cartesian_2d(-half..half, 0.0..top)
        .map_err(draw_err)?;

    let line: Vec<(f64, f64)> = nearby
        .iter()
        .map(|r| {
            let offset = crate::parser::time::seconds_between(current.time, r.time);
            (offset, r.speed)
        })
        .collect();
    chart
        .draw_series(LineSeries::new(line.iter().copied(), BLACK.stroke_width(BORDER_WIDTH)))
        .map_err(draw_err)?;
    chart
        .draw_series(LineSeries::new(line.iter().copied(), WHITE.stroke_width(LINE_WIDTH)))
        .map_err(draw_err)?;
    chart
        .draw_series(std::iter::once(Circle::new(
            (0.0, current.speed),
            MARKER_RADIUS,
            RED.filled(),
        )))
        .map_err(draw_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::haversine_distance_m;

    fn point(latitude: f64, longitude: f64) -> RoutePoint {
        RoutePoint {
            latitude,
            longitude,
            elevation: 0.0,
            distance: 0.0,
        }
    }

    #[test]
    fn test_map_bounds_keep_metric_aspect() {
        let route = vec![point(60.0, 10.0), point(60.01, 10.05)];
        let bounds = MapBounds::fit(&route, 400, 200);

        let lat = 60.005;
        let width_m = haversine_distance_m(lat, bounds.longitude.start, lat, bounds.longitude.end);
        let height_m = haversine_distance_m(bounds.latitude.start, 10.0, bounds.latitude.end, 10.0);
        // 400 x 200 px panel: twice as wide as tall in metres
        assert!((width_m / height_m - 2.0).abs() < 0.01, "ratio {}", width_m / height_m);

        for r in &route {
            assert!(bounds.longitude.contains(&r.longitude));
            assert!(bounds.latitude.contains(&r.latitude));
        }
    }

    #[test]
    fn test_map_bounds_single_point_is_not_degenerate() {
        let bounds = MapBounds::fit(&[point(50.0, 7.0)], 400, 200);
        assert!(bounds.longitude.end > bounds.longitude.start);
        assert!(bounds.latitude.end > bounds.latitude.start);
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded(100.0, 100.0), 99.5..100.5);
        assert_eq!(padded(f64::INFINITY, f64::NEG_INFINITY), 0.0..1.0);
        let r = padded(0.0, 100.0);
        assert_eq!(r, -10.0..110.0);
    }
}
