//! Overlay frame rendering
//!
//! A frame is a fixed-size RGB image filled with a chroma-key colour, with a
//! route map in the bottom-right corner, an elevation profile and a speed plot
//! stacked above it, and a statistics block in the top-right corner.

pub mod panels;
pub mod text;

pub use panels::MapBounds;
pub use text::{load_overlay_font, stats_lines};

use crate::error::{OverlayError, Result};
use crate::frames::{frame_file_name, interpolate_at, window, FrameSchedule, MAX_WINDOW_SECONDS};
use crate::route::Route;
use crate::types::{FrameFailure, FrameReport, GpsRecord, TrackSample};
use chrono::{DateTime, Utc};
use image::RgbImage;
use plotters::prelude::*;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Width reserved for the statistics block
const STATS_WIDTH: u32 = 260;
const STATS_TOP: i32 = 20;

pub(crate) fn draw_err<E: fmt::Display>(err: E) -> OverlayError {
    OverlayError::Render(err.to_string())
}

/// Chroma-key colour filling everything that is not overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    #[default]
    Blue,
    Green,
}

impl Background {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Background::Blue => [0, 0, 255],
            Background::Green => [0, 255, 0],
        }
    }

    fn color(self) -> RGBColor {
        let [r, g, b] = self.rgb();
        RGBColor(r, g, b)
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::Blue => write!(f, "blue"),
            Background::Green => write!(f, "green"),
        }
    }
}

impl std::str::FromStr for Background {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blue" => Ok(Background::Blue),
            "green" => Ok(Background::Green),
            other => Err(OverlayError::InvalidOption(format!("unknown background '{other}'"))),
        }
    }
}

/// Frame layout
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub background: Background,
    /// Route map size, anchored to the bottom-right corner
    pub map_size: (u32, u32),
    /// Size of the elevation profile and of the speed plot above it
    pub plot_size: (u32, u32),
    /// Font tried before the system defaults
    pub font_path: Option<PathBuf>,
    pub font_size: u32,
    /// Seconds either side of the frame shown in the speed plot
    pub window_seconds: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            background: Background::Blue,
            map_size: (400, 200),
            plot_size: (400, 100),
            font_path: None,
            font_size: 20,
            window_seconds: 60.0,
        }
    }
}

impl RenderOptions {
    /// Check that every panel fits on the canvas
    pub fn validate(&self) -> Result<()> {
        let (map_w, map_h) = self.map_size;
        let (plot_w, plot_h) = self.plot_size;
        if self.width == 0 || self.height == 0 {
            return Err(OverlayError::InvalidOption("frame size must be non-zero".to_string()));
        }
        if map_w.max(plot_w) > self.width || map_h + 2 * plot_h > self.height {
            return Err(OverlayError::InvalidOption(format!(
                "panels do not fit in a {}x{} frame",
                self.width, self.height
            )));
        }
        if !(self.window_seconds > 0.0 && self.window_seconds <= MAX_WINDOW_SECONDS) {
            return Err(OverlayError::InvalidOption(format!(
                "speed window must be between 0 and {} seconds, got {}",
                MAX_WINDOW_SECONDS, self.window_seconds
            )));
        }
        Ok(())
    }
}

/// Draws overlay frames with a fixed layout
#[derive(Debug)]
pub struct FrameRenderer {
    options: RenderOptions,
    font: Option<&'static Path>,
    /// Planned route replacing the recorded track on the map and profile
    route: Option<Route>,
}

impl FrameRenderer {
    pub fn new(options: RenderOptions) -> Result<Self> {
        options.validate()?;
        let font = load_overlay_font(options.font_path.as_deref());
        if font.is_none() {
            warn!("No usable font found; frames will have no statistics text");
        }
        Ok(Self {
            options,
            font,
            route: None,
        })
    }

    /// Draw the map and elevation profile from a planned route
    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Whether the statistics block is drawn
    pub fn has_text(&self) -> bool {
        self.font.is_some()
    }

    /// Draw one frame for an already interpolated sample
    ///
    /// `nearby` is the slice of records shown in the speed plot, usually
    /// [`window`] around the sample time. `records` is drawn as the route
    /// unless a planned route was set.
    pub fn render(
        &self,
        records: &[GpsRecord],
        sample: &TrackSample,
        nearby: &[GpsRecord],
    ) -> Result<RgbImage> {
        let RenderOptions {
            width,
            height,
            map_size: (map_w, map_h),
            plot_size: (plot_w, plot_h),
            ..
        } = self.options;

        let recorded;
        let (route, marker_distance) = match &self.route {
            Some(route) => (
                route,
                route
                    .distance_at(sample.latitude, sample.longitude)
                    .unwrap_or(sample.total_distance),
            ),
            None => {
                recorded = Route::from_records(records);
                (&recorded, sample.total_distance)
            }
        };

        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&self.options.background.color()).map_err(draw_err)?;

            let map_y = height - map_h;
            let map = root.clone().shrink((width - map_w, map_y), (map_w, map_h));
            panels::draw_route_map(&map, route.points(), sample)?;

            let profile_y = map_y - plot_h;
            let profile = root.clone().shrink((width - plot_w, profile_y), (plot_w, plot_h));
            panels::draw_elevation_profile(&profile, route.points(), marker_distance, sample)?;

            let speed_y = profile_y - plot_h;
            let speed = root.clone().shrink((width - plot_w, speed_y), (plot_w, plot_h));
            panels::draw_speed_plot(&speed, nearby, sample, self.options.window_seconds)?;

            if self.font.is_some() {
                let x = width.saturating_sub(STATS_WIDTH) as i32;
                text::draw_stats(&root, self.options.font_size, sample, (x, STATS_TOP))?;
            }

            root.present().map_err(draw_err)?;
        }

        RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| OverlayError::Render("frame buffer has the wrong size".to_string()))
    }

    /// Interpolate the track at `time` and draw the frame
    pub fn render_at(&self, records: &[GpsRecord], time: DateTime<Utc>) -> Result<RgbImage> {
        let sample = interpolate_at(records, time)?;
        let nearby = window(records, time, self.options.window_seconds);
        self.render(records, &sample, nearby)
    }
}

/// Render every frame of `schedule` into `output_dir` as numbered PNGs
///
/// Frames outside the recorded range are logged and reported as failed; the
/// remaining frames are still rendered. Any other error aborts the run.
pub fn render_frames(
    records: &[GpsRecord],
    schedule: &FrameSchedule,
    renderer: &FrameRenderer,
    output_dir: &Path,
) -> Result<FrameReport> {
    if records.is_empty() {
        return Err(OverlayError::EmptyTrack);
    }
    fs::create_dir_all(output_dir)?;

    let mut report = FrameReport::default();
    for slot in schedule.iter() {
        match renderer.render_at(records, slot.time) {
            Ok(frame) => {
                let path = output_dir.join(frame_file_name(slot.index));
                frame.save(&path)?;
                debug!("Generated frame: {}", path.display());
                report.rendered.push(path);
            }
            Err(OverlayError::OutOfRange(reason)) => {
                warn!("Skipping frame {}: {}", slot.index, reason);
                report.failed.push(FrameFailure {
                    index: slot.index,
                    time: slot.time,
                    reason,
                });
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        "Rendered {} of {} frames into {}",
        report.rendered.len(),
        report.total(),
        output_dir.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::time::parse_timestamp;
    use crate::types::RoutePoint;

    fn small_options() -> RenderOptions {
        RenderOptions {
            width: 320,
            height: 480,
            map_size: (120, 60),
            plot_size: (120, 40),
            ..RenderOptions::default()
        }
    }

    fn track() -> Vec<GpsRecord> {
        (0..5)
            .map(|s| {
                let time = parse_timestamp(&format!("2024-07-20T10:00:0{s}Z")).unwrap();
                let mut r = GpsRecord::new(time, 50.0 + s as f64 * 0.0001, 7.0, 100.0 + s as f64);
                r.speed = 20.0 + s as f64;
                r.total_distance = s as f64 * 0.011;
                r
            })
            .collect()
    }

    #[test]
    fn test_background_from_str() {
        assert_eq!("GREEN".parse::<Background>().unwrap(), Background::Green);
        assert_eq!("blue".parse::<Background>().unwrap().rgb(), [0, 0, 255]);
        assert!("magenta".parse::<Background>().is_err());
        assert_eq!(Background::Green.to_string().parse::<Background>().unwrap(), Background::Green);
    }

    #[test]
    fn test_validate_rejects_oversized_panels() {
        let mut options = small_options();
        options.map_size = (400, 60);
        assert!(options.validate().is_err());
        assert!(small_options().validate().is_ok());
        assert!(RenderOptions::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        for window_seconds in [0.0, -5.0, f64::NAN, f64::INFINITY, 1e13] {
            let options = RenderOptions {
                window_seconds,
                ..small_options()
            };
            assert!(options.validate().is_err(), "window {window_seconds} accepted");
        }
        let options = RenderOptions {
            window_seconds: MAX_WINDOW_SECONDS,
            ..small_options()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_render_dimensions_background_and_marker() {
        let renderer = FrameRenderer::new(small_options()).unwrap();
        let records = track();
        let frame = renderer
            .render_at(&records, parse_timestamp("2024-07-20T10:00:02.5Z").unwrap())
            .unwrap();

        assert_eq!(frame.dimensions(), (320, 480));
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 255]);
        // Marker lands somewhere inside the map panel
        let red_in_map = (200..320)
            .flat_map(|x| (420..480).map(move |y| (x, y)))
            .any(|(x, y)| frame.get_pixel(x, y).0 == [255, 0, 0]);
        assert!(red_in_map);
    }

    fn red_pixels(frame: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> Vec<(u32, u32)> {
        xs.flat_map(|x| ys.clone().map(move |y| (x, y)))
            .filter(|&(x, y)| frame.get_pixel(x, y).0 == [255, 0, 0])
            .collect()
    }

    #[test]
    fn test_planned_route_moves_profile_marker() {
        let records = track();
        let time = parse_timestamp("2024-07-20T10:00:04Z").unwrap();

        // Same line as the track but four times as long: the rider at its
        // first quarter should be marked a quarter of the way along
        let planned = Route::from_positions(
            (0..17)
                .map(|i| RoutePoint {
                    latitude: 50.0 + i as f64 * 0.0001,
                    longitude: 7.0,
                    elevation: 100.0 + i as f64,
                    distance: 0.0,
                })
                .collect(),
        );
        let nearest = planned.nearest(50.0004, 7.0).unwrap();
        assert_eq!(nearest, 4);

        let plain = FrameRenderer::new(small_options()).unwrap();
        let routed = FrameRenderer::new(small_options()).unwrap().with_route(planned);
        assert!(routed.route().is_some());

        // Profile panel: x 200..320, y 380..420
        let centre_x = |frame: &RgbImage| {
            let reds = red_pixels(frame, 200..320, 380..420);
            assert!(!reds.is_empty());
            reds.iter().map(|&(x, _)| x as f64).sum::<f64>() / reds.len() as f64
        };
        let plain_x = centre_x(&plain.render_at(&records, time).unwrap());
        let routed_x = centre_x(&routed.render_at(&records, time).unwrap());
        // End of the recorded track vs a quarter along the planned route
        assert!(plain_x > 290.0, "plain marker at {plain_x}");
        assert!(routed_x < 250.0, "routed marker at {routed_x}");
    }

    #[test]
    fn test_render_at_out_of_range() {
        let renderer = FrameRenderer::new(small_options()).unwrap();
        let result = renderer.render_at(&track(), parse_timestamp("2024-07-20T09:00:00Z").unwrap());
        assert!(matches!(result, Err(OverlayError::OutOfRange(_))));
    }
}
