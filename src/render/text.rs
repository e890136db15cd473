//! Statistics text block
//!
//! Text needs a TrueType font registered with plotters. The font is looked
//! up once per process; without one the overlay is drawn without text.

use super::draw_err;
use crate::error::Result;
use crate::types::TrackSample;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontDesc, FontFamily, FontStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Family name the overlay font is registered under
pub const FONT_FAMILY: &str = "overlay-mono";

const DEFAULT_FONT_PATHS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono-Bold.ttf",
    "/Library/Fonts/DejaVuSansMono-Bold.ttf",
    "C:\\Windows\\Fonts\\consolab.ttf",
];

/// Pixels of black outline around each glyph
const OUTLINE: i32 = 2;

static REGISTERED_FONT: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Register the overlay font, trying `preferred` before the system defaults
///
/// Only the first call does any work; later calls return the same result
/// whatever path they pass.
pub fn load_overlay_font(preferred: Option<&Path>) -> Option<&'static Path> {
    REGISTERED_FONT
        .get_or_init(|| {
            let candidates = preferred
                .map(Path::to_path_buf)
                .into_iter()
                .chain(DEFAULT_FONT_PATHS.iter().map(PathBuf::from));

            for path in candidates {
                let Ok(bytes) = fs::read(&path) else {
                    continue;
                };
                // plotters keeps registered font data for the life of the process
                let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
                    Ok(()) => {
                        debug!("Using overlay font {}", path.display());
                        return Some(path);
                    }
                    Err(_) => warn!("Not a usable font: {}", path.display()),
                }
            }
            None
        })
        .as_deref()
}

fn reading(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{v:.0} {unit}"))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Lines of the statistics block for one sample
pub fn stats_lines(sample: &TrackSample) -> Vec<String> {
    vec![
        format!("Date:  {}", sample.time.format("%Y-%m-%d")),
        format!("UTC:   {}", sample.time.format("%H:%M:%S")),
        format!("Lat:   {:.5}", sample.latitude),
        format!("Long:  {:.5}", sample.longitude),
        format!("Elev:  {:.0} m", sample.elevation),
        format!("Temp:  {}", reading(sample.temperature, "°C")),
        format!("HR:    {}", reading(sample.heart_rate, "bpm")),
        format!("Cad:   {}", reading(sample.cadence, "rpm")),
        format!("Speed: {:.1} km/h", sample.speed),
        format!("Dist:  {:.3} km", sample.total_distance),
        format!("Asc:   {:.0} m", sample.total_ascent),
        format!("Desc:  {:.0} m", sample.total_descent),
    ]
}

/// Draw the statistics block with its top-left corner at `origin`
///
/// The overlay font must have been registered with [`load_overlay_font`].
pub fn draw_stats<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    font_size: u32,
    sample: &TrackSample,
    origin: (i32, i32),
) -> Result<()> {
    let font = FontDesc::new(FontFamily::Name(FONT_FAMILY), font_size as f64, FontStyle::Normal);
    let fill = font.clone().color(&WHITE);
    let outline = font.color(&BLACK);
    let line_height = (font_size as f64 * 1.3).round() as i32;

    for (row, line) in stats_lines(sample).iter().enumerate() {
        let (x, y) = (origin.0, origin.1 + row as i32 * line_height);
        for dx in -OUTLINE..=OUTLINE {
            for dy in -OUTLINE..=OUTLINE {
                if dx == 0 && dy == 0 {
                    continue;
                }
                area.draw(&Text::new(line.as_str(), (x + dx, y + dy), outline.clone()))
                    .map_err(draw_err)?;
            }
        }
        area.draw(&Text::new(line.as_str(), (x, y), fill.clone()))
            .map_err(draw_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::time::parse_timestamp;

    fn sample() -> TrackSample {
        TrackSample {
            time: parse_timestamp("2024-07-20T10:15:30.500Z").unwrap(),
            latitude: 50.7374123,
            longitude: 7.0982456,
            elevation: 101.6,
            temperature: Some(21.4),
            heart_rate: Some(131.7),
            cadence: None,
            speed: 24.46,
            total_distance: 12.34567,
            total_ascent: 250.2,
            total_descent: 180.9,
        }
    }

    #[test]
    fn test_stats_lines() {
        let lines = stats_lines(&sample());
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "Date:  2024-07-20");
        assert_eq!(lines[1], "UTC:   10:15:30");
        assert_eq!(lines[2], "Lat:   50.73741");
        assert_eq!(lines[3], "Long:  7.09825");
        assert_eq!(lines[4], "Elev:  102 m");
        assert_eq!(lines[5], "Temp:  21 °C");
        assert_eq!(lines[6], "HR:    132 bpm");
        assert_eq!(lines[7], "Cad:   N/A");
        assert_eq!(lines[8], "Speed: 24.5 km/h");
        assert_eq!(lines[9], "Dist:  12.346 km");
        assert_eq!(lines[10], "Asc:   250 m");
        assert_eq!(lines[11], "Desc:  181 m");
    }

    #[test]
    fn test_missing_font_file_is_skipped() {
        // Falls through to the system defaults; whatever is found, no panic
        let first = load_overlay_font(Some(Path::new("/nonexistent/font.ttf")));
        let second = load_overlay_font(None);
        assert_eq!(first, second);
    }
}
