//! GPS Overlay Library
//!
//! Turns GPX/TCX track recordings into flat CSV records, merges auxiliary
//! sensor data, renders chroma-key overlay frames (route map, elevation
//! profile, speed plot and a stats block) and assembles them into a video.
//!
//! # Features
//!
//! - **`cli`** (default): Build the command-line interface binary
//! - **`json`**: Enable the JSON track summary export
//!
//! # Quick Start
//!
//! Extract a GPX recording into a CSV file:
//! ```rust,no_run
//! use gps_overlay::{extract_track, write_records_csv, ExtractOptions};
//! use std::path::Path;
//!
//! let records = extract_track(Path::new("ride.gpx"), &ExtractOptions::default()).unwrap();
//! write_records_csv(&records, Path::new("ride.csv")).unwrap();
//! println!("Extracted {} records", records.len());
//! ```
//!
//! Render the overlay frames for one minute of the ride:
//! ```rust,no_run
//! use gps_overlay::{parse_timestamp, read_records_csv, render_frames, FrameRenderer, FrameSchedule, RenderOptions};
//! use std::path::Path;
//!
//! let records = read_records_csv(Path::new("ride.csv")).unwrap();
//! let start = parse_timestamp("2024-07-20T10:37:49.167Z").unwrap();
//! let end = parse_timestamp("2024-07-20T10:38:49.167Z").unwrap();
//! let schedule = FrameSchedule::new(start, end, 59.9401).unwrap();
//! let renderer = FrameRenderer::new(RenderOptions::default()).unwrap();
//! let report = render_frames(&records, &schedule, &renderer, Path::new("frames")).unwrap();
//! println!("Rendered {} frames", report.rendered.len());
//! ```
//!
//! # Public API
//!
//! ## Parsing Functions
//! - [`parse_gpx`] / [`parse_gpx_str`] - Read GPX track points
//! - [`parse_tcx`] / [`parse_tcx_str`] - Read TCX sensor trackpoints
//! - [`read_records_csv`] - Read a record CSV back
//! - [`load_route`] - Read a planned route from GPX or a record CSV
//! - [`parse_timestamp`] - Parse command-line and CSV timestamps
//!
//! ## Processing Functions
//! - [`extract_track`] - Parse, gap-fill and compute metrics for a GPX file
//! - [`fill_gaps`] / [`compute_metrics`] - The individual extraction steps
//! - [`replace_with_sensor`] - Overwrite speed/distance from sensor data
//! - [`interpolate_at`] - Interpolate a record at an arbitrary timestamp
//!
//! ## Output Functions
//! - [`write_records_csv`] - Write records as CSV
//! - [`render_frames`] - Render the overlay frames of a [`FrameSchedule`]
//! - [`create_video`] - Encode a frame directory with ffmpeg
//! - [`run_parallel`] - Render a schedule in several child processes

// Module declarations
pub mod conversion;
pub mod driver;
pub mod error;
pub mod export;
pub mod extract;
pub mod frames;
pub mod parser;
pub mod render;
pub mod replace;
pub mod route;
pub mod types;
pub mod video;

pub use conversion::*;
pub use driver::*;
pub use error::*;
pub use export::*;
pub use extract::*;
pub use frames::*;
pub use parser::*;
pub use render::*;
pub use replace::*;
pub use route::*;
pub use types::*;
pub use video::*;
