pub mod gpx;
pub mod records;
pub mod tcx;
pub mod time;

pub use gpx::{parse_gpx, parse_gpx_str, parse_route_gpx, parse_route_gpx_str};
pub use records::*;
pub use tcx::*;
pub use time::{format_timestamp, format_timestamp_precise, parse_timestamp, seconds_between};
