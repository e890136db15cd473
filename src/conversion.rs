//! Unit conversion and geodesy helpers
//!
//! Contains the conversions shared by extraction, sensor replacement and
//! frame rendering so every stage rounds and scales values the same way.

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two positions in metres
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Convert metres per second to kilometres per hour
pub fn mps_to_kmh(speed_mps: f64) -> f64 {
    speed_mps * 3.6
}

/// Convert metres to kilometres
pub fn meters_to_km(meters: f64) -> f64 {
    meters / 1000.0
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Linear interpolation between two values
pub fn lerp(from: f64, to: f64, ratio: f64) -> f64 {
    from + (to - from) * ratio
}

/// Interpolate two optional readings; absent when either side is absent
pub fn lerp_optional(from: Option<f64>, to: Option<f64>, ratio: f64) -> Option<f64> {
    match (from, to) {
        (Some(from), Some(to)) => Some(lerp(from, to, ratio)),
        _ => None,
    }
}
