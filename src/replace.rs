//! Sensor merge: overwrite GPS speed/distance with wheel-sensor readings
//!
//! GPS-derived speed is noisy at low speed and under tree cover. When a
//! TCX recording with a speed sensor exists for the same ride, its speed and
//! distance replace the GPS values record by record.

use crate::conversion::{meters_to_km, round_to};
use crate::error::Result;
use crate::export::write_records_csv;
use crate::parser::records::read_records_csv;
use crate::parser::tcx::parse_tcx;
use crate::types::{GpsRecord, SensorRecord};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, info};

/// Options for [`replace_with_sensor`]
#[derive(Debug, Clone)]
pub struct ReplaceOptions {
    /// Largest distance in time between a GPS record and the sensor sample
    /// that may overwrite it
    pub max_offset: Duration,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            max_offset: Duration::seconds(1),
        }
    }
}

/// Counts of records that were and were not overwritten
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    pub matched: usize,
    pub unmatched: usize,
}

/// Regrid sensor samples to one per second; fillers carry distance at zero speed
pub fn fill_sensor_gaps(records: &[SensorRecord]) -> Vec<SensorRecord> {
    let step = Duration::seconds(1);
    let mut filled = Vec::with_capacity(records.len());

    for pair in records.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        filled.push(before.clone());

        let mut current = before.time;
        while after.time - current > step {
            current += step;
            filled.push(SensorRecord {
                time: current,
                speed: 0.0,
                distance: before.distance,
            });
        }
    }

    if let Some(last) = records.last() {
        filled.push(last.clone());
    }
    filled
}

/// Sensor sample closest in time; ties go to the earlier sample
///
/// `sensor` must be ordered by time.
pub fn nearest_sensor(sensor: &[SensorRecord], time: DateTime<Utc>) -> Option<&SensorRecord> {
    let after = sensor.partition_point(|s| s.time < time);
    let later = sensor.get(after);
    let earlier = after.checked_sub(1).and_then(|i| sensor.get(i));

    match (earlier, later) {
        (Some(earlier), Some(later)) => {
            if later.time - time < time - earlier.time {
                Some(later)
            } else {
                Some(earlier)
            }
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

/// Overwrite speed and total distance of every GPS record that has a sensor
/// sample within `options.max_offset`
///
/// The record count and order never change.
pub fn replace_with_sensor(
    gps: &mut [GpsRecord],
    sensor: &[SensorRecord],
    options: &ReplaceOptions,
) -> ReplaceReport {
    let mut report = ReplaceReport::default();

    for record in gps.iter_mut() {
        match nearest_sensor(sensor, record.time) {
            Some(sample) if (sample.time - record.time).abs() <= options.max_offset => {
                record.speed = sample.speed;
                record.total_distance = round_to(meters_to_km(sample.distance), 3);
                report.matched += 1;
            }
            _ => report.unmatched += 1,
        }
    }

    report
}

/// Read a TCX file and a record CSV, merge them and write the result
pub fn replace_file(
    tcx_path: &Path,
    gps_csv: &Path,
    output_csv: &Path,
    options: &ReplaceOptions,
) -> Result<ReplaceReport> {
    let sensor = fill_sensor_gaps(&parse_tcx(tcx_path)?);
    let mut records = read_records_csv(gps_csv)?;
    debug!(
        "Merging {} sensor samples into {} GPS records",
        sensor.len(),
        records.len()
    );

    let report = replace_with_sensor(&mut records, &sensor, options);
    write_records_csv(&records, output_csv)?;
    info!(
        "Replaced speed/distance in {} of {} records",
        report.matched,
        records.len()
    );
    Ok(report)
}
