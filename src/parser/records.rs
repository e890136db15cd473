//! Record CSV reading
//!
//! The CSV written by `extract`/`replace` is the handoff format between stages.

use crate::error::{OverlayError, Result};
use crate::types::GpsRecord;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Read records from any CSV source, rejecting rows that go back in time
pub fn read_records<R: Read>(reader: R) -> Result<Vec<GpsRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records: Vec<GpsRecord> = Vec::new();

    for (index, row) in csv_reader.deserialize::<GpsRecord>().enumerate() {
        let record = row?;
        if let Some(previous) = records.last() {
            if record.time < previous.time {
                return Err(OverlayError::Unordered { index });
            }
        }
        records.push(record);
    }

    Ok(records)
}

/// Read a record CSV file
pub fn read_records_csv(path: &Path) -> Result<Vec<GpsRecord>> {
    let file = std::fs::File::open(path)?;
    let records = read_records(std::io::BufReader::new(file))?;
    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "time,latitude,longitude,elevation,temperature,heart_rate,cadence,speed,total_distance,total_ascent,total_descent\n";

    #[test]
    fn test_read_records_with_empty_optionals() {
        let csv = format!(
            "{HEADER}2024-07-20T10:00:00.000Z,50.7,7.1,100.0,,,,0.0,0.0,0.0,0.0\n\
             2024-07-20T10:00:01.000Z,50.70001,7.1,101.0,21.0,120,80,4.0,0.01,1.0,0.0\n"
        );
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].temperature, None);
        assert_eq!(records[0].heart_rate, None);
        assert_eq!(records[1].heart_rate, Some(120));
        assert_eq!(records[1].total_distance, 0.01);
    }

    #[test]
    fn test_read_records_rejects_unordered_rows() {
        let csv = format!(
            "{HEADER}2024-07-20T10:00:01.000Z,50.7,7.1,100.0,,,,0.0,0.0,0.0,0.0\n\
             2024-07-20T10:00:00.000Z,50.7,7.1,100.0,,,,0.0,0.0,0.0,0.0\n"
        );
        assert!(matches!(
            read_records(csv.as_bytes()),
            Err(OverlayError::Unordered { index: 1 })
        ));
    }

    #[test]
    fn test_read_records_rejects_bad_timestamp() {
        let csv = format!("{HEADER}not-a-time,50.7,7.1,100.0,,,,0.0,0.0,0.0,0.0\n");
        assert!(matches!(read_records(csv.as_bytes()), Err(OverlayError::Csv(_))));
    }
}
