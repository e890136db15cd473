//! Export functionality for track records
//!
//! Writes the record CSV shared by every stage and, with the `json` feature,
//! a JSON summary next to it.

use crate::error::Result;
use crate::types::GpsRecord;
#[cfg(feature = "json")]
use crate::types::TrackSummary;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write records with a header row to any writer
pub fn write_records<W: Write>(records: &[GpsRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write records to a CSV file, creating the parent directory if needed
pub fn write_records_csv(records: &[GpsRecord], output_path: &Path) -> Result<()> {
    ensure_parent_dir(output_path)?;
    let file = fs::File::create(output_path)?;
    write_records(records, std::io::BufWriter::new(file))?;
    debug!("Wrote {} records to {}", records.len(), output_path.display());
    Ok(())
}

/// Sibling path of the CSV used for the JSON summary (`ride.csv` → `ride.summary.json`)
pub fn summary_path_for(csv_path: &Path) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("track");
    csv_path.with_file_name(format!("{stem}.summary.json"))
}

/// Write a track summary as pretty-printed JSON
#[cfg(feature = "json")]
pub fn write_summary_json(summary: &TrackSummary, output_path: &Path) -> Result<()> {
    ensure_parent_dir(output_path)?;
    let json = serde_json::to_string_pretty(summary)
        .map_err(|err| crate::error::OverlayError::InvalidValue {
            field: "summary",
            value: err.to_string(),
        })?;
    fs::write(output_path, json)?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            debug!("Created output directory: {parent:?}");
        }
    }
    Ok(())
}
