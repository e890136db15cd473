//! Integration tests for the track pipeline
//!
//! Covers GPX extraction to CSV, reading the CSV back and merging TCX sensor
//! readings into it:
//! - Round trip keeps record count and time order
//! - Gaps are filled with one record per second
//! - Sensor merge keeps the record count and copies the nearest sample

use gps_overlay::{
    extract_track, read_records_csv, replace_file, write_records_csv, ExtractOptions, GapFill,
    OverlayError, ReplaceOptions,
};
use std::fs;
use tempfile::TempDir;

const RIDE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"
     xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk>
    <name>Morning ride</name>
    <trkseg>
      <trkpt lat="50.7370000" lon="7.0980000">
        <ele>100.0</ele>
        <time>2024-07-20T10:00:00Z</time>
        <extensions><gpxtpx:TrackPointExtension>
          <gpxtpx:atemp>20</gpxtpx:atemp><gpxtpx:hr>110</gpxtpx:hr><gpxtpx:cad>80</gpxtpx:cad>
        </gpxtpx:TrackPointExtension></extensions>
      </trkpt>
      <trkpt lat="50.7371000" lon="7.0980000">
        <ele>101.0</ele>
        <time>2024-07-20T10:00:01Z</time>
        <extensions><gpxtpx:TrackPointExtension>
          <gpxtpx:atemp>20</gpxtpx:atemp><gpxtpx:hr>112</gpxtpx:hr><gpxtpx:cad>82</gpxtpx:cad>
        </gpxtpx:TrackPointExtension></extensions>
      </trkpt>
      <trkpt lat="50.7375000" lon="7.0980000">
        <ele>103.0</ele>
        <time>2024-07-20T10:00:05Z</time>
        <extensions><gpxtpx:TrackPointExtension>
          <gpxtpx:atemp>21</gpxtpx:atemp><gpxtpx:hr>120</gpxtpx:hr><gpxtpx:cad>85</gpxtpx:cad>
        </gpxtpx:TrackPointExtension></extensions>
      </trkpt>
      <trkpt lat="50.7376000" lon="7.0980000">
        <ele>102.0</ele>
        <time>2024-07-20T10:00:06Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

const RIDE_TCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"
    xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities><Activity Sport="Biking"><Lap StartTime="2024-07-20T10:00:00Z">
    <DistanceMeters>60.0</DistanceMeters>
    <Track>
      <Trackpoint>
        <Time>2024-07-20T10:00:00Z</Time>
        <DistanceMeters>0.0</DistanceMeters>
        <Extensions><ns3:TPX><ns3:Speed>5.0</ns3:Speed></ns3:TPX></Extensions>
      </Trackpoint>
      <Trackpoint>
        <Time>2024-07-20T10:00:02Z</Time>
        <DistanceMeters>10.5</DistanceMeters>
        <Extensions><ns3:TPX><ns3:Speed>5.5</ns3:Speed></ns3:TPX></Extensions>
      </Trackpoint>
      <Trackpoint>
        <Time>2024-07-20T10:00:03Z</Time>
        <DistanceMeters>16.25</DistanceMeters>
        <Extensions><ns3:TPX><ns3:Speed>6.0</ns3:Speed></ns3:TPX></Extensions>
      </Trackpoint>
    </Track>
  </Lap></Activity></Activities>
</TrainingCenterDatabase>
"#;

fn write_input(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write input file");
    path
}

#[test]
fn test_extract_round_trip_preserves_count_and_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gpx = write_input(&temp_dir, "ride.gpx", RIDE_GPX);
    let csv = temp_dir.path().join("out").join("ride.csv");

    let records = extract_track(&gpx, &ExtractOptions::default()).expect("Extraction should succeed");
    // 4 points, 3 missing seconds between 10:00:01 and 10:00:05
    assert_eq!(records.len(), 7);

    write_records_csv(&records, &csv).expect("CSV export should create the output directory");
    let back = read_records_csv(&csv).expect("CSV should read back");

    assert_eq!(back.len(), records.len());
    assert!(back.windows(2).all(|pair| pair[0].time < pair[1].time));
    assert_eq!(back, records);
}

#[test]
fn test_extract_fills_gap_between_neighbours() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gpx = write_input(&temp_dir, "ride.gpx", RIDE_GPX);

    let records = extract_track(&gpx, &ExtractOptions::default()).unwrap();
    let gap = &records[1..=5];
    for pair in gap.windows(2) {
        assert!(pair[1].latitude >= pair[0].latitude);
        assert!(pair[1].heart_rate >= pair[0].heart_rate);
    }
    for synthetic in &records[2..5] {
        assert!(synthetic.latitude > 50.7371 && synthetic.latitude < 50.7375);
        assert_eq!(synthetic.cadence, Some(0));
    }
    // The last point has no extensions
    assert_eq!(records[6].heart_rate, None);
    assert!(records[6].total_distance >= records[5].total_distance);
}

#[test]
fn test_extract_hold_mode_keeps_position_in_gap() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gpx = write_input(&temp_dir, "ride.gpx", RIDE_GPX);

    let options = ExtractOptions {
        gap_fill: GapFill::Hold,
    };
    let records = extract_track(&gpx, &options).unwrap();
    assert_eq!(records.len(), 7);
    assert!(records[2..5].iter().all(|r| r.latitude == 50.7371));
}

#[test]
fn test_extract_empty_track_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gpx = write_input(
        &temp_dir,
        "empty.gpx",
        r#"<gpx version="1.1"><trk><trkseg></trkseg></trk></gpx>"#,
    );
    assert!(matches!(
        extract_track(&gpx, &ExtractOptions::default()),
        Err(OverlayError::EmptyTrack)
    ));
}

#[test]
fn test_extract_missing_file_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let result = extract_track(&temp_dir.path().join("missing.gpx"), &ExtractOptions::default());
    assert!(matches!(result, Err(OverlayError::Io(_))));
}

#[test]
fn test_replace_keeps_count_and_uses_nearest_sensor_sample() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gpx = write_input(&temp_dir, "ride.gpx", RIDE_GPX);
    let tcx = write_input(&temp_dir, "ride.tcx", RIDE_TCX);
    let csv = temp_dir.path().join("ride.csv");
    let merged = temp_dir.path().join("ride.merged.csv");

    let records = extract_track(&gpx, &ExtractOptions::default()).unwrap();
    write_records_csv(&records, &csv).unwrap();

    let report = replace_file(&tcx, &csv, &merged, &ReplaceOptions::default()).expect("Merge should succeed");
    let out = read_records_csv(&merged).unwrap();

    assert_eq!(out.len(), records.len());
    assert_eq!(report.matched + report.unmatched, records.len());
    assert!(out.iter().zip(&records).all(|(a, b)| a.time == b.time));

    // 10:00:00 → 5.0 m/s, 0 m
    assert_eq!(out[0].speed, 18.0);
    assert_eq!(out[0].total_distance, 0.0);
    // 10:00:01 is a filled sensor second: zero speed, previous distance
    assert_eq!(out[1].speed, 0.0);
    assert_eq!(out[1].total_distance, 0.0);
    // 10:00:03 → 6.0 m/s = 21.6 km/h, 16.25 m
    assert_eq!(out[3].speed, 21.6);
    assert_eq!(out[3].total_distance, 0.016);
    // 10:00:04 is 1 s from the last sample and still within tolerance
    assert_eq!(out[4].speed, 21.6);
    // 10:00:05 and later are too far away and keep their GPS values
    assert_eq!(out[5].speed, records[5].speed);
    assert_eq!(out[6].total_distance, records[6].total_distance);
    assert_eq!(report.unmatched, 2);
}
