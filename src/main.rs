use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gps_overlay::{
    create_video, extract_track, frame_file_name, load_route, parse_timestamp, read_records_csv,
    render_frames, replace_file, run_parallel, write_records_csv, Background, ExtractOptions,
    FrameRenderer, FrameSchedule, GapFill, GpsRecord, ParallelPlan, RenderOptions, ReplaceOptions,
    Route, VideoOptions,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FPS_ARG: &str = "59.9401";

/// Git revision the binary was built from, as emitted by build.rs
fn build_revision() -> String {
    let sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown");
    let date = option_env!("VERGEN_GIT_COMMIT_DATE").unwrap_or("unknown");
    format!("{sha} {date}")
}

fn path_arg(name: &'static str, help: &'static str, index: usize) -> Arg {
    Arg::new(name)
        .help(help)
        .required(true)
        .index(index)
        .value_parser(value_parser!(PathBuf))
}

fn time_arg(name: &'static str, help: &'static str, index: usize) -> Arg {
    Arg::new(name)
        .help(help)
        .required(true)
        .index(index)
        .value_parser(parse_timestamp)
}

fn fps_arg() -> Arg {
    Arg::new("fps")
        .long("fps")
        .help("Frames per second")
        .value_name("F")
        .default_value(DEFAULT_FPS_ARG)
        .value_parser(value_parser!(f64))
}

fn output_dir_arg() -> Arg {
    Arg::new("output-dir")
        .long("output-dir")
        .help("Directory the frames are written to")
        .value_name("DIR")
        .default_value("frames")
        .value_parser(value_parser!(PathBuf))
}

fn render_args() -> [Arg; 4] {
    [
        Arg::new("font")
            .long("font")
            .help("TrueType font for the statistics text (default: DejaVu Sans Mono Bold)")
            .value_name("PATH")
            .value_parser(value_parser!(PathBuf)),
        Arg::new("background")
            .long("background")
            .help("Chroma-key background colour: blue or green")
            .default_value("blue")
            .value_parser(str::parse::<Background>),
        Arg::new("window")
            .long("window")
            .help("Seconds either side of each frame shown in the speed plot")
            .value_name("SECONDS")
            .default_value("60")
            .value_parser(value_parser!(f64)),
        Arg::new("route")
            .long("route")
            .help("Planned route (GPX or record CSV) drawn on the map and elevation profile")
            .value_name("PATH")
            .value_parser(value_parser!(PathBuf)),
    ]
}

fn cleanup_arg() -> Arg {
    Arg::new("cleanup")
        .long("cleanup")
        .help("Delete the frames after the video has been written")
        .action(ArgAction::SetTrue)
}

fn build_command() -> Command {
    let extract = Command::new("extract")
        .about("Convert a GPX track to a record CSV, filling gaps and computing speed/distance")
        .arg(path_arg("gpx", "GPX file to read", 1))
        .arg(path_arg("csv", "CSV file to write", 2))
        .arg(
            Arg::new("gap-fill")
                .long("gap-fill")
                .help("How missing seconds are filled: interpolate or hold")
                .default_value("interpolate")
                .value_parser(str::parse::<GapFill>),
        );
    #[cfg(feature = "json")]
    let extract = extract.arg(
        Arg::new("json")
            .long("json")
            .help("Also write a JSON summary next to the CSV")
            .action(ArgAction::SetTrue),
    );

    Command::new("gps_overlay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn GPS tracks into chroma-key overlay frames and videos")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug output")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(extract)
        .subcommand(
            Command::new("replace")
                .about("Overwrite speed and distance in a record CSV with TCX sensor readings")
                .arg(path_arg("tcx", "TCX file with sensor speed/distance", 1))
                .arg(path_arg("gps-csv", "Record CSV to update", 2))
                .arg(path_arg("out-csv", "CSV file to write", 3))
                .arg(
                    Arg::new("max-offset")
                        .long("max-offset")
                        .help("Largest time difference between a record and its sensor sample")
                        .value_name("SECONDS")
                        .default_value("1")
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new("frames")
                .about("Render overlay frames for a time range")
                .arg(path_arg("csv", "Record CSV to read", 1))
                .arg(time_arg("start", "First frame timestamp (UTC)", 2))
                .arg(time_arg("end", "Last frame timestamp (UTC)", 3))
                .arg(fps_arg())
                .arg(
                    Arg::new("origin")
                        .long("origin")
                        .help("Timestamp of frame 0 (default: start)")
                        .value_name("T")
                        .value_parser(parse_timestamp),
                )
                .arg(output_dir_arg())
                .args(render_args())
                .arg(
                    Arg::new("allow-empty")
                        .long("allow-empty")
                        .help("Succeed even when no frame lies within the GPS data")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("video")
                .about("Encode a directory of frames into an MP4 with ffmpeg")
                .arg(path_arg("frame-dir", "Directory holding the PNG frames", 1))
                .arg(path_arg("output", "MP4 file to write", 2))
                .arg(fps_arg())
                .arg(cleanup_arg()),
        )
        .subcommand(
            Command::new("parallel")
                .about("Render frames with several processes, then optionally encode the video")
                .arg(path_arg("csv", "Record CSV to read", 1))
                .arg(time_arg("start", "First frame timestamp (UTC)", 2))
                .arg(time_arg("end", "Last frame timestamp (UTC)", 3))
                .arg(
                    Arg::new("jobs")
                        .long("jobs")
                        .short('j')
                        .help("Number of processes (default: available CPUs)")
                        .value_name("N")
                        .value_parser(value_parser!(usize)),
                )
                .arg(fps_arg())
                .arg(output_dir_arg())
                .args(render_args())
                .arg(
                    Arg::new("video")
                        .long("video")
                        .help("Encode the frames into this MP4 file afterwards")
                        .value_name("OUT.mp4")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(cleanup_arg()),
        )
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn required<'a, T: Clone + Send + Sync + 'static>(matches: &'a ArgMatches, name: &str) -> Result<&'a T> {
    matches
        .get_one::<T>(name)
        .with_context(|| format!("Missing argument '{name}'"))
}

fn run_extract(matches: &ArgMatches) -> Result<()> {
    let gpx: &PathBuf = required(matches, "gpx")?;
    let csv: &PathBuf = required(matches, "csv")?;
    let options = ExtractOptions {
        gap_fill: *required::<GapFill>(matches, "gap-fill")?,
    };

    let records = extract_track(gpx, &options)
        .with_context(|| format!("Failed to extract track from {}", gpx.display()))?;
    write_records_csv(&records, csv).with_context(|| format!("Failed to write {}", csv.display()))?;
    println!("Exported {} records to: {}", records.len(), csv.display());

    #[cfg(feature = "json")]
    if matches.get_flag("json") {
        let summary = gps_overlay::TrackSummary::from_records(&records);
        let path = gps_overlay::summary_path_for(csv);
        gps_overlay::write_summary_json(&summary, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported summary to: {}", path.display());
    }
    Ok(())
}

fn run_replace(matches: &ArgMatches) -> Result<()> {
    let tcx: &PathBuf = required(matches, "tcx")?;
    let gps_csv: &PathBuf = required(matches, "gps-csv")?;
    let out_csv: &PathBuf = required(matches, "out-csv")?;
    let max_offset = *required::<f64>(matches, "max-offset")?;
    if !max_offset.is_finite() || max_offset < 0.0 {
        bail!("--max-offset must be a non-negative number of seconds");
    }
    let options = ReplaceOptions {
        max_offset: chrono::Duration::milliseconds((max_offset * 1000.0).round() as i64),
    };

    let report = replace_file(tcx, gps_csv, out_csv, &options).with_context(|| {
        format!(
            "Failed to merge {} into {}",
            tcx.display(),
            gps_csv.display()
        )
    })?;
    if report.unmatched > 0 {
        warn!(
            "{} records had no sensor sample within {max_offset} s and were left unchanged",
            report.unmatched
        );
    }
    println!(
        "Exported {} records to: {}",
        report.matched + report.unmatched,
        out_csv.display()
    );
    Ok(())
}

fn render_options(matches: &ArgMatches) -> Result<RenderOptions> {
    Ok(RenderOptions {
        background: *required::<Background>(matches, "background")?,
        font_path: matches.get_one::<PathBuf>("font").cloned(),
        window_seconds: *required::<f64>(matches, "window")?,
        ..RenderOptions::default()
    })
}

fn planned_route(matches: &ArgMatches) -> Result<Option<Route>> {
    matches
        .get_one::<PathBuf>("route")
        .map(|path| {
            load_route(path).with_context(|| format!("Failed to read route {}", path.display()))
        })
        .transpose()
}

fn no_frames_in_range(frames: usize, csv: &Path) -> String {
    format!(
        "None of the {} frames lie within the GPS data of {}",
        frames,
        csv.display()
    )
}

/// Frames of `schedule` between the first and last record
fn frames_in_range(schedule: &FrameSchedule, records: &[GpsRecord]) -> usize {
    match (records.first(), records.last()) {
        (Some(first), Some(last)) => schedule
            .iter()
            .filter(|slot| slot.time >= first.time && slot.time <= last.time)
            .count(),
        _ => 0,
    }
}

fn time_range(matches: &ArgMatches) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    Ok((
        *required::<DateTime<Utc>>(matches, "start")?,
        *required::<DateTime<Utc>>(matches, "end")?,
    ))
}

fn run_frames(matches: &ArgMatches) -> Result<()> {
    let csv: &PathBuf = required(matches, "csv")?;
    let output_dir: &PathBuf = required(matches, "output-dir")?;
    let (start, end) = time_range(matches)?;
    let fps = *required::<f64>(matches, "fps")?;

    let mut schedule = FrameSchedule::new(start, end, fps)?;
    if let Some(origin) = matches.get_one::<DateTime<Utc>>("origin") {
        schedule = schedule.with_origin(*origin)?;
    }
    debug!(
        "Frames {}..{} at {:.4} fps",
        schedule.first_index(),
        schedule.first_index() + schedule.len(),
        schedule.fps()
    );

    let records =
        read_records_csv(csv).with_context(|| format!("Failed to read {}", csv.display()))?;
    let mut renderer = FrameRenderer::new(render_options(matches)?)?;
    if let Some(route) = planned_route(matches)? {
        renderer = renderer.with_route(route);
    }
    let report = render_frames(&records, &schedule, &renderer, output_dir)
        .with_context(|| format!("Failed to render frames into {}", output_dir.display()))?;

    if report.rendered.is_empty() {
        let reason = no_frames_in_range(report.total(), csv);
        if !matches.get_flag("allow-empty") {
            bail!(reason);
        }
        warn!("{reason}");
    }
    if !report.failed.is_empty() {
        warn!("{} frames were outside the GPS data and skipped", report.failed.len());
    }
    println!(
        "Exported {} frames to: {}",
        report.rendered.len(),
        output_dir.display()
    );
    Ok(())
}

fn run_video(matches: &ArgMatches) -> Result<()> {
    let frame_dir: &PathBuf = required(matches, "frame-dir")?;
    let output: &PathBuf = required(matches, "output")?;
    let options = VideoOptions {
        fps: *required::<f64>(matches, "fps")?,
        cleanup: matches.get_flag("cleanup"),
        ..VideoOptions::default()
    };

    let frames = create_video(frame_dir, output, &options)
        .with_context(|| format!("Failed to create video from {}", frame_dir.display()))?;
    println!("Exported video of {frames} frames to: {}", output.display());
    Ok(())
}

fn run_parallel_frames(matches: &ArgMatches, debug: bool) -> Result<()> {
    let csv: &PathBuf = required(matches, "csv")?;
    let output_dir: &PathBuf = required(matches, "output-dir")?;
    let (start, end) = time_range(matches)?;
    let fps = *required::<f64>(matches, "fps")?;
    let render = render_options(matches)?;
    render.validate()?;
    let schedule = FrameSchedule::new(start, end, fps)?;

    // Children tolerate empty chunks, so the whole range is checked here once
    let records =
        read_records_csv(csv).with_context(|| format!("Failed to read {}", csv.display()))?;
    let in_range = frames_in_range(&schedule, &records);
    if in_range == 0 {
        bail!(no_frames_in_range(schedule.len(), csv));
    }
    if in_range < schedule.len() {
        warn!(
            "{} frames are outside the GPS data and will be skipped",
            schedule.len() - in_range
        );
    }
    // A bad route fails here rather than in every child
    planned_route(matches)?;
    let route = matches.get_one::<PathBuf>("route").cloned();

    let defaults = ParallelPlan::default();
    let plan = ParallelPlan {
        executable: std::env::current_exe().context("Cannot locate the running executable")?,
        csv: csv.clone(),
        output_dir: output_dir.clone(),
        jobs: matches.get_one::<usize>("jobs").copied().unwrap_or(defaults.jobs),
        fps,
        font: render.font_path,
        route,
        background: render.background,
        window_seconds: render.window_seconds,
        debug,
    };

    let outcomes = run_parallel(&plan, &schedule).context("Frame generation failed")?;
    let written = schedule
        .iter()
        .filter(|slot| output_dir.join(frame_file_name(slot.index)).is_file())
        .count();
    println!(
        "Exported {} frames with {} processes to: {}",
        written,
        outcomes.len(),
        output_dir.display()
    );

    if let Some(video) = matches.get_one::<PathBuf>("video") {
        let options = VideoOptions {
            fps,
            cleanup: matches.get_flag("cleanup"),
            ..VideoOptions::default()
        };
        let frames = create_video(output_dir, video, &options)
            .with_context(|| format!("Failed to create video {}", video.display()))?;
        println!("Exported video of {frames} frames to: {}", video.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = build_command().get_matches();
    let debug = matches.get_flag("debug");
    init_logging(debug);
    debug!(
        "gps_overlay {} ({})",
        env!("CARGO_PKG_VERSION"),
        build_revision()
    );

    match matches.subcommand() {
        Some(("extract", sub)) => run_extract(sub),
        Some(("replace", sub)) => run_replace(sub),
        Some(("frames", sub)) => run_frames(sub),
        Some(("video", sub)) => run_video(sub),
        Some(("parallel", sub)) => run_parallel_frames(sub, debug),
        _ => {
            build_command().print_help()?;
            println!();
            Ok(())
        }
    }
}
