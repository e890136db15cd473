//! Parallel frame generation across child processes
//!
//! The frame schedule is cut into contiguous chunks and each chunk is handed
//! to a separate `frames` invocation of this binary. Children share nothing
//! but the output directory; frame numbers stay global because every child
//! counts from the same origin.

use crate::error::{OverlayError, Result};
use crate::frames::{FrameSchedule, DEFAULT_FPS};
use crate::parser::time::format_timestamp_precise;
use crate::render::Background;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use tracing::{error, info};

/// Split `schedule` into at most `jobs` contiguous, non-empty chunks
///
/// Chunk sizes differ by at most one frame and together cover every frame
/// exactly once.
pub fn partition(schedule: &FrameSchedule, jobs: usize) -> Vec<FrameSchedule> {
    let total = schedule.len();
    let jobs = jobs.max(1).min(total);
    if jobs == 0 {
        return Vec::new();
    }

    let base = total / jobs;
    let extra = total % jobs;
    let mut chunks = Vec::with_capacity(jobs);
    let mut offset = 0;
    for job in 0..jobs {
        let len = base + usize::from(job < extra);
        chunks.push(schedule.slice(offset, len));
        offset += len;
    }
    chunks
}

/// Everything a child `frames` process needs besides its time range
#[derive(Debug, Clone)]
pub struct ParallelPlan {
    /// Binary to re-invoke, normally the current executable
    pub executable: PathBuf,
    pub csv: PathBuf,
    pub output_dir: PathBuf,
    pub jobs: usize,
    pub fps: f64,
    pub font: Option<PathBuf>,
    /// Planned route drawn instead of the recorded track
    pub route: Option<PathBuf>,
    pub background: Background,
    pub window_seconds: f64,
    pub debug: bool,
}

impl Default for ParallelPlan {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("gps_overlay"),
            csv: PathBuf::new(),
            output_dir: PathBuf::from("frames"),
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            fps: DEFAULT_FPS,
            font: None,
            route: None,
            background: Background::default(),
            window_seconds: 60.0,
            debug: false,
        }
    }
}

/// Command line of the child rendering `chunk`, numbering frames from `origin`
///
/// `chunk` and `origin` must come from a schedule built with `plan.fps`.
/// Children pass `--allow-empty`: a chunk lying wholly outside the track is
/// not a failure of the run.
pub fn child_args(plan: &ParallelPlan, chunk: &FrameSchedule, origin: &FrameSchedule) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if plan.debug {
        args.push("--debug".into());
    }
    args.extend([
        "frames".into(),
        plan.csv.clone().into_os_string(),
        format_timestamp_precise(&chunk.start()).into(),
        format_timestamp_precise(&chunk.end()).into(),
        "--fps".into(),
        format!("{}", plan.fps).into(),
        "--origin".into(),
        format_timestamp_precise(&origin.start()).into(),
        "--output-dir".into(),
        plan.output_dir.clone().into_os_string(),
        "--background".into(),
        plan.background.to_string().into(),
        "--window".into(),
        format!("{}", plan.window_seconds).into(),
        "--allow-empty".into(),
    ]);
    if let Some(font) = &plan.font {
        args.push("--font".into());
        args.push(font.clone().into_os_string());
    }
    if let Some(route) = &plan.route {
        args.push("--route".into());
        args.push(route.clone().into_os_string());
    }
    args
}

/// Exit state of one child
#[derive(Debug)]
pub struct ChildOutcome {
    pub job: usize,
    pub first_index: usize,
    pub frames: usize,
    /// `None` when the process could not be started or waited on
    pub status: Option<ExitStatus>,
}

impl ChildOutcome {
    pub fn success(&self) -> bool {
        self.status.map_or(false, |s| s.success())
    }
}

/// Render `schedule` with `plan.jobs` child processes and wait for all of them
///
/// Every child runs to completion even when others fail. Failed children
/// are logged, not retried, and make the whole run an error.
pub fn run_parallel(plan: &ParallelPlan, schedule: &FrameSchedule) -> Result<Vec<ChildOutcome>> {
    if (schedule.fps() - plan.fps).abs() > 1e-3 {
        return Err(OverlayError::InvalidOption(format!(
            "schedule runs at {:.4} fps but the plan at {}",
            schedule.fps(),
            plan.fps
        )));
    }
    let chunks = partition(schedule, plan.jobs);
    info!(
        "Rendering {} frames with {} processes into {}",
        schedule.len(),
        chunks.len(),
        plan.output_dir.display()
    );

    let mut running: Vec<(usize, &FrameSchedule, Option<Child>)> = Vec::with_capacity(chunks.len());
    for (job, chunk) in chunks.iter().enumerate() {
        let spawned = Command::new(&plan.executable)
            .args(child_args(plan, chunk, schedule))
            .spawn();
        match spawned {
            Ok(child) => {
                info!(
                    "Started process {} (pid {}) for frames {}..={}",
                    job,
                    child.id(),
                    chunk.first_index(),
                    chunk.first_index() + chunk.len() - 1
                );
                running.push((job, chunk, Some(child)));
            }
            Err(err) => {
                error!("Could not start process {}: {}", job, err);
                running.push((job, chunk, None));
            }
        }
    }

    let mut outcomes = Vec::with_capacity(running.len());
    for (job, chunk, child) in running {
        let status = match child.map(|mut c| c.wait()) {
            Some(Ok(status)) => Some(status),
            Some(Err(err)) => {
                error!("Lost track of process {}: {}", job, err);
                None
            }
            None => None,
        };
        let outcome = ChildOutcome {
            job,
            first_index: chunk.first_index(),
            frames: chunk.len(),
            status,
        };
        if outcome.success() {
            info!("Process {} finished ({} frames)", job, outcome.frames);
        } else {
            error!(
                "Process {} failed for frames starting at {}: {}",
                job,
                outcome.first_index,
                status.map_or_else(|| "not run".to_string(), |s| s.to_string())
            );
        }
        outcomes.push(outcome);
    }

    let failed = outcomes.iter().filter(|o| !o.success()).count();
    if failed > 0 {
        return Err(OverlayError::External(format!(
            "{} of {} frame processes failed",
            failed,
            outcomes.len()
        )));
    }
    Ok(outcomes)
}
