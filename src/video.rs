//! Video assembly from rendered frames via an external `ffmpeg`

use crate::error::{OverlayError, Result};
use crate::frames::DEFAULT_FPS;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Options for [`create_video`]
#[derive(Debug, Clone)]
pub struct VideoOptions {
    pub fps: f64,
    pub codec: String,
    pub pixel_format: String,
    /// Delete the frames after a successful encode
    pub cleanup: bool,
    /// ffmpeg executable, looked up on `PATH` when not absolute
    pub ffmpeg: PathBuf,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            cleanup: false,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// glob pattern matching every PNG directly inside `dir`
fn png_pattern(dir: &Path) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    format!("{}/*.png", escaped.trim_end_matches('/'))
}

/// PNG files in `dir`, sorted by file name
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(OverlayError::InvalidOption(format!(
            "frame directory {} does not exist",
            dir.display()
        )));
    }

    let pattern = png_pattern(dir);
    let paths = glob::glob(&pattern)
        .map_err(|err| OverlayError::InvalidOption(format!("bad frame pattern {pattern}: {err}")))?;

    let mut frames = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| OverlayError::Io(err.into()))?;
        if path.is_file() {
            frames.push(path);
        }
    }
    frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(frames)
}

/// Arguments passed to ffmpeg to encode every PNG in `dir` into `output`
pub fn ffmpeg_args(dir: &Path, output: &Path, options: &VideoOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-framerate".into(),
        format!("{}", options.fps).into(),
        "-pattern_type".into(),
        "glob".into(),
        "-i".into(),
        png_pattern(dir).into(),
        "-c:v".into(),
        options.codec.clone().into(),
        "-pix_fmt".into(),
        options.pixel_format.clone().into(),
    ];
    args.push(output.as_os_str().to_os_string());
    args
}

/// Encode the frames in `dir` into `output` at a fixed frame rate
///
/// Returns the number of frames encoded.
pub fn create_video(dir: &Path, output: &Path, options: &VideoOptions) -> Result<usize> {
    if !options.fps.is_finite() || options.fps <= 0.0 {
        return Err(OverlayError::InvalidOption(format!(
            "frame rate must be positive, got {}",
            options.fps
        )));
    }
    let frames = list_frames(dir)?;
    if frames.is_empty() {
        return Err(OverlayError::InvalidOption(format!(
            "no PNG frames found in {}",
            dir.display()
        )));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let args = ffmpeg_args(dir, output, options);
    debug!("Running {} {:?}", options.ffmpeg.display(), args);
    let result = Command::new(&options.ffmpeg).args(&args).output().map_err(|err| {
        OverlayError::External(format!("could not run {}: {}", options.ffmpeg.display(), err))
    })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        return Err(OverlayError::External(format!(
            "ffmpeg exited with {}: {}",
            result.status,
            tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
        )));
    }
    info!("Encoded {} frames into {}", frames.len(), output.display());

    if options.cleanup {
        for frame in &frames {
            fs::remove_file(frame)?;
        }
        debug!("Removed {} frames from {}", frames.len(), dir.display());
    }
    Ok(frames.len())
}
