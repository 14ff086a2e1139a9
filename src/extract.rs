use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command as ProcCommand;
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

use crate::config::FfmpegConfig;
use crate::error::{DotsError, Result};
use crate::frame::RasterFrame;

/// What to pull out of the source video.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    pub source: PathBuf,
    /// Window start, seconds
    pub start: f64,
    /// Window length, seconds
    pub duration: f64,
    pub fps: u32,
    pub cols: u32,
    pub rows: u32,
}

/// Produces decoded frames, already sampled at `fps` and sized `cols x rows`,
/// in temporal order.
///
/// `work_dir` is a scratch directory owned by the caller and removed after
/// the call returns.
pub trait FrameSource {
    fn extract_frames(&self, request: &ExtractRequest, work_dir: &Path) -> Result<Vec<RasterFrame>>;
}

/// Frame source backed by an `ffmpeg` subprocess.
#[derive(Debug, Clone, Default)]
pub struct FfmpegExtractor {
    config: FfmpegConfig,
}

impl FfmpegExtractor {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Fails with `ExtractionToolMissing` if the binary cannot be started.
    pub fn check_available(&self) -> Result<()> {
        let cmd = self.config.ffmpeg_cmd();
        match ProcCommand::new(cmd).arg("-version").output() {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DotsError::tool_missing(cmd.display().to_string())),
            Err(e) => Err(DotsError::extraction_failed(format!("could not run {}: {}", cmd.display(), e))),
        }
    }
}

impl FrameSource for FfmpegExtractor {
    fn extract_frames(&self, request: &ExtractRequest, work_dir: &Path) -> Result<Vec<RasterFrame>> {
        self.check_available()?;

        let args = build_ffmpeg_args(request, work_dir);
        tracing::debug!(?args, "running ffmpeg");

        let output = ProcCommand::new(self.config.ffmpeg_cmd())
            .args(&args)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => DotsError::tool_missing(self.config.ffmpeg_cmd().display().to_string()),
                _ => DotsError::extraction_failed(format!("running ffmpeg: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DotsError::extraction_failed(format!(
                "ffmpeg exited with {}:\n{}",
                output.status,
                stderr.trim_end()
            )));
        }

        let frames = load_frame_dir(work_dir, request.cols, request.rows)?;
        if frames.is_empty() {
            return Err(DotsError::extraction_failed(
                "no frames produced. Check the video path and the start/duration window",
            ));
        }
        tracing::info!(count = frames.len(), "extracted frames");
        Ok(frames)
    }
}

pub(crate) fn build_frame_extraction_vf(fps: u32, cols: u32, rows: u32) -> String {
    format!("fps={},scale={}:{}", fps, cols, rows)
}

fn build_ffmpeg_args(request: &ExtractRequest, work_dir: &Path) -> Vec<OsString> {
    let out_pattern = work_dir.join("frame_%06d.png");
    let mut args: Vec<OsString> = vec!["-loglevel".into(), "error".into(), "-y".into()];

    if request.start > 0.0 {
        args.push("-ss".into());
        args.push(request.start.to_string().into());
    }
    args.push("-t".into());
    args.push(request.duration.to_string().into());

    args.push("-i".into());
    args.push(request.source.clone().into_os_string());

    args.push("-vf".into());
    args.push(build_frame_extraction_vf(request.fps, request.cols, request.rows).into());
    args.push(out_pattern.into_os_string());
    args
}

/// Sorted `frame_*.png` files directly inside `dir`.
pub(crate) fn list_frame_files(dir: &Path) -> Vec<PathBuf> {
    let mut pngs: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension().is_some_and(|e| e == "png")
                && p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("frame_"))
        })
        .collect();
    pngs.sort();
    pngs
}

fn load_frame_dir(dir: &Path, cols: u32, rows: u32) -> Result<Vec<RasterFrame>> {
    list_frame_files(dir)
        .iter()
        .map(|p| {
            let img = image::open(p)?;
            RasterFrame::from_image(&img, cols, rows)
        })
        .collect()
}

/// Scratch directory removed on drop, including on error paths.
pub struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    /// Creates a fresh `<prefix><pid>_<nanos>` directory under the OS temp dir.
    pub fn create(prefix: &str) -> Result<Self> {
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let path = std::env::temp_dir().join(format!("{}{}_{}", prefix, std::process::id(), stamp));
        fs::create_dir_all(&path)?;
        tracing::debug!("created work dir {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            tracing::warn!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}
