//! # video-dots - Video to Dot Matrix Converter
//!
//! `video-dots` turns a clip of video into a sequence of tiny black/white
//! frames for playback on a low-resolution dot-matrix display.
//!
//! ## Features
//!
//! - Extract a time window from a video with ffmpeg, resampled and resized
//! - Static threshold or Floyd-Steinberg dithering, with optional inversion
//! - Brightness, contrast and gamma adjustment before binarization
//! - Convert a directory of still images instead of a video
//! - Parallel per-frame conversion that keeps frame order
//! - Progress reporting for integration with UI applications
//!
//! ## Example
//!
//! ```no_run
//! use video_dots::{ConversionConfig, DotMatrixConverter, ExtractOptions, JsonStyle};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = DotMatrixConverter::new();
//! let config = ConversionConfig::default().with_grid(40, 30).with_dither(true);
//! let window = ExtractOptions::from_timestamps("30", "10")?;
//!
//! let doc = converter.convert_video(Path::new("input.mp4"), &window, &config)?;
//! doc.write_to_path(Path::new("clip.json"), JsonStyle::Compact)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Converting frames you already have
//!
//! ```
//! use video_dots::{ConversionConfig, DotMatrixConverter, RasterFrame};
//!
//! let converter = DotMatrixConverter::new();
//! let config = ConversionConfig::default().with_grid(2, 2).with_threshold(128);
//! let doc = converter
//!     .convert_frames(vec![RasterFrame::new(vec![0, 100, 200, 255])], &config)
//!     .unwrap();
//! assert_eq!(doc.frames()[0].values(), &[0.0, 0.0, 1.0, 1.0]);
//! ```

pub mod binarize;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod frame;
pub mod preview;

pub use binarize::binarize;
pub use config::{AppConfig, ConversionConfig, ExtractOptions, FfmpegConfig, Preset, Tone};
pub use document::{assemble, DotMatrixDocument, JsonStyle};
pub use error::{DotsError, Result};
pub use extract::{ExtractRequest, FfmpegExtractor, FrameSource, TempDirGuard};
pub use frame::{BinaryFrame, RasterFrame};

use image::imageops::FilterType;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

/// Represents the current phase of a conversion operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// Extracting frames from video using ffmpeg
    ExtractingFrames,
    /// Decoding and resizing still images
    LoadingImages,
    /// Binarizing frames
    ConvertingFrames,
    /// Conversion completed successfully
    Complete,
}

/// Progress information for conversion operations
///
/// This struct provides detailed progress information that can be used
/// to display progress in UI applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Current phase of the conversion
    pub phase: ProgressPhase,
    /// Number of items completed in the current phase
    pub completed: usize,
    /// Total number of items in the current phase (0 if unknown/indeterminate)
    pub total: usize,
    /// Percentage complete (0.0 to 100.0)
    pub percentage: f64,
    /// Human-readable message describing current status
    pub message: String,
}

impl Progress {
    pub fn extracting_frames() -> Self {
        Self {
            phase: ProgressPhase::ExtractingFrames,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: "Extracting frames from video...".to_string(),
        }
    }

    pub fn loading_images(total: usize) -> Self {
        Self {
            phase: ProgressPhase::LoadingImages,
            completed: 0,
            total,
            percentage: 0.0,
            message: format!("Loading {} images...", total),
        }
    }

    pub fn converting_frames(completed: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            phase: ProgressPhase::ConvertingFrames,
            completed,
            total,
            percentage,
            message: format!("Converting frame {} of {}", completed, total),
        }
    }

    pub fn complete(total_frames: usize) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            completed: total_frames,
            total: total_frames,
            percentage: 100.0,
            message: format!("Conversion complete: {} frames", total_frames),
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Runs the extraction, binarization and assembly pipeline.
///
/// Generic over the [`FrameSource`] so the ffmpeg boundary can be swapped out.
pub struct DotMatrixConverter<S: FrameSource = FfmpegExtractor> {
    source: S,
}

impl DotMatrixConverter<FfmpegExtractor> {
    /// Create a converter that calls `ffmpeg` from PATH
    pub fn new() -> Self {
        Self::with_source(FfmpegExtractor::default())
    }

    /// Create a converter that calls a specific ffmpeg binary
    pub fn with_ffmpeg(config: FfmpegConfig) -> Self {
        Self::with_source(FfmpegExtractor::new(config))
    }
}

impl Default for DotMatrixConverter<FfmpegExtractor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FrameSource> DotMatrixConverter<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Binarizes already-decoded frames and assembles them into a document.
    pub fn convert_frames(&self, frames: Vec<RasterFrame>, config: &ConversionConfig) -> Result<DotMatrixDocument> {
        self.convert_frames_with_progress(frames, config, |_| {})
    }

    /// Like [`convert_frames`](Self::convert_frames), reporting each finished frame.
    pub fn convert_frames_with_progress<F>(
        &self,
        frames: Vec<RasterFrame>,
        config: &ConversionConfig,
        progress_callback: F,
    ) -> Result<DotMatrixDocument>
    where
        F: Fn(Progress) + Send + Sync,
    {
        config.validate()?;
        let total = frames.len();
        let completed = AtomicUsize::new(0);

        progress_callback(Progress::converting_frames(0, total));

        // Indexed collect keeps extraction order; the first error aborts the run
        let binary: Vec<BinaryFrame> = frames
            .par_iter()
            .map(|frame| -> Result<BinaryFrame> {
                let out = binarize(frame, config)?;
                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress_callback(Progress::converting_frames(current, total));
                Ok(out)
            })
            .collect::<Result<_>>()?;

        let doc = assemble(binary, config)?;
        progress_callback(Progress::complete(doc.frame_count()));
        Ok(doc)
    }

    /// Extracts a window of the video and converts it.
    ///
    /// # Arguments
    ///
    /// * `input` - Path to input video file
    /// * `window` - Start offset and duration
    /// * `config` - Grid, rate and binarization settings
    pub fn convert_video(&self, input: &Path, window: &ExtractOptions, config: &ConversionConfig) -> Result<DotMatrixDocument> {
        self.convert_video_with_progress(input, window, config, |_| {})
    }

    /// Convert a video with detailed progress reporting
    ///
    /// # Example
    ///
    /// ```no_run
    /// use video_dots::{ConversionConfig, DotMatrixConverter, ExtractOptions, ProgressPhase};
    /// use std::path::Path;
    ///
    /// let converter = DotMatrixConverter::new();
    /// let config = ConversionConfig::default();
    ///
    /// converter.convert_video_with_progress(
    ///     Path::new("video.mp4"),
    ///     &ExtractOptions::default(),
    ///     &config,
    ///     |progress| {
    ///         match progress.phase {
    ///             ProgressPhase::ExtractingFrames => println!("Extracting frames..."),
    ///             ProgressPhase::ConvertingFrames => {
    ///                 println!("Converting: {}/{} ({:.1}%)",
    ///                     progress.completed, progress.total, progress.percentage);
    ///             }
    ///             ProgressPhase::Complete => println!("Done!"),
    ///             _ => {}
    ///         }
    ///     },
    /// ).unwrap();
    /// ```
    pub fn convert_video_with_progress<F>(
        &self,
        input: &Path,
        window: &ExtractOptions,
        config: &ConversionConfig,
        progress_callback: F,
    ) -> Result<DotMatrixDocument>
    where
        F: Fn(Progress) + Send + Sync,
    {
        config.validate()?;
        window.validate()?;
        if !input.is_file() {
            return Err(DotsError::SourceNotFound(input.to_path_buf()));
        }

        let request = ExtractRequest {
            source: input.to_path_buf(),
            start: window.start,
            duration: window.duration,
            fps: config.fps,
            cols: config.cols,
            rows: config.rows,
        };

        // Removed when this function returns, whichever way it returns
        let work_dir = TempDirGuard::create("dots_")?;

        progress_callback(Progress::extracting_frames());
        tracing::info!(
            source = %input.display(),
            start = window.start,
            duration = window.duration,
            "extracting frames"
        );
        let frames = self.source.extract_frames(&request, work_dir.path())?;
        if frames.is_empty() {
            return Err(DotsError::extraction_failed("no frames produced"));
        }

        self.convert_frames_with_progress(frames, config, progress_callback)
    }

    /// Converts a directory of png/jpg images, taken in file-name order and
    /// resized to the configured grid.
    pub fn convert_directory(&self, input_dir: &Path, config: &ConversionConfig) -> Result<DotMatrixDocument> {
        self.convert_directory_with_progress(input_dir, config, |_| {})
    }

    pub fn convert_directory_with_progress<F>(
        &self,
        input_dir: &Path,
        config: &ConversionConfig,
        progress_callback: F,
    ) -> Result<DotMatrixDocument>
    where
        F: Fn(Progress) + Send + Sync,
    {
        config.validate()?;
        if !input_dir.is_dir() {
            return Err(DotsError::SourceNotFound(input_dir.to_path_buf()));
        }

        let images = list_images(input_dir);
        if images.is_empty() {
            return Err(DotsError::extraction_failed(format!(
                "no png/jpg images found in {}",
                input_dir.display()
            )));
        }

        progress_callback(Progress::loading_images(images.len()));
        let frames: Vec<RasterFrame> = images
            .par_iter()
            .map(|p| load_resized(p, config.cols, config.rows))
            .collect::<Result<_>>()?;

        self.convert_frames_with_progress(frames, config, progress_callback)
    }
}

fn list_images(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    images.sort();
    images
}

fn load_resized(path: &Path, cols: u32, rows: u32) -> Result<RasterFrame> {
    let img = image::open(path)?;
    let img = if img.width() != cols || img.height() != rows {
        img.resize_exact(cols, rows, FilterType::Triangle)
    } else {
        img
    };
    RasterFrame::from_image(&img, cols, rows)
}
