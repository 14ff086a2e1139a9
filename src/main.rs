use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dialoguer::{Confirm, FuzzySelect};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use video_dots::{
    preview, AppConfig, ConversionConfig, DotMatrixConverter, DotMatrixDocument, ExtractOptions, FfmpegConfig,
    JsonStyle, Progress, ProgressPhase,
};
use walkdir::WalkDir;

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one frame of an existing document as a PNG
    Preview {
        /// Document written by a previous conversion
        document: PathBuf,

        /// Frame index to render (0-based)
        #[arg(long, default_value_t = 0)]
        frame: usize,

        /// Size of each dot cell in pixels
        #[arg(long, default_value_t = 12)]
        dot_size: u32,

        /// Output PNG path
        #[arg(long, short, default_value = "preview.png")]
        output: PathBuf,
    },
    /// List the presets available from the config file and built-ins
    Presets,
}

#[derive(Parser, Debug)]
#[command(version, about = "Convert a video clip into dot-matrix frame arrays.")]
struct Args {
    /// Optional subcommands
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Input video file or directory of images
    input: Option<PathBuf>,

    /// Start time in the video (e.g., 00:01:23.456 or 83.456)
    #[arg(long, default_value = "0")]
    start: String,

    /// Duration to extract (e.g., 10 or 00:00:10)
    #[arg(long, default_value = "10")]
    duration: String,

    /// Frames per second to sample
    #[arg(long)]
    fps: Option<u32>,

    /// Grid columns
    #[arg(long)]
    cols: Option<u32>,

    /// Grid rows
    #[arg(long)]
    rows: Option<u32>,

    /// Black/white cutoff 0-255 (ignored with --dither)
    #[arg(long)]
    threshold: Option<u8>,

    /// Use Floyd-Steinberg dithering instead of a fixed threshold
    #[arg(long, default_value_t = false, overrides_with = "no_dither")]
    dither: bool,

    /// Use the fixed threshold even if the preset dithers
    #[arg(long, default_value_t = false, overrides_with = "dither")]
    no_dither: bool,

    /// Swap on and off dots
    #[arg(long, default_value_t = false, overrides_with = "no_invert")]
    invert: bool,

    /// Keep dots as they are even if the preset inverts
    #[arg(long, default_value_t = false, overrides_with = "invert")]
    no_invert: bool,

    /// Brightness offset applied before binarization (-255 to 255)
    #[arg(long, allow_hyphen_values = true)]
    brightness: Option<i16>,

    /// Contrast multiplier applied before binarization
    #[arg(long)]
    contrast: Option<f32>,

    /// Gamma exponent applied before binarization
    #[arg(long)]
    gamma: Option<f32>,

    /// Mirror every frame left to right
    #[arg(long, default_value_t = false, overrides_with = "no_flip_h")]
    flip_h: bool,

    /// Turn off the preset's left-right mirroring
    #[arg(long, default_value_t = false, overrides_with = "flip_h")]
    no_flip_h: bool,

    /// Mirror every frame top to bottom
    #[arg(long, default_value_t = false, overrides_with = "no_flip_v")]
    flip_v: bool,

    /// Turn off the preset's top-bottom mirroring
    #[arg(long, default_value_t = false, overrides_with = "flip_v")]
    no_flip_v: bool,

    /// Named preset from video-dots.toml or the built-ins
    #[arg(long)]
    preset: Option<String>,

    /// Config file to read instead of the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output JSON path
    #[arg(long, short, default_value = "dot_video.json")]
    output: PathBuf,

    /// Indent the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Also write a PNG preview of the first frame
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Size of each dot cell in the preview, in pixels
    #[arg(long, default_value_t = 12)]
    dot_size: u32,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Overwrite the output file without asking
    #[arg(long, short, default_value_t = false)]
    force: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    init_tracing(args.verbose);

    match &args.cmd {
        Some(Command::Preview { document, frame, dot_size, output }) => {
            return run_preview(document, *frame, *dot_size, output);
        }
        Some(Command::Presets) => {
            let cfg = load_config(args.config.as_deref())?;
            return run_list_presets(&cfg);
        }
        None => {}
    }

    let is_interactive = std::io::stdin().is_terminal() && !args.force;

    if args.input.is_none() {
        if !is_interactive {
            return Err(anyhow!("Input file must be provided."));
        }
        let files = find_media_files();
        if files.is_empty() {
            return Err(anyhow!("No video files found in current directory."));
        }
        let selection = FuzzySelect::with_theme(&dialoguer::theme::ColorfulTheme::default())
            .with_prompt("Choose an input file")
            .default(0)
            .items(&files)
            .interact()?;
        args.input = Some(PathBuf::from(&files[selection]));
    }
    let input_path = args.input.clone().ok_or_else(|| anyhow!("Input file must be provided."))?;

    let cfg = load_config(args.config.as_deref())?;
    let config = build_conversion_config(&args, &cfg)?;

    if args.output.exists() && !args.force {
        if !is_interactive {
            bail!("{} already exists. Pass --force to overwrite it.", args.output.display());
        }
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", args.output.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    let converter = DotMatrixConverter::with_ffmpeg(FfmpegConfig { ffmpeg_path: args.ffmpeg.clone() });

    let progress_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    let pb_clone = Arc::clone(&progress_bar);
    let on_progress = move |progress: Progress| update_progress(&pb_clone, progress);

    let doc = if input_path.is_dir() {
        println!("Converting images in {}...", input_path.display());
        converter.convert_directory_with_progress(&input_path, &config, on_progress)?
    } else {
        let window = ExtractOptions::from_timestamps(&args.start, &args.duration)
            .context("parsing --start/--duration")?;
        println!("Extracting frames from {}...", input_path.display());
        converter.convert_video_with_progress(&input_path, &window, &config, on_progress)?
    };

    let pb_opt = progress_bar.lock().map(|mut g| g.take()).unwrap_or(None);
    if let Some(pb) = pb_opt {
        pb.finish_and_clear();
    }

    println!(
        "Converted {} frames to {}x{} dot matrix ({:.1}s at {} fps)",
        doc.frame_count(),
        doc.cols(),
        doc.rows(),
        doc.duration_secs(),
        doc.fps()
    );

    let style = if args.pretty { JsonStyle::Pretty } else { JsonStyle::Compact };
    let size = doc
        .write_to_path(&args.output, style)
        .with_context(|| format!("writing {}", args.output.display()))?;

    if let Some(preview_path) = &args.preview {
        preview::save_preview(&doc, 0, args.dot_size, preview_path)
            .with_context(|| format!("writing preview {}", preview_path.display()))?;
        println!("Preview written to {}", preview_path.display());
    }

    println!(
        "Done! {} frames written to {} ({:.1} KB)",
        doc.frame_count(),
        args.output.display(),
        size as f64 / 1024.0
    );
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match explicit {
        Some(p) => AppConfig::from_file(p).with_context(|| format!("reading config {}", p.display())),
        None => AppConfig::load().context("loading config"),
    }
}

/// Preset first, then every flag given on the command line.
fn build_conversion_config(args: &Args, cfg: &AppConfig) -> Result<ConversionConfig> {
    let preset_name = args.preset.as_deref().unwrap_or(cfg.default_preset.as_str());
    let preset = cfg.preset(preset_name)?;
    tracing::debug!(preset = preset_name, ?preset, "using preset");

    let mut config = ConversionConfig::from_preset(preset);
    if let Some(cols) = args.cols {
        config.cols = cols;
    }
    if let Some(rows) = args.rows {
        config.rows = rows;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(brightness) = args.brightness {
        config.tone.brightness = brightness;
    }
    if let Some(contrast) = args.contrast {
        config.tone.contrast = contrast;
    }
    if let Some(gamma) = args.gamma {
        config.tone.gamma = gamma;
    }
    if let Some(dither) = switch(args.dither, args.no_dither) {
        config.dither = dither;
    }
    if let Some(invert) = switch(args.invert, args.no_invert) {
        config.invert = invert;
    }
    if let Some(flip) = switch(args.flip_h, args.no_flip_h) {
        config.flip_horizontal = flip;
    }
    if let Some(flip) = switch(args.flip_v, args.no_flip_v) {
        config.flip_vertical = flip;
    }

    if config.dither && args.threshold.is_some() {
        tracing::warn!("--threshold has no effect with --dither");
    }
    config.validate()?;
    Ok(config)
}

/// `--x` / `--no-x` pair: `None` leaves the preset value alone.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

fn update_progress(progress_bar: &Mutex<Option<ProgressBar>>, progress: Progress) {
    let mut pb_guard = match progress_bar.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match progress.phase {
        ProgressPhase::ExtractingFrames | ProgressPhase::LoadingImages => {
            let pb = ProgressBar::new_spinner();
            pb.set_message(progress.message);
            pb.enable_steady_tick(Duration::from_millis(100));
            if let Some(old) = pb_guard.replace(pb) {
                old.finish_and_clear();
            }
        }
        ProgressPhase::ConvertingFrames if progress.completed == 0 => {
            let pb = ProgressBar::new(progress.total as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            if let Some(old) = pb_guard.replace(pb) {
                old.finish_and_clear();
            }
        }
        ProgressPhase::ConvertingFrames => {
            // Frames finish out of order on the pool, so count rather than seek
            if let Some(pb) = pb_guard.as_ref() {
                pb.inc(1);
            }
        }
        ProgressPhase::Complete => {
            if let Some(pb) = pb_guard.as_ref() {
                pb.finish_with_message("Done");
            }
        }
    }
}

fn run_preview(document: &Path, frame: usize, dot_size: u32, output: &Path) -> Result<()> {
    let doc = DotMatrixDocument::from_path(document).with_context(|| format!("reading {}", document.display()))?;
    preview::save_preview(&doc, frame, dot_size, output)
        .with_context(|| format!("rendering frame {} of {}", frame, document.display()))?;
    println!(
        "Frame {} of {} ({}x{}) written to {}",
        frame,
        doc.frame_count(),
        doc.cols(),
        doc.rows(),
        output.display()
    );
    Ok(())
}

fn run_list_presets(cfg: &AppConfig) -> Result<()> {
    let mut names: Vec<&String> = cfg.presets.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.presets[name];
        let marker = if *name == cfg.default_preset { "*" } else { " " };
        println!(
            "{} {:<10} {}x{} @ {} fps, {}, brightness {}, contrast {:.2}, gamma {:.2}{}{}{}",
            marker,
            name,
            p.cols,
            p.rows,
            p.fps,
            if p.dither { "dither".to_string() } else { format!("threshold {}", p.threshold) },
            p.tone.brightness,
            p.tone.contrast,
            p.tone.gamma,
            if p.invert { ", inverted" } else { "" },
            if p.flip_horizontal { ", flip-h" } else { "" },
            if p.flip_vertical { ", flip-v" } else { "" }
        );
    }
    Ok(())
}

fn find_media_files() -> Vec<String> {
    WalkDir::new(".")
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path().extension().is_some_and(|ext| {
                    matches!(ext.to_str(), Some("mp4" | "mkv" | "mov" | "avi" | "webm" | "gif"))
                })
        })
        .map(|e| e.path().to_string_lossy().into_owned())
        .collect()
}
