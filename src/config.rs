//! Conversion settings, extraction options and the on-disk preset file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DotsError, Result};

pub const DEFAULT_COLS: u32 = 40;
pub const DEFAULT_ROWS: u32 = 30;
pub const DEFAULT_FPS: u32 = 15;
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Brightness/contrast/gamma applied to luminance before binarization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tone {
    /// Added to every sample (-255..=255)
    pub brightness: i16,
    /// Contrast multiplier around mid-gray
    pub contrast: f32,
    /// Exponent applied to the normalized sample
    pub gamma: f32,
}

impl Default for Tone {
    fn default() -> Self {
        Self { brightness: 0, contrast: 1.0, gamma: 1.0 }
    }
}

impl Tone {
    pub fn is_identity(&self) -> bool {
        self.brightness == 0 && self.contrast == 1.0 && self.gamma == 1.0
    }

    /// Maps one luminance value, keeping the result inside [0, 255].
    pub fn apply(&self, v: f32) -> f32 {
        let mut v = v + self.brightness as f32;
        v = ((v / 255.0 - 0.5) * self.contrast + 0.5) * 255.0;
        v = v.clamp(0.0, 255.0);
        v = (v / 255.0).powf(self.gamma) * 255.0;
        v.clamp(0.0, 255.0)
    }
}

/// Settings fixed before the first frame is processed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionConfig {
    /// Grid columns
    pub cols: u32,
    /// Grid rows
    pub rows: u32,
    /// Sample rate, copied into the document
    pub fps: u32,
    /// Cutoff for the static threshold mode. Ignored when dithering.
    pub threshold: u8,
    /// Floyd-Steinberg error diffusion instead of the static threshold
    pub dither: bool,
    /// Flip 0.0/1.0 as the final pass
    pub invert: bool,
    pub tone: Tone,
    /// Mirror each row
    pub flip_horizontal: bool,
    /// Mirror row order
    pub flip_vertical: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            fps: DEFAULT_FPS,
            threshold: DEFAULT_THRESHOLD,
            dither: false,
            invert: false,
            tone: Tone::default(),
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}

impl ConversionConfig {
    pub fn with_grid(mut self, cols: u32, rows: u32) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_dither(mut self, dither: bool) -> Self {
        self.dither = dither;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_flip(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    /// Create a config from a preset
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            cols: preset.cols,
            rows: preset.rows,
            fps: preset.fps,
            threshold: preset.threshold,
            dither: preset.dither,
            invert: preset.invert,
            tone: preset.tone,
            flip_horizontal: preset.flip_horizontal,
            flip_vertical: preset.flip_vertical,
        }
    }

    /// Number of dots per frame.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.cols == 0 || self.rows == 0 {
            return Err(DotsError::invalid_config(format!(
                "grid must be at least 1x1, got {}x{}",
                self.cols, self.rows
            )));
        }
        if self.fps == 0 {
            return Err(DotsError::invalid_config("fps must be positive"));
        }
        if !(-255..=255).contains(&self.tone.brightness) {
            return Err(DotsError::invalid_config(format!(
                "brightness must be within -255..=255, got {}",
                self.tone.brightness
            )));
        }
        if !self.tone.contrast.is_finite() || self.tone.contrast < 0.0 {
            return Err(DotsError::invalid_config("contrast must be a non-negative number"));
        }
        if !self.tone.gamma.is_finite() || self.tone.gamma <= 0.0 {
            return Err(DotsError::invalid_config("gamma must be a positive number"));
        }
        Ok(())
    }
}

/// Path to the ffmpeg binary. `None` means `ffmpeg` from PATH.
#[derive(Debug, Clone, Default)]
pub struct FfmpegConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

impl FfmpegConfig {
    pub fn ffmpeg_cmd(&self) -> &Path {
        self.ffmpeg_path.as_deref().unwrap_or_else(|| Path::new("ffmpeg"))
    }
}

/// Time window cut out of the source video.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Offset into the source, in seconds
    pub start: f64,
    /// Length of the window, in seconds
    pub duration: f64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { start: 0.0, duration: 10.0 }
    }
}

impl ExtractOptions {
    /// Builds the window from timestamps such as `"83.5"`, `"01:23.5"` or `"00:01:23.5"`.
    pub fn from_timestamps(start: &str, duration: &str) -> Result<Self> {
        let opts = Self {
            start: parse_timestamp(start)?,
            duration: parse_timestamp(duration)?,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(DotsError::invalid_config(format!("start must be >= 0, got {}", self.start)));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(DotsError::invalid_config(format!(
                "duration must be > 0, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

pub fn parse_timestamp(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DotsError::invalid_config("empty timestamp"));
    }
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return Err(DotsError::invalid_config(format!("bad timestamp '{}'", s)));
    }
    parts.iter().rev().enumerate().try_fold(0.0, |acc, (i, v)| {
        let n: f64 = v
            .parse()
            .map_err(|_| DotsError::invalid_config(format!("bad timestamp '{}'", s)))?;
        if n < 0.0 {
            return Err(DotsError::invalid_config(format!("negative timestamp '{}'", s)));
        }
        Ok(acc + n * 60f64.powi(i as i32))
    })
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}
fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_cols() -> u32 {
    DEFAULT_COLS
}
fn default_rows() -> u32 {
    DEFAULT_ROWS
}

/// Named set of conversion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default = "default_cols")]
    pub cols: u32,
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default)]
    pub dither: bool,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub flip_horizontal: bool,
    #[serde(default)]
    pub flip_vertical: bool,
    #[serde(flatten)]
    pub tone: Tone,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            fps: DEFAULT_FPS,
            threshold: DEFAULT_THRESHOLD,
            dither: false,
            invert: false,
            flip_horizontal: false,
            flip_vertical: false,
            tone: Tone::default(),
        }
    }
}

fn default_preset_name() -> String {
    "default".to_string()
}

/// Contents of `video-dots.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_preset_name")]
    pub default_preset: String,
    #[serde(default)]
    pub presets: HashMap<String, Preset>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut presets = HashMap::new();
        presets.insert("default".to_string(), Preset::default());
        presets.insert(
            "1bit".to_string(),
            Preset {
                dither: true,
                tone: Tone { contrast: 1.2, ..Tone::default() },
                ..Preset::default()
            },
        );
        presets.insert(
            "minimal".to_string(),
            Preset {
                cols: 24,
                rows: 18,
                threshold: 160,
                tone: Tone { brightness: 20, ..Tone::default() },
                ..Preset::default()
            },
        );
        presets.insert(
            "mirror".to_string(),
            Preset {
                flip_horizontal: true,
                ..Preset::default()
            },
        );
        presets.insert(
            "punchy".to_string(),
            Preset {
                dither: true,
                tone: Tone { brightness: 0, contrast: 1.3, gamma: 0.85 },
                ..Preset::default()
            },
        );
        Self { default_preset: default_preset_name(), presets }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(text)?;
        // Built-in presets stay available unless the file overrides them by name
        for (name, preset) in AppConfig::default().presets {
            cfg.presets.entry(name).or_insert(preset);
        }
        if !cfg.presets.contains_key(&cfg.default_preset) {
            return Err(DotsError::invalid_config(format!(
                "default_preset '{}' is not defined",
                cfg.default_preset
            )));
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Looks for `video-dots.toml` in the user config dir, then the current dir,
    /// and falls back to the built-in presets.
    pub fn load() -> Result<Self> {
        let mut tried: Vec<PathBuf> = Vec::new();
        if let Some(mut d) = dirs::config_dir() {
            d.push("video-dots");
            d.push("video-dots.toml");
            tried.push(d);
        }
        tried.push(PathBuf::from("video-dots.toml"));

        for p in &tried {
            if p.exists() {
                tracing::debug!("loading config from {}", p.display());
                return Self::from_file(p);
            }
        }
        Ok(Self::default())
    }

    pub fn preset(&self, name: &str) -> Result<&Preset> {
        self.presets.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.presets.keys().map(String::as_str).collect();
            available.sort_unstable();
            DotsError::invalid_config(format!(
                "unknown preset '{}'. Available presets: {}",
                name,
                available.join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds_and_clock_times() {
        assert_eq!(parse_timestamp("83.5").unwrap(), 83.5);
        assert_eq!(parse_timestamp("01:23.5").unwrap(), 83.5);
        assert_eq!(parse_timestamp("00:01:23.5").unwrap(), 83.5);
        assert_eq!(parse_timestamp("1:00:00").unwrap(), 3600.0);
    }

    #[test]
    fn rejects_bad_timestamps() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("abc").is_err());
        assert!(parse_timestamp("1:2:3:4").is_err());
        assert!(parse_timestamp("-5").is_err());
    }

    #[test]
    fn extract_window_needs_positive_duration() {
        assert!(ExtractOptions::from_timestamps("0", "0").is_err());
        let opts = ExtractOptions::from_timestamps("30", "10").unwrap();
        assert_eq!(opts.start, 30.0);
        assert_eq!(opts.duration, 10.0);
    }

    #[test]
    fn validate_rejects_empty_grid_and_zero_fps() {
        assert!(ConversionConfig::default().validate().is_ok());
        assert!(matches!(
            ConversionConfig::default().with_grid(0, 30).validate(),
            Err(DotsError::InvalidConfig(_))
        ));
        assert!(ConversionConfig::default().with_fps(0).validate().is_err());
        let bad_gamma = Tone { gamma: 0.0, ..Tone::default() };
        assert!(ConversionConfig::default().with_tone(bad_gamma).validate().is_err());
    }

    #[test]
    fn identity_tone_keeps_values() {
        let tone = Tone::default();
        assert!(tone.is_identity());
        for v in [0.0, 1.0, 127.0, 128.0, 254.0, 255.0] {
            assert!((tone.apply(v) - v).abs() < 1e-3);
        }
    }

    #[test]
    fn tone_clamps_to_byte_range() {
        let bright = Tone { brightness: 100, ..Tone::default() };
        assert_eq!(bright.apply(200.0), 255.0);
        let dark = Tone { brightness: -100, ..Tone::default() };
        assert_eq!(dark.apply(50.0), 0.0);
        let flat = Tone { contrast: 0.0, ..Tone::default() };
        assert!((flat.apply(10.0) - 127.5).abs() < 1e-3);
    }

    #[test]
    fn config_file_merges_with_builtin_presets() {
        let text = r#"
            default_preset = "wall"

            [presets.wall]
            cols = 64
            rows = 32
            dither = true
            gamma = 0.9
        "#;
        let cfg = AppConfig::from_toml_str(text).unwrap();
        let wall = cfg.preset("wall").unwrap();
        assert_eq!((wall.cols, wall.rows, wall.fps), (64, 32, DEFAULT_FPS));
        assert!(wall.dither);
        assert_eq!(wall.tone.gamma, 0.9);
        assert_eq!(wall.tone.contrast, 1.0);
        assert!(cfg.preset("1bit").is_ok());
    }

    #[test]
    fn unknown_default_preset_is_an_error() {
        let err = AppConfig::from_toml_str("default_preset = \"nope\"").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn unknown_preset_lists_available_names() {
        let cfg = AppConfig::default();
        let msg = cfg.preset("huge").unwrap_err().to_string();
        assert!(msg.contains("1bit, default, minimal, mirror, punchy"));
    }

    #[test]
    fn preset_maps_onto_config() {
        let cfg = AppConfig::default();
        let conv = ConversionConfig::from_preset(cfg.preset("minimal").unwrap());
        assert_eq!((conv.cols, conv.rows, conv.threshold), (24, 18, 160));
        assert_eq!(conv.tone.brightness, 20);
        assert!(!conv.dither);
        assert!(!conv.flip_horizontal && !conv.flip_vertical);
    }

    #[test]
    fn presets_carry_mirroring() {
        let cfg = AppConfig::default();
        let mirror = ConversionConfig::from_preset(cfg.preset("mirror").unwrap());
        assert!(mirror.flip_horizontal);
        assert!(!mirror.flip_vertical);

        let text = r#"
            [presets.upside]
            flip_vertical = true
        "#;
        let cfg = AppConfig::from_toml_str(text).unwrap();
        let upside = ConversionConfig::from_preset(cfg.preset("upside").unwrap());
        assert!(upside.flip_vertical);
        assert!(!upside.flip_horizontal);
    }
}
