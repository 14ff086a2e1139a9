//! The assembled frame sequence and its JSON form.

use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::ConversionConfig;
use crate::error::{DotsError, Result};
use crate::frame::BinaryFrame;

/// Output of one conversion run.
///
/// `frame_count` always equals `frames.len()` and every frame holds
/// `cols * rows` dots. Fields are only reachable through accessors so those
/// invariants hold after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DotMatrixDocument {
    cols: u32,
    rows: u32,
    fps: u32,
    frame_count: usize,
    frames: Vec<BinaryFrame>,
}

/// How the document is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    /// Single line with `", "` and `": "` separators
    #[default]
    Compact,
    /// Two-space indented
    Pretty,
}

/// Collects binarized frames, in order, into a document.
pub fn assemble(frames: Vec<BinaryFrame>, config: &ConversionConfig) -> Result<DotMatrixDocument> {
    if frames.is_empty() {
        return Err(DotsError::EmptySequence);
    }
    let expected = config.cell_count();
    if let Some(bad) = frames.iter().find(|f| f.len() != expected) {
        return Err(DotsError::DimensionMismatch { expected, actual: bad.len() });
    }
    Ok(DotMatrixDocument {
        cols: config.cols,
        rows: config.rows,
        fps: config.fps,
        frame_count: frames.len(),
        frames,
    })
}

impl DotMatrixDocument {
    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frames(&self) -> &[BinaryFrame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Result<&BinaryFrame> {
        self.frames.get(index).ok_or(DotsError::FrameOutOfRange {
            index,
            count: self.frame_count,
        })
    }

    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.fps as f64
    }

    pub fn write_json<W: Write>(&self, writer: W, style: JsonStyle) -> Result<()> {
        match style {
            JsonStyle::Compact => {
                let mut ser = Serializer::with_formatter(writer, SpacedFormatter);
                self.serialize(&mut ser)?;
            }
            JsonStyle::Pretty => {
                let mut ser = Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"  "));
                self.serialize(&mut ser)?;
            }
        }
        Ok(())
    }

    pub fn to_json_string(&self, style: JsonStyle) -> Result<String> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        self.write_json(&mut buf, style)?;
        // serde_json only ever emits UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes the document next to `path` and renames it into place, so a
    /// failed write never leaves a truncated file. Returns the size in bytes.
    pub fn write_to_path(&self, path: &Path, style: JsonStyle) -> Result<u64> {
        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".partial");
        let tmp_path = path.with_file_name(tmp_name);

        let result = (|| -> Result<()> {
            let file = fs::File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            self.write_json(&mut writer, style)?;
            writer.flush()?;
            fs::rename(&tmp_path, path)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result?;

        let size = fs::metadata(path)?.len();
        tracing::info!(path = %path.display(), bytes = size, frames = self.frame_count, "wrote document");
        Ok(size)
    }

    /// Parses a document and re-checks its invariants.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: DotMatrixDocument = serde_json::from_str(text)?;
        doc.check()?;
        Ok(doc)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn check(&self) -> Result<()> {
        if self.cols == 0 || self.rows == 0 || self.fps == 0 {
            return Err(DotsError::invalid_config("document grid and fps must be positive"));
        }
        if self.frames.is_empty() {
            return Err(DotsError::EmptySequence);
        }
        if self.frame_count != self.frames.len() {
            return Err(DotsError::invalid_config(format!(
                "frameCount is {} but {} frames are present",
                self.frame_count,
                self.frames.len()
            )));
        }
        let expected = self.cols as usize * self.rows as usize;
        for frame in &self.frames {
            if frame.len() != expected {
                return Err(DotsError::DimensionMismatch { expected, actual: frame.len() });
            }
            if !frame.is_binary() {
                return Err(DotsError::invalid_config("frame values must be 0.0 or 1.0"));
            }
        }
        Ok(())
    }

    fn estimated_size(&self) -> usize {
        // "1.0, " per dot plus brackets
        64 + self.frame_count * (self.cols as usize * self.rows as usize * 5 + 4)
    }
}

/// Single-line JSON with a space after every `,` and `:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    #[inline]
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    #[inline]
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    #[inline]
    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}
