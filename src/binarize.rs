//! Grayscale raster to on/off dots.
//!
//! A frame goes through four passes, in order:
//!
//! 1. optional tone adjustment (brightness, contrast, gamma)
//! 2. static threshold, or Floyd-Steinberg error diffusion through
//!    [`image::imageops::dither`] with a two-level palette
//! 3. optional mirroring
//! 4. optional inversion
//!
//! Each call only looks at its own frame, so frames can be converted in any
//! order or in parallel.

use image::imageops::{self, BiLevel};
use image::GrayImage;

use crate::config::ConversionConfig;
use crate::error::{DotsError, Result};
use crate::frame::{BinaryFrame, RasterFrame};

/// Converts one raster frame to a binary frame.
///
/// Fails with [`DotsError::InvalidConfig`] for an unusable config and with
/// [`DotsError::DimensionMismatch`] when the frame does not hold exactly
/// `cols * rows` samples.
pub fn binarize(frame: &RasterFrame, config: &ConversionConfig) -> Result<BinaryFrame> {
    config.validate()?;
    let expected = config.cell_count();
    if frame.len() != expected {
        return Err(DotsError::DimensionMismatch { expected, actual: frame.len() });
    }

    let mut levels: Vec<f32> = Vec::with_capacity(expected);
    if config.tone.is_identity() {
        levels.extend(frame.samples().iter().map(|&p| p as f32));
    } else {
        levels.extend(frame.samples().iter().map(|&p| config.tone.apply(p as f32)));
    }

    let mut dots = if config.dither {
        error_diffusion(&levels, config.cols, config.rows)?
    } else {
        threshold(&levels, config.threshold)
    };

    if config.flip_horizontal {
        for row in dots.chunks_exact_mut(config.cols as usize) {
            row.reverse();
        }
    }
    if config.flip_vertical {
        flip_rows(&mut dots, config.cols as usize);
    }
    if config.invert {
        for v in dots.iter_mut() {
            *v = 1.0 - *v;
        }
    }

    Ok(BinaryFrame::from_dots(dots))
}

/// `1.0` where the level is strictly above the cutoff.
fn threshold(levels: &[f32], cutoff: u8) -> Vec<f32> {
    let cutoff = cutoff as f32;
    levels.iter().map(|&p| if p > cutoff { 1.0 } else { 0.0 }).collect()
}

/// One-bit Floyd-Steinberg over the rounded levels.
///
/// The palette splits at 128: levels above 127 become on. Error that would
/// land outside the grid is dropped.
fn error_diffusion(levels: &[f32], cols: u32, rows: u32) -> Result<Vec<f32>> {
    let raw: Vec<u8> = levels.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect();
    let len = raw.len();
    if len == 1 {
        return Ok(vec![if raw[0] > 127 { 1.0 } else { 0.0 }]);
    }
    // `imageops::dither` needs at least two columns. A single column is laid
    // out the same as a single row, so it is diffused as one.
    let (width, height) = if cols == 1 { (rows, 1) } else { (cols, rows) };
    let mut img = GrayImage::from_raw(width, height, raw).ok_or(DotsError::DimensionMismatch {
        expected: cols as usize * rows as usize,
        actual: len,
    })?;
    imageops::dither(&mut img, &BiLevel);
    Ok(img.into_raw().into_iter().map(|p| if p > 0 { 1.0 } else { 0.0 }).collect())
}

fn flip_rows(dots: &mut [f32], cols: usize) {
    let rows = dots.len() / cols;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = dots.split_at_mut(bottom * cols);
        head[top * cols..(top + 1) * cols].swap_with_slice(&mut tail[..cols]);
    }
}
