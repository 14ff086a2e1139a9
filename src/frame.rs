//! Frame types flowing through the pipeline.

use image::{DynamicImage, Rgb};
use serde::{Deserialize, Serialize};

use crate::error::{DotsError, Result};

/// Luminance samples of one decoded frame, row-major, 0-255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    samples: Vec<u8>,
}

impl RasterFrame {
    pub fn new(samples: Vec<u8>) -> Self {
        Self { samples }
    }

    /// Reduces a decoded image to luminance and checks it has exactly
    /// `cols x rows` pixels.
    pub fn from_image(img: &DynamicImage, cols: u32, rows: u32) -> Result<Self> {
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        if w != cols || h != rows {
            return Err(DotsError::DimensionMismatch {
                expected: cols as usize * rows as usize,
                actual: w as usize * h as usize,
            });
        }
        let samples = rgb.pixels().map(|px| luminance(*px)).collect();
        Ok(Self { samples })
    }

    #[inline]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<Vec<u8>> for RasterFrame {
    fn from(samples: Vec<u8>) -> Self {
        Self::new(samples)
    }
}

/// One binarized frame: `cols * rows` values, each exactly 0.0 or 1.0.
///
/// Serialized as a bare JSON array so every value prints as `0.0`/`1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryFrame(Vec<f32>);

impl BinaryFrame {
    pub(crate) fn from_dots(dots: Vec<f32>) -> Self {
        Self(dots)
    }

    /// Builds a frame from on/off flags.
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        Self(bits.into_iter().map(|on| if on { 1.0 } else { 0.0 }).collect())
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_on(&self, idx: usize) -> bool {
        self.0.get(idx).is_some_and(|v| *v >= 0.5)
    }

    /// Number of lit dots.
    pub fn lit_count(&self) -> usize {
        self.0.iter().filter(|v| **v >= 0.5).count()
    }

    /// Flips every dot. Applying it twice gives back the same frame.
    pub fn inverted(&self) -> Self {
        Self(self.0.iter().map(|v| 1.0 - v).collect())
    }

    pub(crate) fn is_binary(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0 || *v == 1.0)
    }
}

/// ITU-R BT.601 luma in 16-bit fixed point, rounded. The weights sum to
/// exactly 65536 so white stays 255.
pub(crate) fn luminance(rgb: Rgb<u8>) -> u8 {
    let r = rgb[0] as u32;
    let g = rgb[1] as u32;
    let b = rgb[2] as u32;
    ((r * 19595 + g * 38470 + b * 7471 + 0x8000) >> 16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn luminance_of_primaries() {
        assert_eq!(luminance(Rgb([0, 0, 0])), 0);
        assert_eq!(luminance(Rgb([255, 255, 255])), 255);
        assert_eq!(luminance(Rgb([255, 0, 0])), 76);
        assert_eq!(luminance(Rgb([0, 255, 0])), 150);
        assert_eq!(luminance(Rgb([0, 0, 255])), 29);
    }

    #[test]
    fn from_image_is_row_major() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        img.put_pixel(0, 1, Rgb([100, 100, 100]));
        let frame = RasterFrame::from_image(&DynamicImage::ImageRgb8(img), 2, 2).unwrap();
        assert_eq!(frame.samples(), &[0, 255, 100, 0]);
    }

    #[test]
    fn from_image_rejects_wrong_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
        let err = RasterFrame::from_image(&img, 4, 3).unwrap_err();
        assert!(matches!(err, DotsError::DimensionMismatch { expected: 12, actual: 8 }));
    }

    #[test]
    fn serializes_as_float_literals() {
        let frame = BinaryFrame::from_bits([false, true, true]);
        assert_eq!(serde_json::to_string(&frame).unwrap(), "[0.0,1.0,1.0]");
    }

    #[test]
    fn inverted_twice_is_identity() {
        let frame = BinaryFrame::from_bits([true, false, false, true]);
        assert_eq!(frame.inverted().inverted(), frame);
        assert_eq!(frame.inverted().lit_count(), 2);
    }
}
