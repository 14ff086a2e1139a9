//! Renders document frames as enlarged round-dot images for a quick look at
//! the result without the target display.

use image::{Rgb, RgbImage};
use std::path::Path;

use crate::document::DotMatrixDocument;
use crate::error::{DotsError, Result};

const LIT: Rgb<u8> = Rgb([255, 176, 0]);
const UNLIT: Rgb<u8> = Rgb([40, 28, 0]);
const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Largest preview the renderer will allocate, in pixels.
pub const MAX_PREVIEW_PIXELS: u64 = 1 << 26;

/// Draws frame `index` with every cell `dot_size` pixels wide.
pub fn render_frame(doc: &DotMatrixDocument, index: usize, dot_size: u32) -> Result<RgbImage> {
    if dot_size == 0 {
        return Err(DotsError::invalid_config("dot size must be at least 1 pixel"));
    }
    let frame = doc.frame(index)?;
    let cols = doc.cols();
    let (width, height) = preview_size(cols, doc.rows(), dot_size)?;
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

    let center = (dot_size as f32 - 1.0) / 2.0;
    let radius = (dot_size as f32 * 0.45).max(0.5);
    let r2 = radius * radius;

    for i in 0..frame.len() {
        let color = if frame.is_on(i) { LIT } else { UNLIT };
        let cx = (i as u32 % cols) * dot_size;
        let cy = (i as u32 / cols) * dot_size;
        for dy in 0..dot_size {
            for dx in 0..dot_size {
                let fx = dx as f32 - center;
                let fy = dy as f32 - center;
                if fx * fx + fy * fy <= r2 {
                    img.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }
    Ok(img)
}

fn preview_size(cols: u32, rows: u32, dot_size: u32) -> Result<(u32, u32)> {
    let too_large = || {
        DotsError::invalid_config(format!(
            "a {}x{} preview at dot size {} exceeds {} pixels",
            cols, rows, dot_size, MAX_PREVIEW_PIXELS
        ))
    };
    let width = cols.checked_mul(dot_size).ok_or_else(too_large)?;
    let height = rows.checked_mul(dot_size).ok_or_else(too_large)?;
    if width as u64 * height as u64 > MAX_PREVIEW_PIXELS {
        return Err(too_large());
    }
    Ok((width, height))
}

pub fn save_preview(doc: &DotMatrixDocument, index: usize, dot_size: u32, path: &Path) -> Result<()> {
    let img = render_frame(doc, index, dot_size)?;
    img.save(path)?;
    tracing::info!("preview of frame {} written to {}", index, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::document::assemble;
    use crate::frame::BinaryFrame;

    fn doc() -> DotMatrixDocument {
        let cfg = ConversionConfig::default().with_grid(3, 2);
        let frame = BinaryFrame::from_bits([true, false, false, false, false, true]);
        assemble(vec![frame], &cfg).unwrap()
    }

    #[test]
    fn image_scales_with_dot_size() {
        let img = render_frame(&doc(), 0, 10).unwrap();
        assert_eq!(img.dimensions(), (30, 20));
    }

    #[test]
    fn cell_centers_follow_dot_state() {
        let img = render_frame(&doc(), 0, 10).unwrap();
        assert_eq!(*img.get_pixel(5, 5), LIT);
        assert_eq!(*img.get_pixel(15, 5), UNLIT);
        assert_eq!(*img.get_pixel(25, 15), LIT);
        // corners stay background
        assert_eq!(*img.get_pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn single_pixel_dots_fill_the_cell() {
        let img = render_frame(&doc(), 0, 1).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(*img.get_pixel(0, 0), LIT);
        assert_eq!(*img.get_pixel(1, 0), UNLIT);
    }

    #[test]
    fn rejects_bad_index_and_zero_size() {
        assert!(matches!(render_frame(&doc(), 1, 4), Err(DotsError::FrameOutOfRange { .. })));
        assert!(matches!(render_frame(&doc(), 0, 0), Err(DotsError::InvalidConfig(_))));
    }

    #[test]
    fn oversized_dots_are_an_error() {
        let cfg = ConversionConfig::default();
        let big = assemble(vec![BinaryFrame::from_bits(vec![true; 1200])], &cfg).unwrap();
        // 40 * 200M overflows u32
        assert!(matches!(render_frame(&big, 0, 200_000_000), Err(DotsError::InvalidConfig(_))));
        // fits in u32 per side but not in the pixel budget
        assert!(matches!(render_frame(&big, 0, 10_000), Err(DotsError::InvalidConfig(_))));
        assert!(render_frame(&big, 0, 12).is_ok());
    }

    #[test]
    fn saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        save_preview(&doc(), 0, 4, &path).unwrap();
        let loaded = image::open(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (12, 8));
    }
}
