//! Canvas allocation, mask compositing and PNG encoding

use crate::{Error, Result};
use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Canvas size for `line_count` lines of at most `max_width` x `max_height`.
///
/// Height is clamped to at least one pixel of content before padding is added.
pub fn canvas_size(
    max_width: u32,
    max_height: u32,
    line_count: usize,
    padding: u32,
) -> Result<(u32, u32)> {
    let too_large = || Error::Render("text too large for a single image".into());
    let margin = padding.checked_mul(2).ok_or_else(too_large)?;
    let lines = u32::try_from(line_count).map_err(|_| too_large())?;

    let width = max_width.checked_add(margin).ok_or_else(too_large)?;
    let content = max_height.checked_mul(lines).ok_or_else(too_large)?.max(1);
    let height = content.checked_add(margin).ok_or_else(too_large)?;

    // RgbImage::new panics when the backing buffer would not fit in memory
    (width as u64)
        .checked_mul(height as u64)
        .and_then(|px| px.checked_mul(3))
        .filter(|bytes| *bytes <= isize::MAX as u64)
        .ok_or_else(too_large)?;

    Ok((width, height))
}

pub fn new_canvas(width: u32, height: u32, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, background)
}

/// Alpha-blend `color` onto `canvas` using `mask` as coverage, with the mask's
/// top-left corner at (`x`, `y`). Pixels outside the canvas are dropped.
pub fn composite_mask(canvas: &mut RgbImage, mask: &GrayImage, x: u32, y: u32, color: Rgb<u8>) {
    let (cw, ch) = canvas.dimensions();

    for (mx, my, coverage) in mask.enumerate_pixels() {
        let alpha = coverage.0[0] as u32;
        if alpha == 0 {
            continue;
        }
        let (Some(px), Some(py)) = (x.checked_add(mx), y.checked_add(my)) else {
            continue;
        };
        if px >= cw || py >= ch {
            continue;
        }
        let dst = canvas.get_pixel_mut(px, py);
        for (d, s) in dst.0.iter_mut().zip(color.0) {
            *d = ((*d as u32 * (255 - alpha) + s as u32 * alpha) / 255) as u8;
        }
    }
}

/// Encode the canvas as PNG into memory.
pub fn encode_png(canvas: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    canvas
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}
