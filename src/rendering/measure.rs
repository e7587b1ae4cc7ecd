//! Line measurement as an ordered chain of strategies.
//!
//! Each strategy either measures the line, reports that it cannot handle the
//! font ([`MeasureError::Unsupported`]), or fails outright. Only
//! `Unsupported` moves the chain on to the next strategy.

use super::font::MonoFont;
use crate::{Error, Result};

/// Rendered size of one line in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextSize {
    pub width: u32,
    pub height: u32,
}

impl TextSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    /// The strategy has no way to measure with this font.
    #[error("{0} is not supported for this font")]
    Unsupported(&'static str),

    #[error("measurement failed: {0}")]
    Failed(String),
}

pub trait MeasureStrategy {
    fn name(&self) -> &'static str;

    fn measure(&self, font: &MonoFont, line: &str) -> std::result::Result<TextSize, MeasureError>;
}

/// Bounding box of the line as laid out on the drawing surface: ink bounds
/// widened to include the caret advance, measured from the top of the line.
/// Needs glyph outlines, so bitmap fonts are unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceBbox;

impl MeasureStrategy for SurfaceBbox {
    fn name(&self) -> &'static str {
        "surface bbox"
    }

    fn measure(&self, font: &MonoFont, line: &str) -> std::result::Result<TextSize, MeasureError> {
        let MonoFont::Outline(font) = font else {
            return Err(MeasureError::Unsupported(self.name()));
        };

        let advance = font.advance_width(line);
        let (left, right, top, bottom) = match font.ink_bounds(line) {
            Some(ink) => (
                ink.min.x.min(0.0),
                ink.max.x.max(advance),
                ink.min.y.min(0.0),
                ink.max.y.max(0.0),
            ),
            None => (0.0, advance, 0.0, 0.0),
        };
        Ok(TextSize::new(
            (right - left).ceil() as u32,
            (bottom - top).ceil() as u32,
        ))
    }
}

/// Font-level box: advance width times the font's line height.
#[derive(Debug, Default, Clone, Copy)]
pub struct FontBbox;

impl MeasureStrategy for FontBbox {
    fn name(&self) -> &'static str {
        "font bbox"
    }

    fn measure(&self, font: &MonoFont, line: &str) -> std::result::Result<TextSize, MeasureError> {
        Ok(match font {
            MonoFont::Outline(f) => TextSize::new(
                f.advance_width(line).ceil() as u32,
                f.line_height().ceil() as u32,
            ),
            MonoFont::Bitmap(f) => TextSize::new(f.line_width(line), f.cell_height()),
        })
    }
}

/// Rasterize the line and read the mask dimensions. Works for every font.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskSize;

impl MeasureStrategy for MaskSize {
    fn name(&self) -> &'static str {
        "mask size"
    }

    fn measure(&self, font: &MonoFont, line: &str) -> std::result::Result<TextSize, MeasureError> {
        let (width, height) = font.rasterize(line).dimensions();
        Ok(TextSize::new(width, height))
    }
}

/// Surface bbox, then font bbox, then mask size.
pub fn default_chain() -> Vec<Box<dyn MeasureStrategy>> {
    vec![Box::new(SurfaceBbox), Box::new(FontBbox), Box::new(MaskSize)]
}

/// Measure a line with the first strategy that supports the font.
/// Empty lines are measured as a single space.
pub fn measure_line(
    chain: &[Box<dyn MeasureStrategy + '_>],
    font: &MonoFont,
    line: &str,
) -> Result<TextSize> {
    let line = if line.is_empty() { " " } else { line };

    for strategy in chain {
        match strategy.measure(font, line) {
            Ok(size) => return Ok(size),
            Err(MeasureError::Unsupported(name)) => {
                log::debug!("{} unavailable, trying next strategy", name);
            }
            Err(e) => {
                return Err(Error::Render(format!("{} failed: {}", strategy.name(), e)));
            }
        }
    }

    Err(Error::Render("no measurement strategy supports this font".into()))
}
