//! Text-to-PNG rendering
//!
//! Lines are measured with the strategy chain in [`measure`], the canvas is
//! sized from the widest and tallest line, and every line advances the pen by
//! the same (tallest) line height.

pub mod font;
pub mod measure;
pub mod raster;

use crate::Result;
use image::Rgb;
use measure::MeasureStrategy;
use std::path::PathBuf;

/// System font tried when no font is configured or the configured one fails.
pub const FALLBACK_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf";

/// Rendering options
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Preferred monospace font file
    pub font_path: Option<PathBuf>,
    /// Font file tried after `font_path`
    pub fallback_font_path: PathBuf,
    /// Font size in pixels
    pub font_size: u32,
    /// Margin on every side of the text, in pixels
    pub padding: u32,
    pub background: [u8; 3],
    pub foreground: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            fallback_font_path: PathBuf::from(FALLBACK_FONT_PATH),
            font_size: 16,
            padding: 12,
            background: [0, 0, 0],
            foreground: [0, 255, 0],
        }
    }
}

/// A rendered PNG together with its pixel dimensions
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}'
            | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split on every line boundary (`\r\n` counts as one). A trailing boundary
/// does not start a new line, and an input with no lines renders as one empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }

    if lines.is_empty() {
        lines.push("");
    }
    lines
}

/// Turns command output into encoded image bytes.
pub trait TextRenderer {
    fn render_image(&self, text: &str) -> Result<Vec<u8>>;
}

impl<F> TextRenderer for F
where
    F: Fn(&str) -> Result<Vec<u8>>,
{
    fn render_image(&self, text: &str) -> Result<Vec<u8>> {
        self(text)
    }
}

pub struct Renderer {
    config: RenderConfig,
    measurers: Vec<Box<dyn MeasureStrategy>>,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            measurers: measure::default_chain(),
        }
    }

    /// Replace the measurement chain.
    pub fn with_measurers(mut self, measurers: Vec<Box<dyn MeasureStrategy>>) -> Self {
        self.measurers = measurers;
        self
    }

    /// Render `text` and return the PNG bytes.
    pub fn render_image(&self, text: &str) -> Result<Vec<u8>> {
        self.render(text).map(|img| img.png_data)
    }

    pub fn render(&self, text: &str) -> Result<RenderedImage> {
        let cfg = &self.config;
        let lines = split_lines(text);
        let font = font::resolve_font(
            cfg.font_path.as_deref(),
            &cfg.fallback_font_path,
            cfg.font_size,
        );
        log::debug!("rendering {} line(s) with {}", lines.len(), font.describe());

        let mut max_width = 0u32;
        let mut max_height = 0u32;
        for line in &lines {
            let size = measure::measure_line(&self.measurers, &font, line)?;
            max_width = max_width.max(size.width);
            max_height = max_height.max(size.height);
        }

        let (width, height) = raster::canvas_size(max_width, max_height, lines.len(), cfg.padding)?;
        let mut canvas = raster::new_canvas(width, height, Rgb(cfg.background));

        let mut y = cfg.padding;
        for line in &lines {
            if !line.is_empty() {
                let mask = font.rasterize(line);
                raster::composite_mask(&mut canvas, &mask, cfg.padding, y, Rgb(cfg.foreground));
            }
            y = y.saturating_add(max_height);
        }

        let png_data = raster::encode_png(&canvas).map_err(|e| {
            log::error!("failed to encode PNG: {}", e);
            e
        })?;

        Ok(RenderedImage {
            width,
            height,
            png_data,
        })
    }
}

impl TextRenderer for Renderer {
    fn render_image(&self, text: &str) -> Result<Vec<u8>> {
        Renderer::render_image(self, text)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}
