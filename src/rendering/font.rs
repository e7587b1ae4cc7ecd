//! Monospace font resolution and per-line rasterization.
//!
//! Fonts are tried in order: the caller's font file, the system fallback
//! path, then an 8x8 bitmap font compiled into the binary. Load failures are
//! logged and never abort rendering.

use ab_glyph::{point, Font, FontVec, Glyph, GlyphId, PxScale, Rect, ScaleFont};
use font8x8::{
    UnicodeFonts, BASIC_FONTS, BLOCK_FONTS, BOX_FONTS, GREEK_FONTS, HIRAGANA_FONTS, LATIN_FONTS,
    MISC_FONTS,
};
use image::GrayImage;
use std::path::{Path, PathBuf};

/// Why a font file could not be used
#[derive(Debug, thiserror::Error)]
pub enum FontLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a usable font: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// A TrueType/OpenType font at a fixed pixel scale
pub struct OutlineFont {
    font: FontVec,
    scale: PxScale,
    path: PathBuf,
}

impl OutlineFont {
    pub fn load(path: &Path, size_px: u32) -> Result<Self, FontLoadError> {
        let data = std::fs::read(path).map_err(|source| FontLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(data).map_err(|e| FontLoadError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            font,
            scale: PxScale::from(size_px as f32),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ascent plus descent.
    pub fn line_height(&self) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        scaled.ascent() - scaled.descent()
    }

    /// Position glyphs left to right with the top of the line at y = 0.
    /// Returns the glyphs and the caret position after the last one.
    pub fn layout(&self, line: &str) -> (Vec<Glyph>, f32) {
        let scaled = self.font.as_scaled(self.scale);
        let mut caret = point(0.0, scaled.ascent());
        let mut prev: Option<GlyphId> = None;
        let mut glyphs = Vec::with_capacity(line.len());

        for c in line.chars() {
            let mut glyph = scaled.scaled_glyph(c);
            if let Some(prev) = prev {
                caret.x += scaled.kern(prev, glyph.id);
            }
            glyph.position = caret;
            caret.x += scaled.h_advance(glyph.id);
            prev = Some(glyph.id);
            glyphs.push(glyph);
        }

        (glyphs, caret.x)
    }

    /// Union of the pixel bounds of every glyph that has an outline.
    pub fn ink_bounds(&self, line: &str) -> Option<Rect> {
        let (glyphs, _) = self.layout(line);
        glyphs
            .into_iter()
            .filter_map(|g| self.font.outline_glyph(g))
            .map(|og| og.px_bounds())
            .reduce(|a, b| Rect {
                min: point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
                max: point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
            })
    }

    /// Total advance width of the line.
    pub fn advance_width(&self, line: &str) -> f32 {
        self.layout(line).1
    }

    fn rasterize(&self, line: &str) -> GrayImage {
        let (glyphs, advance) = self.layout(line);
        let width = advance.ceil().max(0.0) as u32;
        let height = self.line_height().ceil().max(1.0) as u32;
        let mut mask = GrayImage::new(width, height);

        for glyph in glyphs {
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|x, y, coverage| {
                let px = bounds.min.x as i64 + x as i64;
                let py = bounds.min.y as i64 + y as i64;
                if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                    return;
                }
                let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                let pixel = mask.get_pixel_mut(px as u32, py as u32);
                pixel.0[0] = pixel.0[0].max(value);
            });
        }

        mask
    }
}

/// Hollow box drawn for characters the bitmap font has no glyph for.
const TOFU: [u8; 8] = [0x00, 0x7E, 0x42, 0x42, 0x42, 0x42, 0x7E, 0x00];

/// Built-in 8x8 bitmap font, scaled by an integer factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapFont {
    scale: u32,
}

impl BitmapFont {
    pub const GLYPH_SIZE: u32 = 8;

    /// Largest integer scale that fits the requested pixel size (at least 1).
    pub fn for_size(size_px: u32) -> Self {
        Self {
            scale: (size_px / Self::GLYPH_SIZE).max(1),
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn cell_width(&self) -> u32 {
        Self::GLYPH_SIZE * self.scale
    }

    pub fn cell_height(&self) -> u32 {
        Self::GLYPH_SIZE * self.scale
    }

    pub fn glyph(c: char) -> [u8; 8] {
        BASIC_FONTS
            .get(c)
            .or_else(|| LATIN_FONTS.get(c))
            .or_else(|| BOX_FONTS.get(c))
            .or_else(|| BLOCK_FONTS.get(c))
            .or_else(|| GREEK_FONTS.get(c))
            .or_else(|| HIRAGANA_FONTS.get(c))
            .or_else(|| MISC_FONTS.get(c))
            .unwrap_or(TOFU)
    }

    pub fn line_width(&self, line: &str) -> u32 {
        (line.chars().count() as u32).saturating_mul(self.cell_width())
    }

    fn rasterize(&self, line: &str) -> GrayImage {
        let mut mask = GrayImage::new(self.line_width(line), self.cell_height());
        let s = self.scale;

        for (i, c) in line.chars().enumerate() {
            let x0 = i as u32 * self.cell_width();
            for (row, bits) in Self::glyph(c).iter().enumerate() {
                for col in 0..Self::GLYPH_SIZE {
                    // bit 0 is the leftmost pixel
                    if bits & (1 << col) == 0 {
                        continue;
                    }
                    for dy in 0..s {
                        for dx in 0..s {
                            let (x, y) = (x0 + col * s + dx, row as u32 * s + dy);
                            mask.put_pixel(x, y, image::Luma([255]));
                        }
                    }
                }
            }
        }

        mask
    }
}

/// The font a render pass ended up with
pub enum MonoFont {
    Outline(OutlineFont),
    Bitmap(BitmapFont),
}

impl MonoFont {
    /// Rasterize a line into a coverage mask whose top edge is the top of the line.
    pub fn rasterize(&self, line: &str) -> GrayImage {
        match self {
            MonoFont::Outline(f) => f.rasterize(line),
            MonoFont::Bitmap(f) => f.rasterize(line),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MonoFont::Outline(f) => format!("outline font {}", f.path().display()),
            MonoFont::Bitmap(f) => format!("built-in bitmap font (x{})", f.scale()),
        }
    }
}

/// Resolve the font for a render pass: requested file, then fallback file, then built-in.
pub fn resolve_font(requested: Option<&Path>, fallback: &Path, size_px: u32) -> MonoFont {
    if let Some(path) = requested {
        match OutlineFont::load(path, size_px) {
            Ok(font) => return MonoFont::Outline(font),
            Err(e) => log::warn!("cannot load font {}, falling back: {}", path.display(), e),
        }
    }

    match OutlineFont::load(fallback, size_px) {
        Ok(font) => MonoFont::Outline(font),
        Err(e) => {
            log::warn!("cannot load fallback font, using built-in bitmap font: {}", e);
            MonoFont::Bitmap(BitmapFont::for_size(size_px))
        }
    }
}
