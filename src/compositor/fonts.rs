//! Font loading and anchored text drawing

use super::{
    blend_pixel,
    layout::{Anchor, HAnchor, TextSlot, VAnchor},
};
use crate::error::{CardError, Result};
use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use log::debug;
use std::path::{Path, PathBuf};

/// Resolved font file locations for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPaths {
    pub bold: PathBuf,
    pub semibold: PathBuf,
    pub regular: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Bold,
    SemiBold,
    Regular,
}

/// The three faces used on a card
pub struct FontSet {
    bold: FontVec,
    semibold: FontVec,
    regular: FontVec,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet").finish_non_exhaustive()
    }
}

impl FontSet {
    /// Load all three faces
    ///
    /// # Errors
    /// * `CardError::MissingResource` - a font file does not exist
    /// * `CardError::Compositing` - a font file cannot be parsed
    pub fn load(paths: &FontPaths) -> Result<Self> {
        Ok(Self {
            bold: load_font(&paths.bold, "font_bold")?,
            semibold: load_font(&paths.semibold, "font_semibold")?,
            regular: load_font(&paths.regular, "font_regular")?,
        })
    }

    #[must_use]
    pub fn face(&self, weight: FontWeight) -> &FontVec {
        match weight {
            FontWeight::Bold => &self.bold,
            FontWeight::SemiBold => &self.semibold,
            FontWeight::Regular => &self.regular,
        }
    }
}

fn load_font(path: &Path, label: &str) -> Result<FontVec> {
    if !path.exists() {
        return Err(CardError::missing_resource(label, path));
    }
    let data = std::fs::read(path).map_err(|e| CardError::file_io_error("read font", path, &e))?;
    let font = FontVec::try_from_vec(data).map_err(|e| {
        CardError::compositing(format!("cannot parse font {}: {}", path.display(), e))
    })?;
    debug!("Loaded {} from {}", label, path.display());
    Ok(font)
}

/// Scale for a font size given in pixels per em
///
/// `PxScale` measures ascent to descent, so the em size is converted through
/// the face's own metrics.
#[must_use]
pub fn em_scale<F: Font>(font: &F, px_per_em: f32) -> PxScale {
    let units_per_em = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(px_per_em * font.height_unscaled() / units_per_em)
}

/// Advance width of `text` including kerning
#[must_use]
pub fn text_width<F: Font>(font: &F, px_per_em: f32, text: &str) -> f32 {
    let scaled = font.as_scaled(em_scale(font, px_per_em));
    let mut width = 0.0;
    let mut prev: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(p) = prev {
            width += scaled.kern(p, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Draw `text` at `slot`, honoring its anchor, blended source-over
pub fn draw_text<F: Font>(canvas: &mut RgbaImage, font: &F, slot: &TextSlot, color: Rgba<u8>, text: &str) {
    if text.is_empty() {
        return;
    }
    let px = slot.size as f32;
    let scaled = font.as_scaled(em_scale(font, px));
    let (origin_x, baseline) = anchor_origin(font, px, slot.x as f32, slot.y as f32, slot.anchor, text);

    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let mut caret = origin_x;
    let mut prev: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(p) = prev {
            caret += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(scaled.scale(), point(caret, baseline));
        caret += scaled.h_advance(id);
        prev = Some(id);

        let Some(outlined) = scaled.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i32 + gx as i32;
            let y = bounds.min.y as i32 + gy as i32;
            if x < 0 || y < 0 || x >= width || y >= height || coverage <= 0.0 {
                return;
            }
            blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), color, coverage);
        });
    }
}

/// Pen start and baseline for an anchored text
fn anchor_origin<F: Font>(font: &F, px: f32, x: f32, y: f32, anchor: Anchor, text: &str) -> (f32, f32) {
    let scaled = font.as_scaled(em_scale(font, px));
    let start = match anchor.h {
        HAnchor::Left => x,
        HAnchor::Middle => x - text_width(font, px, text) / 2.0,
    };
    let baseline = match anchor.v {
        VAnchor::Top => y + scaled.ascent(),
        VAnchor::Baseline => y,
    };
    (start, baseline)
}
