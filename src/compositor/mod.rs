//! Product card compositing
//!
//! The compositor draws on a canvas `supersampling` times larger than the
//! requested output, then sharpens, saturates, smooths and downsamples it.
//! All element positions come from [`layout::LayoutCoefficients`].

pub mod fonts;
pub mod layout;
pub mod postprocess;

use self::{
    fonts::{draw_text, FontSet, FontWeight},
    layout::{CardGeometry, IndexBoxGeometry, LayoutCoefficients, PixelRect, TextSlot},
};
use crate::{
    config::{ColorConfig, RenderSettings},
    error::{CardError, Result},
    types::ProductData,
    utils::parse_hex_color,
};
use ab_glyph::FontVec;
use image::{
    imageops::{self, FilterType},
    Rgba, RgbaImage,
};
use instant::Instant;
use log::debug;
use tracing::{info as trace_info, instrument};

/// Parsed card palette
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSet {
    pub white: Rgba<u8>,
    pub black: Rgba<u8>,
    pub cyan: Rgba<u8>,
    pub light_bg: Rgba<u8>,
    pub load_idx_bg: Rgba<u8>,
    pub speed_idx_bg: Rgba<u8>,
}

impl ColorSet {
    /// # Errors
    /// `CardError::InvalidConfig` when any color is not a hex triplet
    pub fn from_config(colors: &ColorConfig) -> Result<Self> {
        Ok(Self {
            white: parse_hex_color(&colors.white)?,
            black: parse_hex_color(&colors.black)?,
            cyan: parse_hex_color(&colors.cyan)?,
            light_bg: parse_hex_color(&colors.light_bg)?,
            load_idx_bg: parse_hex_color(&colors.load_idx_bg)?,
            speed_idx_bg: parse_hex_color(&colors.speed_idx_bg)?,
        })
    }
}

/// Season caption shown in the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Summer,
    Winter,
    AllSeason,
}

impl Season {
    /// Case-insensitive keyword match; anything unrecognised is all-season
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.trim().to_lowercase().as_str() {
            "summer" | "летняя" | "лето" => Self::Summer,
            "winter" | "зимняя" | "зима" => Self::Winter,
            _ => Self::AllSeason,
        }
    }

    /// The two caption lines
    #[must_use]
    pub fn lines(self) -> (&'static str, &'static str) {
        match self {
            Self::Summer => ("ЛЕТНЯЯ", "РЕЗИНА"),
            Self::Winter => ("ЗИМНЯЯ", "РЕЗИНА"),
            Self::AllSeason => ("ЛЮБОЙ", "СЕЗОН"),
        }
    }
}

/// Renders product cards from a template, a product cutout and attributes
#[derive(Debug)]
pub struct LayoutCompositor {
    coefficients: LayoutCoefficients,
    fonts: FontSet,
    colors: ColorSet,
    supersampling: u32,
    draw_panels: bool,
}

impl LayoutCompositor {
    #[must_use]
    pub fn new(fonts: FontSet, colors: ColorSet) -> Self {
        Self {
            coefficients: LayoutCoefficients::DEFAULT,
            fonts,
            colors,
            supersampling: 3,
            draw_panels: false,
        }
    }

    /// Load fonts and copy render options from resolved task settings
    ///
    /// # Errors
    /// Font loading errors from [`FontSet::load`]
    pub fn from_settings(settings: &RenderSettings) -> Result<Self> {
        Ok(Self::new(FontSet::load(&settings.fonts)?, settings.colors)
            .with_supersampling(settings.supersampling)
            .with_panels(settings.draw_panels))
    }

    #[must_use]
    pub fn with_supersampling(mut self, factor: u32) -> Self {
        self.supersampling = factor.max(1);
        self
    }

    #[must_use]
    pub fn with_panels(mut self, draw_panels: bool) -> Self {
        self.draw_panels = draw_panels;
        self
    }

    /// Render one card at `width x height`
    ///
    /// # Errors
    /// `CardError::Compositing` for a zero-sized canvas or template
    #[instrument(skip_all, fields(width = width, height = height, supersampling = self.supersampling))]
    pub fn compose(
        &self,
        template: &RgbaImage,
        product: &RgbaImage,
        attributes: &ProductData,
        width: u32,
        height: u32,
        icon: Option<&RgbaImage>,
    ) -> Result<RgbaImage> {
        if width == 0 || height == 0 {
            return Err(CardError::compositing(format!(
                "canvas must be non-empty, got {}x{}",
                width, height
            )));
        }
        if template.width() == 0 || template.height() == 0 {
            return Err(CardError::compositing("template image is empty"));
        }
        let start = Instant::now();

        let ss_w = width.saturating_mul(self.supersampling);
        let ss_h = height.saturating_mul(self.supersampling);
        let geometry = self.coefficients.geometry(ss_w, ss_h);
        let mut canvas = imageops::resize(template, ss_w, ss_h, FilterType::Lanczos3);

        if self.draw_panels {
            self.paint_panels(&mut canvas, &geometry);
        }

        let tire = geometry.tire;
        if product.width() > 0 && product.height() > 0 && tire.width > 0 && tire.height > 0 {
            let resized = imageops::resize(product, tire.width, tire.height, FilterType::Lanczos3);
            imageops::overlay(&mut canvas, &resized, i64::from(tire.x), i64::from(tire.y));
        } else {
            debug!("Product image or tire slot is empty, skipping paste");
        }

        self.draw_texts(&mut canvas, &geometry, attributes);

        if let Some(icon) = icon.filter(|_| geometry.icon.width > 0 && geometry.icon.height > 0) {
            let slot = geometry.icon;
            let resized = imageops::resize(icon, slot.width, slot.height, FilterType::CatmullRom);
            imageops::overlay(&mut canvas, &resized, i64::from(slot.x), i64::from(slot.y));
        }

        let card = postprocess::finish(&canvas, width, height);
        trace_info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Card composited"
        );
        Ok(card)
    }

    fn draw_texts(&self, canvas: &mut RgbaImage, g: &CardGeometry, attributes: &ProductData) {
        let bold = self.fonts.face(FontWeight::Bold);
        let semibold = self.fonts.face(FontWeight::SemiBold);
        let c = &self.colors;

        let mut text = |font: &FontVec, slot: &TextSlot, color: Rgba<u8>, value: &str| {
            debug!(
                "text \"{}\" at ({}, {}) size {} {:?}",
                value, slot.x, slot.y, slot.size, slot.anchor
            );
            draw_text(canvas, font, slot, color, value);
        };

        text(bold, &g.brand, c.white, &attributes.brand);
        text(semibold, &g.model, c.white, &attributes.model);
        text(semibold, &g.spec_text, c.black, &attributes.spec_line());
        text(bold, &g.rim_text, c.white, &attributes.diameter);
        text(bold, &g.load_index.value, c.white, &attributes.load_index);
        text(bold, &g.speed_index.value, c.white, &attributes.speed_index);

        let (line1, line2) = Season::from_keyword(&attributes.season).lines();
        text(bold, &g.season_line1, c.white, line1);
        text(bold, &g.season_line2, c.white, line2);
    }

    fn paint_panels(&self, canvas: &mut RgbaImage, g: &CardGeometry) {
        let c = &self.colors;
        fill_rounded_rect(canvas, &g.spec_box, g.spec_radius, c.light_bg);
        fill_rounded_rect(canvas, &g.rim_box, g.load_index.radius, c.cyan);

        let regular = self.fonts.face(FontWeight::Regular);
        let mut index_box = |b: &IndexBoxGeometry, fill: Rgba<u8>, caption: &str| {
            fill_rounded_rect(canvas, &b.rect, b.radius, fill);
            draw_text(canvas, regular, &b.caption1, c.white, "индекс");
            draw_text(canvas, regular, &b.caption2, c.white, caption);
        };
        index_box(&g.load_index, c.load_idx_bg, "нагрузки");
        index_box(&g.speed_index, c.speed_idx_bg, "скорости");
    }
}

/// Source-over blend of `color` at `coverage` onto `dst`
pub(crate) fn blend_pixel(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let sa = coverage.clamp(0.0, 1.0) * f32::from(color[3]) / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let v = (f32::from(color[i]) * sa + f32::from(dst[i]) * da * (1.0 - sa)) / out_a;
        dst[i] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Fill an inclusive rectangle with circular corners of `radius`
pub(crate) fn fill_rounded_rect(canvas: &mut RgbaImage, rect: &PixelRect, radius: u32, color: Rgba<u8>) {
    let w = rect.width() + 1;
    let h = rect.height() + 1;
    if w <= 0 || h <= 0 {
        return;
    }
    let r = (radius as i32).min(w / 2).min(h / 2);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);

    for y in rect.y0.max(0)..=rect.y1.min(ch - 1) {
        for x in rect.x0.max(0)..=rect.x1.min(cw - 1) {
            if rounded_rect_contains(x - rect.x0, y - rect.y0, w, h, r) {
                blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), color, 1.0);
            }
        }
    }
}

fn rounded_rect_contains(x: i32, y: i32, w: i32, h: i32, r: i32) -> bool {
    if r <= 0 || (x >= r && x < w - r) || (y >= r && y < h - r) {
        return true;
    }
    let cx = if x < r { r - 1 } else { w - r };
    let cy = if y < r { r - 1 } else { h - r };
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= r * r
}
