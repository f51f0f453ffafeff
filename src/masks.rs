//! Mask synthesis: salient-object mask and auto-color (probable logo) mask
//!
//! Both masks are single-channel images with the source's dimensions and
//! values in {0, 255}. Consumers treat values above [`MASK_THRESHOLD`] as
//! foreground.

use crate::segmentation::SaliencySegmenter;
use image::{imageops::FilterType, GrayImage, Luma, RgbaImage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

/// Values strictly above this are foreground
pub const MASK_THRESHOLD: u8 = 128;

/// Tuning for the auto-color heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskOptions {
    /// Fraction of the image height, measured from the bottom, that is analysed
    pub roi_height_ratio: f32,
    /// Luminance floor for the brightness mask (strictly greater passes)
    pub min_bright: u8,
    /// Color quantization bucket width
    pub color_quant: u8,
    /// Number of dominant quantized colors to include
    pub top_colors: usize,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            roi_height_ratio: 0.35,
            min_bright: 180,
            color_quant: 16,
            top_colors: 3,
        }
    }
}

/// The two masks produced for one source image
#[derive(Debug, Clone)]
pub struct MaskSet {
    pub salient: GrayImage,
    pub auto_color: GrayImage,
}

impl MaskSet {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.salient.dimensions()
    }

    #[must_use]
    pub fn salient_is_empty(&self) -> bool {
        is_empty(&self.salient)
    }

    #[must_use]
    pub fn auto_color_is_empty(&self) -> bool {
        is_empty(&self.auto_color)
    }
}

/// True when no pixel is above the foreground threshold
#[must_use]
pub fn is_empty(mask: &GrayImage) -> bool {
    !mask.pixels().any(|p| p[0] > MASK_THRESHOLD)
}

/// Number of foreground pixels
#[must_use]
pub fn foreground_count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > MASK_THRESHOLD).count()
}

/// Normalize to the canonical {0, 255} domain
#[must_use]
pub fn binarize(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > MASK_THRESHOLD {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Pixel-wise union of two masks of equal size
#[must_use]
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine(a, b, |x, y| x || y)
}

/// Pixel-wise intersection of two masks of equal size
#[must_use]
pub fn intersection(a: &GrayImage, b: &GrayImage) -> GrayImage {
    combine(a, b, |x, y| x && y)
}

fn combine(a: &GrayImage, b: &GrayImage, op: impl Fn(bool, bool) -> bool) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let av = a.get_pixel(x, y)[0] > MASK_THRESHOLD;
        let bv = b
            .get_pixel_checked(x, y)
            .is_some_and(|p| p[0] > MASK_THRESHOLD);
        Luma([if op(av, bv) { 255 } else { 0 }])
    })
}

/// Produces the salient and auto-color masks for a source image
pub struct MaskSynthesizer {
    segmenter: Box<dyn SaliencySegmenter>,
    options: MaskOptions,
}

impl MaskSynthesizer {
    #[must_use]
    pub fn new(segmenter: Box<dyn SaliencySegmenter>, options: MaskOptions) -> Self {
        Self { segmenter, options }
    }

    /// Compute both masks. Never fails: an unavailable segmenter yields an
    /// empty salient mask, which downstream strategies handle explicitly.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn synthesize(&self, image: &RgbaImage) -> MaskSet {
        let salient = self.salient_mask(image);
        let auto_color = auto_color_mask(image, &self.options);
        debug!(
            "Masks ready: salient={} px, auto_color={} px",
            foreground_count(&salient),
            foreground_count(&auto_color)
        );
        MaskSet { salient, auto_color }
    }

    fn salient_mask(&self, image: &RgbaImage) -> GrayImage {
        let (width, height) = image.dimensions();
        match self.segmenter.segment(image) {
            Ok(Some(raw)) => {
                let sized = if raw.dimensions() == (width, height) {
                    raw
                } else {
                    debug!(
                        "Resizing salient mask {}x{} -> {}x{}",
                        raw.width(),
                        raw.height(),
                        width,
                        height
                    );
                    image::imageops::resize(&raw, width, height, FilterType::Triangle)
                };
                binarize(&sized)
            },
            Ok(None) => {
                warn!(
                    "Salient segmentation unavailable ({}); using empty mask",
                    self.segmenter.name()
                );
                GrayImage::new(width, height)
            },
            Err(e) => {
                warn!(
                    "Salient segmentation failed ({}): {}; using empty mask",
                    self.segmenter.name(),
                    e
                );
                GrayImage::new(width, height)
            },
        }
    }
}

/// First row of the analysed bottom region
#[must_use]
pub fn roi_start_row(height: u32, roi_height_ratio: f32) -> u32 {
    let ratio = roi_height_ratio.clamp(0.0, 1.0);
    ((height as f32 * (1.0 - ratio)) as u32).min(height)
}

/// ITU-R 601 luma, rounded like the usual 8-bit grayscale conversion
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)).round() as u8
}

/// Heuristic logo mask over the bottom region: bright pixels plus pixels
/// close to one of the dominant quantized colors.
#[must_use]
pub fn auto_color_mask(image: &RgbaImage, options: &MaskOptions) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut mask = GrayImage::new(width, height);
    let start = roi_start_row(height, options.roi_height_ratio);
    if start >= height || width == 0 {
        return mask;
    }

    let quant = options.color_quant.max(1);
    let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
    for y in start..height {
        for x in 0..width {
            let p = image.get_pixel(x, y);
            let key = [
                (p[0] / quant) * quant,
                (p[1] / quant) * quant,
                (p[2] / quant) * quant,
            ];
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<([u8; 3], usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let dominant: Vec<[u8; 3]> = ranked
        .into_iter()
        .take(options.top_colors)
        .map(|(color, _)| color)
        .collect();
    debug!("Dominant bottom-region colors: {:?}", dominant);

    let in_range = |value: u8, center: u8| {
        let lower = center.saturating_sub(quant);
        let upper = center.saturating_add(quant);
        (lower..=upper).contains(&value)
    };

    for y in start..height {
        for x in 0..width {
            let p = image.get_pixel(x, y);
            let bright = luminance(p[0], p[1], p[2]) > options.min_bright;
            let dominant_hit = dominant.iter().any(|c| {
                in_range(p[0], c[0]) && in_range(p[1], c[1]) && in_range(p[2], c[2])
            });
            if bright || dominant_hit {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::segmentation::NoSaliency;
    use image::Rgba;

    struct FixedSegmenter(GrayImage);

    impl SaliencySegmenter for FixedSegmenter {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn segment(&self, _image: &RgbaImage) -> Result<Option<GrayImage>> {
            Ok(Some(self.0.clone()))
        }
    }

    /// Noisy mid-gray image so no single quantized color dominates by accident
    fn textured(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = 40 + ((x * 7 + y * 13) % 64) as u8;
            Rgba([v, v.wrapping_add(3), v.wrapping_add(5), 255])
        })
    }

    #[test]
    fn test_auto_mask_never_above_region() {
        let mut img = textured(40, 100);
        // Bright marks both above and inside the bottom region
        for x in 0..40 {
            img.put_pixel(x, 10, Rgba([250, 250, 250, 255]));
            img.put_pixel(x, 90, Rgba([250, 250, 250, 255]));
        }
        let options = MaskOptions::default();
        let mask = auto_color_mask(&img, &options);
        let start = roi_start_row(100, options.roi_height_ratio);
        assert_eq!(start, 65);
        for y in 0..start {
            for x in 0..40 {
                assert_eq!(mask.get_pixel(x, y)[0], 0, "pixel ({x},{y}) above region");
            }
        }
        assert_eq!(mask.get_pixel(5, 90)[0], 255);
    }

    #[test]
    fn test_auto_mask_brightness_threshold_is_strict() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 9, Rgba([180, 180, 180, 255]));
        img.put_pixel(2, 9, Rgba([181, 181, 181, 255]));
        let options = MaskOptions {
            top_colors: 0,
            ..MaskOptions::default()
        };
        let mask = auto_color_mask(&img, &options);
        assert_eq!(mask.get_pixel(1, 9)[0], 0);
        assert_eq!(mask.get_pixel(2, 9)[0], 255);
    }

    #[test]
    fn test_auto_mask_dominant_color() {
        // Bottom region: mostly dark red, a few blue pixels
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([120, 10, 10, 255]));
        img.put_pixel(3, 18, Rgba([10, 10, 200, 255]));
        let options = MaskOptions {
            top_colors: 1,
            min_bright: 255,
            ..MaskOptions::default()
        };
        let mask = auto_color_mask(&img, &options);
        assert_eq!(mask.get_pixel(0, 19)[0], 255);
        assert_eq!(mask.get_pixel(3, 18)[0], 0);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_synthesize_without_segmenter() {
        let synth = MaskSynthesizer::new(Box::new(NoSaliency), MaskOptions::default());
        let masks = synth.synthesize(&textured(16, 16));
        assert_eq!(masks.dimensions(), (16, 16));
        assert!(masks.salient_is_empty());
    }

    #[test]
    fn test_synthesize_binarizes_and_resizes() {
        let raw = GrayImage::from_fn(8, 8, |x, _| Luma([if x < 4 { 200 } else { 100 }]));
        let synth = MaskSynthesizer::new(Box::new(FixedSegmenter(raw)), MaskOptions::default());
        let masks = synth.synthesize(&textured(16, 16));
        assert_eq!(masks.salient.dimensions(), (16, 16));
        assert!(masks.salient.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(masks.salient.get_pixel(1, 1)[0], 255);
        assert_eq!(masks.salient.get_pixel(14, 1)[0], 0);
    }

    #[test]
    fn test_union_and_intersection() {
        let a = GrayImage::from_fn(4, 1, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
        let b = GrayImage::from_fn(4, 1, |x, _| Luma([if x % 2 == 0 { 255 } else { 0 }]));
        let u = union(&a, &b);
        let i = intersection(&a, &b);
        assert_eq!(u.as_raw(), &vec![255, 255, 255, 0]);
        assert_eq!(i.as_raw(), &vec![255, 0, 0, 0]);
        assert_eq!(foreground_count(&u), 3);
    }
}
