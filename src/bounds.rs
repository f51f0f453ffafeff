//! Content-bounds extraction for transparent product cutouts

use image::{DynamicImage, GenericImageView, RgbaImage};
use log::warn;

/// Alpha values strictly above this count as content
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 10;

/// Pixels added on each side of the tight content box
pub const DEFAULT_MARGIN: u32 = 5;

/// Inclusive-exclusive pixel rectangle `[x0, x1) x [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl ContentBounds {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Grow by `margin` on every side, clamped to a `width x height` image
    #[must_use]
    pub fn expand(self, margin: u32, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.saturating_sub(margin),
            y0: self.y0.saturating_sub(margin),
            x1: self.x1.saturating_add(margin).min(width),
            y1: self.y1.saturating_add(margin).min(height),
        }
    }
}

/// Tightest box around pixels with alpha above `alpha_threshold`.
///
/// Images without an alpha channel are entirely content. Returns `None`
/// when nothing qualifies.
#[must_use]
pub fn content_bounds(image: &DynamicImage, alpha_threshold: u8) -> Option<ContentBounds> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    if !image.color().has_alpha() {
        return Some(ContentBounds {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        });
    }
    alpha_bounds(&image.to_rgba8(), alpha_threshold)
}

fn alpha_bounds(image: &RgbaImage, alpha_threshold: u8) -> Option<ContentBounds> {
    let mut found: Option<ContentBounds> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] <= alpha_threshold {
            continue;
        }
        found = Some(match found {
            None => ContentBounds {
                x0: x,
                y0: y,
                x1: x + 1,
                y1: y + 1,
            },
            Some(b) => ContentBounds {
                x0: b.x0.min(x),
                y0: b.y0.min(y),
                x1: b.x1.max(x + 1),
                y1: b.y1.max(y + 1),
            },
        });
    }
    found
}

/// Crop to the content box plus `margin`.
///
/// An image with no content is returned unchanged; that outcome is logged
/// and rendering continues with it.
#[must_use]
pub fn crop_to_content(image: &DynamicImage, alpha_threshold: u8, margin: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    match content_bounds(image, alpha_threshold) {
        Some(bounds) => {
            let b = bounds.expand(margin, width, height);
            image.crop_imm(b.x0, b.y0, b.width(), b.height())
        },
        None => {
            warn!(
                "No content above alpha {} in {}x{} image; leaving uncropped",
                alpha_threshold, width, height
            );
            image.clone()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    fn square_at(size: u32, x0: u32, y0: u32, side: u32) -> DynamicImage {
        let img = RgbaImage::from_fn(size, size, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                Rgba([10, 20, 30, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_tight_bounds() {
        let img = square_at(100, 20, 30, 10);
        let b = content_bounds(&img, DEFAULT_ALPHA_THRESHOLD).unwrap();
        assert_eq!(b, ContentBounds { x0: 20, y0: 30, x1: 30, y1: 40 });
    }

    #[test]
    fn test_crop_with_margin() {
        let img = square_at(100, 20, 30, 10);
        let cropped = crop_to_content(&img, DEFAULT_ALPHA_THRESHOLD, DEFAULT_MARGIN);
        assert_eq!(cropped.dimensions(), (20, 20));
    }

    #[test]
    fn test_margin_clamped_to_image() {
        let img = square_at(20, 0, 0, 4);
        let cropped = crop_to_content(&img, DEFAULT_ALPHA_THRESHOLD, DEFAULT_MARGIN);
        assert_eq!(cropped.dimensions(), (9, 9));
    }

    #[test]
    fn test_crop_is_idempotent_within_margin() {
        let img = square_at(100, 40, 40, 12);
        let once = crop_to_content(&img, DEFAULT_ALPHA_THRESHOLD, DEFAULT_MARGIN);
        let twice = crop_to_content(&once, DEFAULT_ALPHA_THRESHOLD, DEFAULT_MARGIN);
        let (w1, h1) = once.dimensions();
        let (w2, h2) = twice.dimensions();
        assert!(w1.abs_diff(w2) <= 2 * DEFAULT_MARGIN);
        assert!(h1.abs_diff(h2) <= 2 * DEFAULT_MARGIN);
        assert_eq!((w2, h2), (w1, h1));
    }

    #[test]
    fn test_fully_transparent_unchanged() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(16, 12));
        assert!(content_bounds(&img, DEFAULT_ALPHA_THRESHOLD).is_none());
        let out = crop_to_content(&img, DEFAULT_ALPHA_THRESHOLD, DEFAULT_MARGIN);
        assert_eq!(out.dimensions(), (16, 12));
    }

    #[test]
    fn test_low_alpha_is_background() {
        let mut img = RgbaImage::new(10, 10);
        img.put_pixel(5, 5, Rgba([255, 255, 255, DEFAULT_ALPHA_THRESHOLD]));
        let img = DynamicImage::ImageRgba8(img);
        assert!(content_bounds(&img, DEFAULT_ALPHA_THRESHOLD).is_none());
    }

    #[test]
    fn test_opaque_format_is_all_content() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 5, Rgb([0, 0, 0])));
        let out = crop_to_content(&img, DEFAULT_ALPHA_THRESHOLD, DEFAULT_MARGIN);
        assert_eq!(out.dimensions(), (7, 5));
    }
}
