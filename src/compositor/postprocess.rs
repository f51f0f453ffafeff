//! Finishing filters applied to the supersampled canvas before downsampling

use image::{
    imageops::{self, FilterType},
    Pixel, Rgb32FImage, RgbImage, Rgba, RgbaImage,
};
use imageproc::{filter::filter_clamped, kernel::Kernel, map::map_pixels};

/// Sharpness enhancement factor
pub const SHARPEN_FACTOR: f32 = 2.0;

/// Saturation enhancement factor
pub const SATURATION_FACTOR: f32 = 1.3;

/// 3x3 smoothing used as the degenerate image for sharpening
#[rustfmt::skip]
const SMOOTH_3X3: [f32; 9] = [
    1.0 / 13.0, 1.0 / 13.0, 1.0 / 13.0,
    1.0 / 13.0, 5.0 / 13.0, 1.0 / 13.0,
    1.0 / 13.0, 1.0 / 13.0, 1.0 / 13.0,
];

/// 5x5 "smooth more" kernel
#[rustfmt::skip]
const SMOOTH_MORE_5X5: [f32; 25] = [
    0.01, 0.01, 0.01, 0.01, 0.01,
    0.01, 0.05, 0.05, 0.05, 0.01,
    0.01, 0.05, 0.44, 0.05, 0.01,
    0.01, 0.05, 0.05, 0.05, 0.01,
    0.01, 0.01, 0.01, 0.01, 0.01,
];

/// Sharpen, saturate, smooth, then Lanczos3 down to `width x height`
#[must_use]
pub fn finish(canvas: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let sharpened = sharpen(canvas, SHARPEN_FACTOR);
    let saturated = saturate(&sharpened, SATURATION_FACTOR);
    let smoothed = smooth_more(&saturated);
    imageops::resize(&smoothed, width, height, FilterType::Lanczos3)
}

/// Extrapolate away from a 3x3 smoothed copy. Border pixels are left as is.
#[must_use]
pub fn sharpen(image: &RgbaImage, factor: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return image.clone();
    }
    let smooth: Rgb32FImage = filter_clamped(&rgb_of(image), Kernel::new(&SMOOTH_3X3, 3, 3));
    RgbaImage::from_fn(w, h, |x, y| {
        let px = *image.get_pixel(x, y);
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            return px;
        }
        let s = smooth.get_pixel(x, y);
        Rgba([
            extrapolate(s[0], px[0], factor),
            extrapolate(s[1], px[1], factor),
            extrapolate(s[2], px[2], factor),
            px[3],
        ])
    })
}

/// Extrapolate away from the pixel's own luma
#[must_use]
pub fn saturate(image: &RgbaImage, factor: f32) -> RgbaImage {
    map_pixels(image, |px| {
        let l = f32::from(luma(px));
        Rgba([
            extrapolate(l, px[0], factor),
            extrapolate(l, px[1], factor),
            extrapolate(l, px[2], factor),
            px[3],
        ])
    })
}

/// 5x5 weighted smoothing of the color channels; alpha is kept
#[must_use]
pub fn smooth_more(image: &RgbaImage) -> RgbaImage {
    let smooth: Rgb32FImage = filter_clamped(&rgb_of(image), Kernel::new(&SMOOTH_MORE_5X5, 5, 5));
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let s = smooth.get_pixel(x, y);
        Rgba([to_u8(s[0]), to_u8(s[1]), to_u8(s[2]), image.get_pixel(x, y)[3]])
    })
}

fn rgb_of(image: &RgbaImage) -> RgbImage {
    map_pixels(image, |px| px.to_rgb())
}

/// ITU-R 601-2 luma, integer rounded down
fn luma(px: Rgba<u8>) -> u8 {
    let [r, g, b, _] = px.0;
    ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000) as u8
}

fn extrapolate(degenerate: f32, value: u8, factor: f32) -> u8 {
    to_u8(degenerate + factor * (f32::from(value) - degenerate))
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_image_is_unchanged_by_filters() {
        let flat = RgbaImage::from_pixel(12, 12, Rgba([90, 90, 90, 255]));
        assert_eq!(sharpen(&flat, SHARPEN_FACTOR), flat);
        assert_eq!(saturate(&flat, SATURATION_FACTOR), flat);
        assert_eq!(smooth_more(&flat), flat);
    }

    #[test]
    fn test_saturation_pushes_away_from_gray() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 100, 255]));
        let out = saturate(&img, 1.3);
        let px = out.get_pixel(0, 0);
        // luma = (200*299 + 100*587 + 100*114) / 1000 = 129
        assert_eq!(px[0], 221);
        assert_eq!(px[1], 91);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_sharpen_increases_local_contrast() {
        let mut img = RgbaImage::from_pixel(9, 9, Rgba([100, 100, 100, 255]));
        img.put_pixel(4, 4, Rgba([160, 160, 160, 255]));
        let out = sharpen(&img, 2.0);
        assert!(out.get_pixel(4, 4)[0] > 160);
        assert!(out.get_pixel(3, 4)[0] < 100);
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(0, 0));
    }

    #[test]
    fn test_alpha_is_preserved() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([10, 200, 30, 128]));
        img.put_pixel(3, 3, Rgba([250, 10, 10, 40]));
        let out = smooth_more(&sharpen(&img, 2.0));
        assert_eq!(out.get_pixel(3, 3)[3], 40);
        assert_eq!(out.get_pixel(0, 0)[3], 128);
    }

    #[test]
    fn test_finish_downsamples_to_target() {
        let canvas = RgbaImage::from_pixel(60, 90, Rgba([20, 120, 220, 255]));
        let out = finish(&canvas, 20, 30);
        assert_eq!(out.dimensions(), (20, 30));
    }

    #[test]
    fn test_tiny_canvas_skips_sharpen() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        assert_eq!(sharpen(&img, 2.0), img);
    }
}
