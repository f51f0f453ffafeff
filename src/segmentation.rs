//! Segmentation collaborators
//!
//! The renderer depends on two opaque capabilities: a salient-object
//! segmenter (used to protect or target the product during logo removal)
//! and a background remover (used to isolate the product before it is
//! placed on the template). Both are traits so that a model-backed
//! implementation can be plugged in without touching the pipeline.

use crate::error::Result;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use log::debug;
use std::collections::VecDeque;

/// Produces a saliency mask for the main subject.
///
/// `Ok(None)` means the capability is unavailable for this run; callers fall
/// back to an empty mask.
pub trait SaliencySegmenter: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    /// Implementation-specific segmentation failure
    fn segment(&self, image: &RgbaImage) -> Result<Option<GrayImage>>;
}

/// Makes everything outside the main subject transparent.
pub trait BackgroundRemover: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return a copy of `image` with background pixels at alpha 0
    ///
    /// # Errors
    /// Implementation-specific segmentation failure
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage>;
}

/// Segmenter that is never available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSaliency;

impl SaliencySegmenter for NoSaliency {
    fn name(&self) -> &'static str {
        "none"
    }

    fn segment(&self, _image: &RgbaImage) -> Result<Option<GrayImage>> {
        Ok(None)
    }
}

/// Background remover that leaves the image untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRemover;

impl BackgroundRemover for PassthroughRemover {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        Ok(image.clone())
    }
}

/// Studio-shot heuristic: the background is whatever uniform color touches
/// the image border. Pixels reachable from the border through colors within
/// `tolerance` of the median border color are background; the rest is the
/// subject.
#[derive(Debug, Clone, Copy)]
pub struct BorderKeySegmenter {
    tolerance: u8,
}

impl Default for BorderKeySegmenter {
    fn default() -> Self {
        Self { tolerance: 40 }
    }
}

impl BorderKeySegmenter {
    #[must_use]
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }

    /// 255 for background pixels connected to the border, 0 otherwise
    fn background_mask(&self, image: &RgbaImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let mut background = GrayImage::new(width, height);
        if width == 0 || height == 0 {
            return background;
        }

        let key = median_border_color(image);
        let tolerance = self.tolerance;
        let matches = |p: &Rgba<u8>| {
            p[3] == 0
                || (0..3).all(|c| p[c].abs_diff(key[c]) <= tolerance)
        };

        let mut queue = VecDeque::new();
        let seed = |x: u32, y: u32, bg: &mut GrayImage, q: &mut VecDeque<(u32, u32)>| {
            if bg.get_pixel(x, y)[0] == 0 && matches(image.get_pixel(x, y)) {
                bg.put_pixel(x, y, Luma([255]));
                q.push_back((x, y));
            }
        };
        for x in 0..width {
            seed(x, 0, &mut background, &mut queue);
            seed(x, height - 1, &mut background, &mut queue);
        }
        for y in 0..height {
            seed(0, y, &mut background, &mut queue);
            seed(width - 1, y, &mut background, &mut queue);
        }

        while let Some((x, y)) = queue.pop_front() {
            let neighbours = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbours {
                if nx < width && ny < height {
                    seed(nx, ny, &mut background, &mut queue);
                }
            }
        }

        background
    }
}

fn median_border_color(image: &RgbaImage) -> [u8; 3] {
    let (width, height) = image.dimensions();
    let mut channels: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut push = |p: &Rgba<u8>| {
        for (c, values) in channels.iter_mut().enumerate() {
            values.push(p[c]);
        }
    };
    for x in 0..width {
        push(image.get_pixel(x, 0));
        push(image.get_pixel(x, height - 1));
    }
    for y in 0..height {
        push(image.get_pixel(0, y));
        push(image.get_pixel(width - 1, y));
    }
    let mut key = [0u8; 3];
    for (c, values) in channels.iter_mut().enumerate() {
        values.sort_unstable();
        key[c] = values.get(values.len() / 2).copied().unwrap_or(0);
    }
    key
}

impl SaliencySegmenter for BorderKeySegmenter {
    fn name(&self) -> &'static str {
        "border-key"
    }

    fn segment(&self, image: &RgbaImage) -> Result<Option<GrayImage>> {
        let mut mask = self.background_mask(image);
        image::imageops::invert(&mut mask);
        Ok(Some(mask))
    }
}

impl BackgroundRemover for BorderKeySegmenter {
    fn name(&self) -> &'static str {
        "border-key"
    }

    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let background = self.background_mask(image);
        let mut out = image.clone();
        let mut cleared = 0usize;
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            if background.get_pixel(x, y)[0] == 255 {
                pixel[3] = 0;
                cleared += 1;
            }
        }
        debug!("Border-key background removal cleared {} px", cleared);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White background with a dark disc in the middle
    fn disc_on_white(size: u32) -> RgbaImage {
        let c = size as i64 / 2;
        let r2 = (size as i64 / 4).pow(2);
        RgbaImage::from_fn(size, size, |x, y| {
            let (dx, dy) = (x as i64 - c, y as i64 - c);
            if dx * dx + dy * dy <= r2 {
                Rgba([30, 30, 30, 255])
            } else {
                Rgba([250, 250, 250, 255])
            }
        })
    }

    #[test]
    fn test_no_saliency_is_unavailable() {
        let img = RgbaImage::new(4, 4);
        assert!(NoSaliency.segment(&img).unwrap().is_none());
    }

    #[test]
    fn test_border_key_segments_subject() {
        let img = disc_on_white(40);
        let mask = SaliencySegmenter::segment(&BorderKeySegmenter::default(), &img)
            .unwrap()
            .unwrap();
        assert_eq!(mask.get_pixel(20, 20)[0], 255);
        assert_eq!(mask.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn test_border_key_removes_background() {
        let img = disc_on_white(40);
        let out = BorderKeySegmenter::default().remove_background(&img).unwrap();
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(20, 20)[3], 255);
        assert_eq!(out.get_pixel(20, 20)[0], 30);
    }

    #[test]
    fn test_enclosed_background_color_is_kept() {
        // A white hole inside the dark ring is not reachable from the border
        let mut img = disc_on_white(40);
        img.put_pixel(20, 20, Rgba([250, 250, 250, 255]));
        let out = BorderKeySegmenter::default().remove_background(&img).unwrap();
        assert_eq!(out.get_pixel(20, 20)[3], 255);
    }

    #[test]
    fn test_passthrough() {
        let img = disc_on_white(8);
        assert_eq!(PassthroughRemover.remove_background(&img).unwrap(), img);
    }
}
