//! Local masked inpaint strategy
//!
//! Everything runs in-process. The effective erase region depends on which
//! masks are available and on the configured [`MaskPolicy`].

use super::{inpaint::inpaint_telea, ObjectRemover, RemovalContext, RemovalOutcome, RemovalStrategy};
use crate::{
    error::{CardError, Result},
    masks::{self, MaskSet, MASK_THRESHOLD},
};
use async_trait::async_trait;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::{
    distance_transform::Norm,
    morphology,
    region_labelling::{connected_components, Connectivity},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::instrument;

/// Structuring element half-size: `k = 4` with the chessboard norm is a 9x9 square
const MORPH_RADIUS: u8 = 4;

/// How salient and auto-color masks combine when both are available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskPolicy {
    /// Repair only the logo pixels that overlap the product silhouette
    #[default]
    TireConstrained,
    /// Keep the main product blob, erase everything else that looks like a logo
    Unconstrained,
}

impl fmt::Display for MaskPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TireConstrained => write!(f, "tire-constrained"),
            Self::Unconstrained => write!(f, "unconstrained"),
        }
    }
}

impl FromStr for MaskPolicy {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tire-constrained" | "tire_constrained" | "constrained" => Ok(Self::TireConstrained),
            "unconstrained" => Ok(Self::Unconstrained),
            other => Err(CardError::invalid_config(format!("unknown mask policy '{}'", other))),
        }
    }
}

/// Classical fast-marching inpaint over a policy-derived mask
#[derive(Debug, Clone)]
pub struct LocalInpaint {
    policy: MaskPolicy,
    radius: u32,
}

impl LocalInpaint {
    #[must_use]
    pub fn new(policy: MaskPolicy, radius: u32) -> Self {
        Self { policy, radius }
    }

    /// Run the selected policy synchronously
    ///
    /// # Errors
    /// `CardError::EmptyMask` when neither mask has any foreground
    pub fn apply(&self, image: &RgbaImage, masks: &MaskSet) -> Result<RemovalOutcome> {
        let salient_empty = masks.salient_is_empty();
        if salient_empty && masks.auto_color_is_empty() {
            return Err(CardError::empty_mask(
                "both salient and auto-color masks are empty; nothing to erase",
            ));
        }

        if salient_empty {
            info!("Salient mask empty; inpainting auto-color region over the full image");
            let mask = masks::binarize(&masks.auto_color);
            let cleaned = inpaint_telea(image, &mask, self.radius);
            return Ok(RemovalOutcome::new(cleaned, Some(mask)));
        }

        match self.policy {
            MaskPolicy::TireConstrained => Ok(self.tire_constrained(image, masks)),
            MaskPolicy::Unconstrained => Ok(self.unconstrained(image, masks)),
        }
    }

    fn tire_constrained(&self, image: &RgbaImage, masks: &MaskSet) -> RemovalOutcome {
        let repair = masks::intersection(&masks.salient, &masks.auto_color);
        debug!(
            "Tire-constrained repair region: {} px",
            masks::foreground_count(&repair)
        );

        // Only product pixels without logo contribute to the fill
        let visible = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
            let in_tire = masks.salient.get_pixel(x, y)[0] > MASK_THRESHOLD;
            let in_logo = masks.auto_color.get_pixel(x, y)[0] > MASK_THRESHOLD;
            if in_tire && !in_logo {
                *image.get_pixel(x, y)
            } else {
                Rgba([0, 0, 0, image.get_pixel(x, y)[3]])
            }
        });
        let repaired = inpaint_telea(&visible, &repair, self.radius);

        let mut result = image.clone();
        for (x, y, pixel) in result.enumerate_pixels_mut() {
            if masks.salient.get_pixel(x, y)[0] > MASK_THRESHOLD {
                let fixed = repaired.get_pixel(x, y);
                *pixel = Rgba([fixed[0], fixed[1], fixed[2], pixel[3]]);
            }
        }
        RemovalOutcome::new(result, Some(repair))
    }

    fn unconstrained(&self, image: &RgbaImage, masks: &MaskSet) -> RemovalOutcome {
        let main = main_component(&masks.salient);
        let extra = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let salient = masks.salient.get_pixel(x, y)[0] > MASK_THRESHOLD;
            Luma([if salient && main.get_pixel(x, y)[0] == 0 { 255 } else { 0 }])
        });
        let union = masks::union(&masks.auto_color, &extra);
        let closed = morphology::close(&union, Norm::LInf, MORPH_RADIUS);
        let mask = morphology::dilate(&closed, Norm::LInf, MORPH_RADIUS);
        debug!(
            "Unconstrained erase region: {} px (auto {} px, extra fragments {} px)",
            masks::foreground_count(&mask),
            masks::foreground_count(&masks.auto_color),
            masks::foreground_count(&extra)
        );
        let cleaned = inpaint_telea(image, &mask, self.radius);
        RemovalOutcome::new(cleaned, Some(mask))
    }
}

/// Largest 8-connected blob of the mask with its interior holes filled
#[must_use]
pub fn main_component(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let binary = masks::binarize(mask);
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let mut areas: Vec<usize> = Vec::new();
    for label in labels.pixels() {
        let l = label[0] as usize;
        if l == 0 {
            continue;
        }
        if areas.len() <= l {
            areas.resize(l + 1, 0);
        }
        areas[l] += 1;
    }
    let Some(best) = areas
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .filter(|(_, area)| **area > 0)
        .map(|(l, _)| l as u32)
    else {
        return GrayImage::new(width, height);
    };

    let blob = GrayImage::from_fn(width, height, |x, y| {
        Luma([if labels.get_pixel(x, y)[0] == best { 255 } else { 0 }])
    });

    // Holes are complement regions that never touch the image border
    let mut complement = blob.clone();
    image::imageops::invert(&mut complement);
    let outside = connected_components(&complement, Connectivity::Four, Luma([0u8]));
    let mut border_labels = std::collections::HashSet::new();
    for x in 0..width {
        border_labels.insert(outside.get_pixel(x, 0)[0]);
        border_labels.insert(outside.get_pixel(x, height - 1)[0]);
    }
    for y in 0..height {
        border_labels.insert(outside.get_pixel(0, y)[0]);
        border_labels.insert(outside.get_pixel(width - 1, y)[0]);
    }

    GrayImage::from_fn(width, height, |x, y| {
        let l = outside.get_pixel(x, y)[0];
        Luma([if l == 0 || !border_labels.contains(&l) { 255 } else { 0 }])
    })
}

#[async_trait]
impl ObjectRemover for LocalInpaint {
    fn strategy(&self) -> RemovalStrategy {
        RemovalStrategy::Local
    }

    #[instrument(skip_all, fields(policy = %self.policy, radius = self.radius))]
    async fn remove(
        &self,
        image: &RgbaImage,
        masks: &MaskSet,
        _ctx: &RemovalContext,
    ) -> Result<RemovalOutcome> {
        self.apply(image, masks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 60;
    const H: u32 = 60;

    fn rect_mask(x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(W, H, |x, y| {
            Luma([if (x0..x1).contains(&x) && (y0..y1).contains(&y) { 255 } else { 0 }])
        })
    }

    /// Gray background, dark "tire" square with a red "logo" that overlaps
    /// both the tire and the background.
    fn scene() -> (RgbaImage, MaskSet) {
        let mut img = RgbaImage::from_pixel(W, H, Rgba([200, 200, 200, 255]));
        for y in 10..50 {
            for x in 10..50 {
                img.put_pixel(x, y, Rgba([40, 40, 40, 255]));
            }
        }
        for y in 40..55 {
            for x in 30..58 {
                img.put_pixel(x, y, Rgba([220, 20, 20, 255]));
            }
        }
        let masks = MaskSet {
            salient: rect_mask(10, 10, 50, 50),
            auto_color: rect_mask(30, 40, 58, 55),
        };
        (img, masks)
    }

    #[test]
    fn test_both_masks_empty() {
        let img = RgbaImage::new(W, H);
        let masks = MaskSet {
            salient: GrayImage::new(W, H),
            auto_color: GrayImage::new(W, H),
        };
        let err = LocalInpaint::new(MaskPolicy::TireConstrained, 7)
            .apply(&img, &masks)
            .unwrap_err();
        assert!(matches!(err, CardError::EmptyMask(_)));
    }

    #[test]
    fn test_tire_constrained_leaves_outside_untouched() {
        let (img, masks) = scene();
        let out = LocalInpaint::new(MaskPolicy::TireConstrained, 7)
            .apply(&img, &masks)
            .unwrap();
        for (x, y, p) in out.image.enumerate_pixels() {
            if masks.salient.get_pixel(x, y)[0] == 0 {
                assert_eq!(p, img.get_pixel(x, y), "outside pixel ({x},{y}) changed");
            }
        }
        // Logo pixels inside the tire are repaired from the dark tire surface
        let repaired = out.image.get_pixel(40, 45);
        assert!(repaired[0] < 100, "expected tire-like fill, got {:?}", repaired);
        let mask = out.effective_mask.unwrap();
        assert_eq!(masks::foreground_count(&mask), 20 * 10);
    }

    #[test]
    fn test_empty_salient_uses_auto_mask_everywhere() {
        let (img, mut masks) = scene();
        masks.salient = GrayImage::new(W, H);
        let out = LocalInpaint::new(MaskPolicy::TireConstrained, 7)
            .apply(&img, &masks)
            .unwrap();
        // Logo over background is erased too
        let p = out.image.get_pixel(56, 52);
        assert!(p[1] > 100, "background logo pixel not repaired: {:?}", p);
        assert_eq!(out.image.get_pixel(2, 2), img.get_pixel(2, 2));
    }

    #[test]
    fn test_unconstrained_erases_fragments() {
        let (img, mut masks) = scene();
        // Small stray salient blob away from the tire
        for y in 2..5 {
            for x in 2..5 {
                masks.salient.put_pixel(x, y, Luma([255]));
            }
        }
        let out = LocalInpaint::new(MaskPolicy::Unconstrained, 7)
            .apply(&img, &masks)
            .unwrap();
        let mask = out.effective_mask.unwrap();
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
        // Dilation grows the logo region by the structuring element
        assert_eq!(mask.get_pixel(30 - 4, 45)[0], 255);
        assert_eq!(mask.get_pixel(20, 20)[0], 0);
    }

    #[test]
    fn test_main_component_fills_holes() {
        let mut mask = rect_mask(10, 10, 40, 40);
        for y in 20..25 {
            for x in 20..25 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        mask.put_pixel(55, 55, Luma([255]));
        let main = main_component(&mask);
        assert_eq!(main.get_pixel(22, 22)[0], 255);
        assert_eq!(main.get_pixel(55, 55)[0], 0);
        assert_eq!(main.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("tire-constrained".parse::<MaskPolicy>().unwrap(), MaskPolicy::TireConstrained);
        assert_eq!("Unconstrained".parse::<MaskPolicy>().unwrap(), MaskPolicy::Unconstrained);
        assert!("sometimes".parse::<MaskPolicy>().is_err());
        assert_eq!(MaskPolicy::default().to_string(), "tire-constrained");
    }
}
