//! Local HTTP inpainting service strategy (lama-cleaner compatible)

use super::{ObjectRemover, RemovalContext, RemovalOutcome, RemovalStrategy};
use crate::{
    config::LamaConfig,
    error::{CardError, Result},
    masks::{self, MaskSet},
    services::ImageIOService,
};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use log::{debug, error, info};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::instrument;

const STRATEGY: &str = "lama";

/// Fixed inference parameters sent with every request
const FORM_FIELDS: &[(&str, &str)] = &[
    ("model", "lama"),
    ("device", "cpu"),
    ("prompt", ""),
    ("steps", "1"),
    ("sampler", "ddim"),
    ("hd_strategy", "Original"),
    ("hd_strategy_crop_margin", "32"),
    ("hd_strategy_crop_trigger_size", "1280"),
    ("hd_strategy_resize_limit", "2048"),
    ("use_croper", "false"),
    ("croper_x", "0"),
    ("croper_y", "0"),
    ("croper_height", "0"),
    ("croper_width", "0"),
    ("return_mask", "false"),
    ("return_origin", "false"),
];

/// Client for a lama-cleaner style `/inpaint` endpoint
#[derive(Debug, Clone)]
pub struct LamaService {
    endpoint: String,
    timeout: Duration,
}

impl LamaService {
    #[must_use]
    pub fn new(config: &LamaConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn image_part(bytes: Vec<u8>, file_name: &'static str) -> Result<Part> {
        Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| CardError::network_error(STRATEGY, "build multipart", &e))
    }
}

#[async_trait]
impl ObjectRemover for LamaService {
    fn strategy(&self) -> RemovalStrategy {
        RemovalStrategy::Service
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn remove(
        &self,
        image: &RgbaImage,
        masks: &MaskSet,
        _ctx: &RemovalContext,
    ) -> Result<RemovalOutcome> {
        let mask = masks::union(&masks.salient, &masks.auto_color);
        let nonzero = masks::foreground_count(&mask);
        debug!(
            "Service mask: {}x{}, nonzero={}",
            mask.width(),
            mask.height(),
            nonzero
        );
        if nonzero == 0 {
            return Err(CardError::strategy(
                STRATEGY,
                "mask union is empty, nothing to inpaint",
            ));
        }

        let image_png = ImageIOService::encode_png(&DynamicImage::ImageRgba8(image.clone()))?;
        let mask_png = ImageIOService::encode_png(&DynamicImage::ImageLuma8(mask.clone()))?;
        debug!(
            "Submitting image ({} bytes) and mask ({} bytes)",
            image_png.len(),
            mask_png.len()
        );

        let mut form = Form::new()
            .part("image", Self::image_part(image_png, "input.png")?)
            .part("mask", Self::image_part(mask_png, "mask.png")?);
        for (key, value) in FORM_FIELDS {
            form = form.text(*key, *value);
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| CardError::network_error(STRATEGY, "create client", &e))?;

        let response = client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CardError::network_error(STRATEGY, "inpaint request", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Inpainting service returned HTTP {}: {}", status, body);
            return Err(CardError::strategy(
                STRATEGY,
                format!("HTTP {}: {}", status, body.trim()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CardError::network_error(STRATEGY, "read response", &e))?;
        let cleaned = ImageIOService::load_from_bytes(&bytes)
            .map_err(|e| CardError::strategy(STRATEGY, format!("undecodable response: {}", e)))?
            .to_rgba8();
        info!(
            "Inpainting service returned {}x{} image",
            cleaned.width(),
            cleaned.height()
        );

        Ok(RemovalOutcome::new(cleaned, Some(mask)))
    }
}
