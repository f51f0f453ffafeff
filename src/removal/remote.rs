//! Remote generative removal through the Runway text-to-image API
//!
//! No masks are sent: the source is attached as a reference image and the
//! model is instructed by prompt to erase overlapping objects.

use super::{ObjectRemover, RemovalContext, RemovalOutcome, RemovalStrategy};
use crate::{
    config::RunwayConfig,
    error::{CardError, Result},
    masks::MaskSet,
    services::ImageIOService,
};
use async_trait::async_trait;
use base64::Engine as _;
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use instant::Instant;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

const STRATEGY: &str = "runwayml";
const API_VERSION: &str = "2024-11-06";
const MODEL: &str = "gen4_image";
const RATIO: &str = "720:720";

/// Longest side accepted by the remote model
pub const MAX_SIDE: u32 = 720;

pub const DEFAULT_PROMPT: &str = "Remove any object overlapping the main subject (if present), \
including logos and watermarks. After removal, realistically restore the main image. The main \
subject is a car tire on a wheel, standing vertically. Do not change, alter, distort, or remove \
any markings, symbols, texts, numbers, or labels present on the tire sidewalls, the tire itself, \
or the wheel. Improve the image quality. Output: a single car tire on a wheel, standing vertically.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextToImageRequest<'a> {
    model: &'a str,
    ratio: &'a str,
    prompt_text: &'a str,
    reference_images: Vec<ReferenceImage>,
}

#[derive(Debug, Serialize)]
struct ReferenceImage {
    uri: String,
    tag: &'static str,
}

#[derive(Debug, Deserialize)]
struct TaskCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskState {
    status: String,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    failure: Option<String>,
    #[serde(default)]
    failure_code: Option<Value>,
}

/// Target size after bounding the longer side to `max_side`.
///
/// Images already within the bound keep their size; the shorter side is
/// scaled proportionally and truncated.
#[must_use]
pub fn bounded_size(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    if width.max(height) <= max_side {
        return (width, height);
    }
    if width == height {
        (max_side, max_side)
    } else if width > height {
        let h = (u64::from(height) * u64::from(max_side) / u64::from(width)) as u32;
        (max_side, h.max(1))
    } else {
        let w = (u64::from(width) * u64::from(max_side) / u64::from(height)) as u32;
        (w.max(1), max_side)
    }
}

/// Client for the asynchronous Runway task API
#[derive(Debug, Clone)]
pub struct RunwayRemote {
    config: RunwayConfig,
}

impl RunwayRemote {
    #[must_use]
    pub fn new(config: &RunwayConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.download_timeout_secs))
            .build()
            .map_err(|e| CardError::network_error(STRATEGY, "create client", &e))
    }

    fn api_key<'a>(&'a self, ctx: &'a RemovalContext) -> Result<&'a str> {
        ctx.runway_api_key
            .as_deref()
            .or(self.config.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CardError::strategy(
                    STRATEGY,
                    "API key is not configured (set RUNWAYML_API_KEY or params.runwayml_api_key)",
                )
            })
    }

    fn encode_reference(image: &RgbaImage) -> Result<String> {
        let (w, h) = image.dimensions();
        let (nw, nh) = bounded_size(w, h, MAX_SIDE);
        let resized = if (nw, nh) == (w, h) {
            image.clone()
        } else {
            image::imageops::resize(image, nw, nh, FilterType::Lanczos3)
        };
        info!("Reference image resized: {}x{} -> {}x{}", w, h, nw, nh);
        let png = ImageIOService::encode_png(&DynamicImage::ImageRgba8(resized))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        Ok(format!("data:image/png;base64,{}", encoded))
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("HTTP {}: {}", status, body.trim())
    }

    async fn submit(&self, client: &reqwest::Client, key: &str, prompt: &str, uri: String) -> Result<String> {
        let request = TextToImageRequest {
            model: MODEL,
            ratio: RATIO,
            prompt_text: prompt,
            reference_images: vec![ReferenceImage { uri, tag: "original" }],
        };
        let response = client
            .post(format!("{}/v1/text_to_image", self.base_url()))
            .bearer_auth(key)
            .header("X-Runway-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| CardError::network_error(STRATEGY, "submit task", &e))?;
        if !response.status().is_success() {
            return Err(CardError::strategy(STRATEGY, Self::error_body(response).await));
        }
        let created: TaskCreated = response
            .json()
            .await
            .map_err(|e| CardError::network_error(STRATEGY, "parse task handle", &e))?;
        Ok(created.id)
    }

    async fn wait_for_output(&self, client: &reqwest::Client, key: &str, task_id: &str) -> Result<String> {
        let started = Instant::now();
        let deadline = Duration::from_secs(self.config.task_timeout_secs);
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            let response = client
                .get(format!("{}/v1/tasks/{}", self.base_url(), task_id))
                .bearer_auth(key)
                .header("X-Runway-Version", API_VERSION)
                .send()
                .await
                .map_err(|e| CardError::network_error(STRATEGY, "poll task", &e))?;
            if !response.status().is_success() {
                return Err(CardError::strategy(STRATEGY, Self::error_body(response).await));
            }
            let state: TaskState = response
                .json()
                .await
                .map_err(|e| CardError::network_error(STRATEGY, "parse task state", &e))?;
            debug!("Remote task {} status {}", task_id, state.status);

            match state.status.as_str() {
                "SUCCEEDED" => {
                    return state.output.into_iter().next().ok_or_else(|| {
                        CardError::strategy(STRATEGY, "task succeeded without an output image")
                    });
                },
                "FAILED" | "CANCELLED" => {
                    let detail = state.failure.unwrap_or_else(|| "no failure detail".to_string());
                    let code = state
                        .failure_code
                        .map(|c| format!(" ({})", c))
                        .unwrap_or_default();
                    warn!("Remote task {} ended {}: {}{}", task_id, state.status, detail, code);
                    return Err(CardError::strategy(
                        STRATEGY,
                        format!("task {} {}: {}{}", task_id, state.status, detail, code),
                    ));
                },
                _ => {},
            }

            if started.elapsed() >= deadline {
                return Err(CardError::strategy(
                    STRATEGY,
                    format!(
                        "task {} did not finish within {}s (last status {})",
                        task_id, self.config.task_timeout_secs, state.status
                    ),
                ));
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn download(&self, client: &reqwest::Client, url: &str) -> Result<RgbaImage> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| CardError::network_error(STRATEGY, "download result", &e))?;
        if !response.status().is_success() {
            return Err(CardError::strategy(STRATEGY, Self::error_body(response).await));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CardError::network_error(STRATEGY, "read result", &e))?;
        ImageIOService::load_from_bytes(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| CardError::strategy(STRATEGY, format!("undecodable result image: {}", e)))
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

#[async_trait]
impl ObjectRemover for RunwayRemote {
    fn strategy(&self) -> RemovalStrategy {
        RemovalStrategy::Remote
    }

    #[instrument(skip_all, fields(base_url = %self.config.base_url))]
    async fn remove(
        &self,
        image: &RgbaImage,
        _masks: &MaskSet,
        ctx: &RemovalContext,
    ) -> Result<RemovalOutcome> {
        let key = self.api_key(ctx)?;
        let prompt = ctx
            .runway_prompt
            .as_deref()
            .unwrap_or(self.config.prompt.as_str());
        debug!("Remote removal prompt: {}", prompt);

        let uri = Self::encode_reference(image)?;
        let client = self.client()?;
        let task_id = self.submit(&client, key, prompt, uri).await?;
        info!("Remote task {} submitted", task_id);

        let url = self.wait_for_output(&client, key, &task_id).await?;
        info!("Remote task {} finished, downloading result", task_id);
        let cleaned = self.download(&client, &url).await?;
        Ok(RemovalOutcome::new(cleaned, None))
    }
}
