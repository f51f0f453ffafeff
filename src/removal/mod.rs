//! Object-removal strategies and their dispatcher
//!
//! A task names one strategy; the dispatcher runs exactly that strategy and
//! never falls back to another one, so a failure is always attributable.

pub mod inpaint;
pub mod local;
pub mod remote;
pub mod service;

pub use local::{LocalInpaint, MaskPolicy};
pub use remote::RunwayRemote;
pub use service::LamaService;

use crate::{
    config::ProcessorConfig,
    error::{CardError, Result},
    masks::MaskSet,
};
use async_trait::async_trait;
use image::{GrayImage, RgbaImage};
use instant::Instant;
use log::info;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{info as trace_info, instrument};

/// Closed set of removal backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RemovalStrategy {
    /// In-process fast-marching inpaint
    #[default]
    Local,
    /// Local HTTP inpainting service
    Service,
    /// Remote generative API
    Remote,
}

impl RemovalStrategy {
    /// Identifier used in task params and configuration
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "opencv",
            Self::Service => "lama",
            Self::Remote => "runwayml",
        }
    }
}

impl fmt::Display for RemovalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemovalStrategy {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opencv" | "local" => Ok(Self::Local),
            "lama" | "service" => Ok(Self::Service),
            "runwayml" | "runway" | "remote" => Ok(Self::Remote),
            other => Err(CardError::strategy(other, "unknown removal strategy")),
        }
    }
}

impl TryFrom<String> for RemovalStrategy {
    type Error = CardError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RemovalStrategy> for String {
    fn from(value: RemovalStrategy) -> Self {
        value.as_str().to_string()
    }
}

/// Per-task inputs for strategies that need them
#[derive(Debug, Clone, Default)]
pub struct RemovalContext {
    /// Credential override for the remote strategy
    pub runway_api_key: Option<String>,
    /// Prompt override for the remote strategy
    pub runway_prompt: Option<String>,
}

/// Cleaned image plus the erase region actually used, when there is one
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    pub image: RgbaImage,
    pub effective_mask: Option<GrayImage>,
}

impl RemovalOutcome {
    #[must_use]
    pub fn new(image: RgbaImage, effective_mask: Option<GrayImage>) -> Self {
        Self {
            image,
            effective_mask,
        }
    }
}

/// A single object-removal backend
#[async_trait]
pub trait ObjectRemover: Send + Sync {
    fn strategy(&self) -> RemovalStrategy;

    /// Erase the logo from `image`
    ///
    /// # Errors
    /// `StrategyError` for backend failures, `EmptyMaskError` when there is
    /// no erase region
    async fn remove(
        &self,
        image: &RgbaImage,
        masks: &MaskSet,
        ctx: &RemovalContext,
    ) -> Result<RemovalOutcome>;
}

/// Factory trait for creating removal backends
pub trait RemoverFactory: Send + Sync {
    /// Create the backend for `strategy`
    ///
    /// # Errors
    /// Returns `CardError::Strategy` when the backend cannot be constructed
    fn create_remover(&self, strategy: RemovalStrategy) -> Result<Box<dyn ObjectRemover>>;
}

/// Builds removers from the processor configuration
#[derive(Debug, Clone)]
pub struct DefaultRemoverFactory {
    config: ProcessorConfig,
}

impl DefaultRemoverFactory {
    #[must_use]
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl RemoverFactory for DefaultRemoverFactory {
    fn create_remover(&self, strategy: RemovalStrategy) -> Result<Box<dyn ObjectRemover>> {
        Ok(match strategy {
            RemovalStrategy::Local => Box::new(LocalInpaint::new(
                self.config.mask_policy,
                self.config.inpaint_radius,
            )),
            RemovalStrategy::Service => Box::new(LamaService::new(&self.config.lama)),
            RemovalStrategy::Remote => Box::new(RunwayRemote::new(&self.config.runway)),
        })
    }
}

/// Run the named strategy on `image`
///
/// # Errors
/// Whatever the selected strategy reports; no other strategy is tried
#[instrument(skip(factory, image, masks, ctx), fields(width = image.width(), height = image.height()))]
pub async fn remove_object(
    factory: &dyn RemoverFactory,
    image: &RgbaImage,
    masks: &MaskSet,
    strategy: RemovalStrategy,
    ctx: &RemovalContext,
) -> Result<RemovalOutcome> {
    let start = Instant::now();
    let remover = factory.create_remover(strategy)?;
    info!("Removing logo with strategy '{}'", strategy);
    let outcome = remover.remove(image, masks, ctx).await?;
    trace_info!(
        strategy = %strategy,
        duration_ms = start.elapsed().as_millis() as u64,
        "Object removal completed"
    );
    Ok(outcome)
}
