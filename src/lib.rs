#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Tire Product Card Renderer
//!
//! Batch renderer that turns a raw tire photo, a card template and product
//! attributes into a finished product card.
//!
//! Each task goes through a fixed pipeline:
//!
//! 1. **Mask synthesis**: a salient-object mask and an automatic bright-color
//!    mask over the bottom region of the photo, where vendor logos sit
//! 2. **Logo removal** with one of three strategies: in-process inpainting
//!    (`opencv`), a lama-cleaner style HTTP service (`lama`) or a remote
//!    generative API (`runwayml`)
//! 3. **Background removal** through a pluggable [`BackgroundRemover`]
//! 4. **Content crop** to the opaque bounding box plus a margin
//! 5. **Compositing** on a supersampled canvas with the layout coefficient
//!    table, then sharpen, saturate, smooth and downsample
//!
//! Every task ends with exactly one result record in `results_dir`; a failure
//! in any stage is recorded and never aborts the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tirecard::{ProcessorConfig, TaskRunner};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ProcessorConfig::builder()
//!     .root_dir("/srv/cards")
//!     .batch_size(10)
//!     .build()?;
//!
//! let summary = TaskRunner::new(config).run_batch().await?;
//! println!("{} ok, {} failed", summary.succeeded(), summary.failed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP input and output
//! - `tracing-json`: JSON log output

pub mod bounds;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod masks;
pub mod removal;
pub mod runner;
pub mod segmentation;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use bounds::{content_bounds, crop_to_content, ContentBounds};
pub use compositor::{ColorSet, LayoutCompositor, Season};
pub use config::{
    LamaConfig, ProcessorConfig, ProcessorConfigBuilder, RenderSettings, RunwayConfig,
};
pub use error::{CardError, Result};
pub use masks::{MaskOptions, MaskSet, MaskSynthesizer};
pub use removal::{
    remove_object, DefaultRemoverFactory, MaskPolicy, ObjectRemover, RemovalContext,
    RemovalOutcome, RemovalStrategy, RemoverFactory,
};
pub use runner::{BatchSummary, TaskRunner};
pub use segmentation::{
    BackgroundRemover, BorderKeySegmenter, NoSaliency, PassthroughRemover, SaliencySegmenter,
};
pub use services::{DebugArtifacts, ImageIOService};
pub use types::{ProductData, ResultRecord, Task, TaskParams, TaskStatus};
pub use utils::TaskValidator;

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};

/// Render a single task file with default collaborators and record its result
///
/// Convenience wrapper around [`TaskRunner::process_task_file`].
///
/// # Examples
///
/// ```rust,no_run
/// use tirecard::{process_task_file, ProcessorConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = ProcessorConfig::from_file("/srv/cards/tirecard.json")?;
/// let record = process_task_file(config, "/srv/cards/tasks/t-1.json").await?;
/// assert!(record.is_success());
/// # Ok(())
/// # }
/// ```
pub async fn process_task_file<P: AsRef<std::path::Path>>(
    config: ProcessorConfig,
    path: P,
) -> Result<ResultRecord> {
    TaskRunner::new(config).process_task_file(path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_api_compiles() {
        let config = ProcessorConfig::default();
        let _runner = TaskRunner::new(config);
    }
}
