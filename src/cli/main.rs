//! CLI entry point: single-task and batch modes

use super::config::CliConfigBuilder;
use crate::{
    runner::TaskRunner,
    segmentation::{BackgroundRemover, BorderKeySegmenter, NoSaliency, PassthroughRemover, SaliencySegmenter},
    tracing_config::{init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info};
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "tirecard")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// JSON configuration file; relative directories resolve against it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root holding tasks/, results/, originals/, processed/, templates/, logos/ and fonts/
    /// (used when no config file is given)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Process a single task file instead of a batch
    #[arg(short, long, value_name = "FILE")]
    pub task: Option<PathBuf>,

    /// Maximum number of pending tasks per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Default logo removal strategy (opencv, lama, runwayml)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Erase region policy for the local strategy (tire-constrained, unconstrained)
    #[arg(long)]
    pub mask_policy: Option<String>,

    /// Inpainting service endpoint
    #[arg(long, env = "LAMA_API_URL")]
    pub lama_url: Option<String>,

    /// Remote generative API key
    #[arg(long, env = "RUNWAYML_API_KEY", hide_env_values = true)]
    pub runway_api_key: Option<String>,

    /// Salient-object segmenter
    #[arg(long, value_enum, default_value_t = CliSaliency::None)]
    pub saliency: CliSaliency,

    /// Background remover applied before cropping
    #[arg(long, value_enum, default_value_t = CliBackground::Passthrough)]
    pub background: CliBackground,

    /// Write intermediate images for every task
    #[arg(long)]
    pub debug: bool,

    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Filter directives such as `tirecard=debug,reqwest=warn`; overrides -v
    #[arg(long, env = "RUST_LOG")]
    pub log_filter: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliSaliency {
    /// No segmenter; the salient mask is always empty
    None,
    /// Flood fill from the image border
    BorderKey,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackground {
    /// Keep the image as is
    Passthrough,
    /// Key out the border-connected background
    BorderKey,
}

impl CliSaliency {
    fn segmenter(self) -> Box<dyn SaliencySegmenter> {
        match self {
            Self::None => Box::new(NoSaliency),
            Self::BorderKey => Box::new(BorderKeySegmenter::default()),
        }
    }
}

impl CliBackground {
    fn remover(self) -> Box<dyn BackgroundRemover> {
        match self {
            Self::Passthrough => Box::new(PassthroughRemover),
            Self::BorderKey => Box::new(BorderKeySegmenter::default()),
        }
    }
}

/// Run the CLI
///
/// # Errors
/// Configuration problems, an unreadable tasks directory, or a failed
/// single task
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose, cli.log_filter.as_deref())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let _session = spans::session(&session_id, config.removal_strategy.as_str()).entered();

    info!("Tasks: {}", config.tasks_dir.display());
    info!("Results: {}", config.results_dir.display());
    info!("Default strategy: {}", config.removal_strategy);

    let runner = TaskRunner::new(config)
        .with_segmenter(cli.saliency.segmenter())
        .with_background_remover(cli.background.remover());

    let start_time = Instant::now();

    if let Some(task_path) = &cli.task {
        let record = runner
            .process_task_file(task_path)
            .await
            .with_context(|| format!("Failed to record result for {}", task_path.display()))?;
        if !record.is_success() {
            anyhow::bail!("Task {} failed: {}", record.task_id, record.message);
        }
        info!(
            "Task {} finished in {:.2}s: {}",
            record.task_id,
            start_time.elapsed().as_secs_f64(),
            record.output_image.as_deref().unwrap_or_default()
        );
        return Ok(());
    }

    let summary = runner.run_batch().await.context("Batch run failed")?;
    for record in summary.records.iter().filter(|r| !r.is_success()) {
        error!("{}: {}", record.task_id, record.message);
    }
    info!(
        "Processed {} task(s) in {:.2}s: {} succeeded, {} failed",
        summary.records.len(),
        start_time.elapsed().as_secs_f64(),
        summary.succeeded(),
        summary.failed()
    );
    if summary.unrecorded > 0 {
        anyhow::bail!("{} task result(s) could not be written", summary.unrecorded);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "tirecard",
            "--root",
            "/srv/cards",
            "--strategy",
            "lama",
            "--saliency",
            "border-key",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/srv/cards")));
        assert_eq!(cli.strategy.as_deref(), Some("lama"));
        assert_eq!(cli.saliency, CliSaliency::BorderKey);
        assert_eq!(cli.background, CliBackground::Passthrough);
        assert_eq!(cli.verbose, 2);
        assert!(cli.task.is_none());
    }

    #[test]
    fn test_parse_log_filter() {
        let cli = Cli::try_parse_from(["tirecard", "--log-filter", "tirecard=trace"]).unwrap();
        assert_eq!(cli.log_filter.as_deref(), Some("tirecard=trace"));
    }

    #[test]
    fn test_reject_unknown_saliency() {
        assert!(Cli::try_parse_from(["tirecard", "--saliency", "magic"]).is_err());
    }

    #[test]
    fn test_collaborator_selection() {
        assert_eq!(CliSaliency::BorderKey.segmenter().name(), "border-key");
        assert_eq!(CliBackground::Passthrough.remover().name(), "passthrough");
    }
}
