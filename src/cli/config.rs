//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{ProcessorConfig, ProcessorConfigBuilder},
    removal::{MaskPolicy, RemovalStrategy},
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Convert CLI arguments to a validated `ProcessorConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Load the config file (or defaults rooted at `--root`) and apply flag
    /// overrides on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<ProcessorConfig> {
        let mut builder = match &cli.config {
            Some(path) => {
                let loaded = ProcessorConfig::from_file(path)
                    .with_context(|| format!("Failed to load config file {}", path.display()))?;
                ProcessorConfigBuilder::from_config(loaded)
            },
            None => {
                let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("."));
                ProcessorConfigBuilder::new().root_dir(root)
            },
        };

        if let Some(size) = cli.batch_size {
            builder = builder.batch_size(size);
        }
        if let Some(name) = &cli.strategy {
            let strategy: RemovalStrategy = name.parse().context("Invalid --strategy")?;
            builder = builder.removal_strategy(strategy);
        }
        if let Some(name) = &cli.mask_policy {
            let policy: MaskPolicy = name.parse().context("Invalid --mask-policy")?;
            builder = builder.mask_policy(policy);
        }
        if let Some(url) = &cli.lama_url {
            builder = builder.lama_endpoint(url.clone());
        }
        if cli.runway_api_key.is_some() {
            builder = builder.runway_api_key(cli.runway_api_key.clone());
        }
        if cli.debug {
            builder = builder.debug(true);
        }

        builder.build().context("Invalid configuration")
    }
}
