//! Task runner: validation, pipeline orchestration and result persistence
//!
//! The runner is the only place where stage errors turn into result records.
//! Every task read from disk ends with exactly one record in `results_dir`,
//! and an output image only appears once every stage has succeeded.

use crate::{
    bounds::{crop_to_content, DEFAULT_ALPHA_THRESHOLD, DEFAULT_MARGIN},
    compositor::LayoutCompositor,
    config::{ProcessorConfig, RenderSettings},
    error::{CardError, Result},
    masks::{self, MaskSynthesizer},
    removal::{remove_object, DefaultRemoverFactory, RemoverFactory},
    segmentation::{BackgroundRemover, NoSaliency, PassthroughRemover, SaliencySegmenter},
    services::{DebugArtifacts, ImageIOService},
    tracing_config::{events, spans},
    types::{ResultRecord, Task},
    utils::TaskValidator,
};
use chrono::Utc;
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use log::{error, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info as trace_info, instrument, Instrument};

/// Counts from one batch pass
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub records: Vec<ResultRecord>,
    /// Tasks whose result record could not be written
    pub unrecorded: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }
}

/// Runs card-rendering tasks against a fixed configuration
pub struct TaskRunner {
    config: ProcessorConfig,
    factory: Box<dyn RemoverFactory>,
    synthesizer: MaskSynthesizer,
    background: Box<dyn BackgroundRemover>,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("config", &self.config)
            .field("background", &self.background.name())
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    /// Runner with the default remover factory, no saliency segmenter and a
    /// passthrough background remover
    #[must_use]
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            factory: Box::new(DefaultRemoverFactory::new(&config)),
            synthesizer: MaskSynthesizer::new(Box::new(NoSaliency), config.masks),
            background: Box::new(PassthroughRemover),
            config,
        }
    }

    #[must_use]
    pub fn with_factory(mut self, factory: Box<dyn RemoverFactory>) -> Self {
        self.factory = factory;
        self
    }

    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Box<dyn SaliencySegmenter>) -> Self {
        self.synthesizer = MaskSynthesizer::new(segmenter, self.config.masks);
        self
    }

    #[must_use]
    pub fn with_background_remover(mut self, remover: Box<dyn BackgroundRemover>) -> Self {
        self.background = remover;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Task files in `tasks_dir` that have no result yet, sorted by name and
    /// capped at `batch_size`
    ///
    /// # Errors
    /// `CardError::Io` when the tasks directory cannot be listed
    pub fn pending_tasks(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.tasks_dir;
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CardError::file_io_error("list tasks directory", dir, &e))?;

        let mut pending: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .filter(|path| !self.has_result(path))
            .collect();
        pending.sort();
        pending.truncate(self.config.batch_size);
        Ok(pending)
    }

    fn has_result(&self, task_path: &Path) -> bool {
        self.result_path(task_path).exists()
    }

    /// Result records are keyed by the task file stem, never by the task id
    /// from the descriptor, so discovery and persistence agree and a
    /// descriptor cannot steer the write outside `results_dir`
    #[must_use]
    pub fn result_path(&self, task_path: &Path) -> PathBuf {
        let stem = task_path
            .file_stem()
            .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned());
        self.config.results_dir.join(format!("{}.json", stem))
    }

    /// Process up to `batch_size` pending tasks, one at a time. A failing task
    /// never stops the batch.
    ///
    /// # Errors
    /// Only when the tasks directory cannot be listed
    pub async fn run_batch(&self) -> Result<BatchSummary> {
        let pending = self.pending_tasks()?;
        let span = spans::batch_processing(pending.len());
        async {
            info!("Found {} pending task(s)", pending.len());
            let mut summary = BatchSummary::default();
            for path in &pending {
                match self.process_task_file(path).await {
                    Ok(record) => summary.records.push(record),
                    Err(e) => {
                        events::error_with_context(&e, "writing result record");
                        summary.unrecorded += 1;
                    },
                }
            }
            trace_info!(
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                unrecorded = summary.unrecorded,
                "Batch finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Read, run and record one task file; the record lands at
    /// [`Self::result_path`]
    ///
    /// # Errors
    /// Only when the result record itself cannot be written; every pipeline
    /// failure is captured in the returned record instead
    pub async fn process_task_file<P: AsRef<Path>>(&self, path: P) -> Result<ResultRecord> {
        let path = path.as_ref();
        let fallback_id = path
            .file_stem()
            .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned());

        let record = match read_descriptor(path) {
            Ok(raw) => self.process_task(&raw, &fallback_id).await,
            Err(e) => {
                error!("Cannot read task {}: {}", path.display(), e);
                ResultRecord::failure(&fallback_id, &e, Utc::now())
            },
        };

        ImageIOService::save_json_atomic(&record, &self.result_path(path))?;
        Ok(record)
    }

    /// Validate and run one task descriptor, converting any failure into an
    /// error record. Nothing is written to `results_dir`.
    pub async fn process_task(&self, raw: &Value, fallback_id: &str) -> ResultRecord {
        let started_at = Utc::now();
        let start = Instant::now();
        let task_id = TaskValidator::best_effort_task_id(raw, fallback_id);

        let outcome = match TaskValidator::validate(raw) {
            Ok(task) => self.render(&task).instrument(spans::task(&task_id)).await,
            Err(e) => Err(e),
        };

        let record = match outcome {
            Ok(output_image) => ResultRecord::success(&task_id, output_image, started_at),
            Err(e) => {
                error!("Task {} failed: {}", task_id, e);
                ResultRecord::failure(&task_id, &e, started_at)
            },
        };
        let status = if record.is_success() { "success" } else { "error" };
        events::task_finished(&task_id, status, start.elapsed().as_millis() as u64);
        record
    }

    /// Run the pipeline for a validated task; returns the output path relative
    /// to the processed directory's parent
    #[instrument(skip(self, task), fields(task_id = %task.task_id))]
    async fn render(&self, task: &Task) -> Result<String> {
        let config = &self.config;
        let settings = RenderSettings::resolve(config, &task.params)?;
        info!(
            "Processing task {} with strategy '{}'",
            task.task_id, settings.strategy
        );

        let original_path = config.originals_dir.join(Task::file_name_of(&task.original_image));
        let template_path = config.templates_dir.join(Task::file_name_of(&task.template));
        let icon_path = config.logos_dir.join(Task::file_name_of(&task.icon));
        let output_path = config.processed_dir.join(Task::file_name_of(&task.output_filename));

        // Every required resource is loaded before any stage runs
        let original = ImageIOService::load_image(&original_path, "original image")?.to_rgba8();
        let template = ImageIOService::load_image(&template_path, "template")?.to_rgba8();
        let compositor = LayoutCompositor::from_settings(&settings)?;
        let icon = load_icon(&icon_path);

        let debug = DebugArtifacts::new(&config.processed_dir, &task.task_id, settings.debug);

        let masks = {
            let _stage = spans::stage("mask").entered();
            self.synthesizer.synthesize(&original)
        };

        let removed = remove_object(
            self.factory.as_ref(),
            &original,
            &masks,
            settings.strategy,
            &settings.removal,
        )
        .instrument(spans::stage("removal"))
        .await?;
        if debug.is_enabled() {
            // Strategies that ignore masks report none; the union is what they were offered
            let mask = removed
                .effective_mask
                .clone()
                .unwrap_or_else(|| masks::union(&masks.salient, &masks.auto_color));
            debug.save("mask", &DynamicImage::ImageLuma8(mask));
            if removed.effective_mask.is_some() {
                debug.save("inpaint", &DynamicImage::ImageRgba8(removed.image.clone()));
            }
            debug.save("nologo", &DynamicImage::ImageRgba8(removed.image.clone()));
        }

        let isolated = {
            let _stage = spans::stage("background").entered();
            info!("Removing background with '{}'", self.background.name());
            self.background.remove_background(&removed.image)?
        };
        debug.save("nobg", &DynamicImage::ImageRgba8(isolated.clone()));

        let cropped = crop_to_content(
            &DynamicImage::ImageRgba8(isolated),
            DEFAULT_ALPHA_THRESHOLD,
            DEFAULT_MARGIN,
        );
        debug.save("crop", &cropped);

        let card = {
            let _stage = spans::stage("composite").entered();
            compositor.compose(
                &template,
                &cropped.to_rgba8(),
                &task.product_data,
                settings.width,
                settings.height,
                icon.as_ref(),
            )?
        };

        ImageIOService::save_atomic(&DynamicImage::ImageRgba8(card), &output_path)?;
        info!("Task {} saved to {}", task.task_id, output_path.display());
        Ok(relative_output(&config.processed_dir, &output_path))
    }

}

fn read_descriptor(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CardError::file_io_error("read task file", path, &e))?;
    serde_json::from_str(&text)
        .map_err(|e| CardError::validation(format!("task file is not valid JSON: {}", e)))
}

/// A missing or unreadable icon only drops the icon from the card
fn load_icon(path: &Path) -> Option<RgbaImage> {
    match ImageIOService::load_image(path, "icon") {
        Ok(icon) => Some(icon.to_rgba8()),
        Err(e) => {
            warn!("Icon not used: {}", e);
            None
        },
    }
}

fn relative_output(processed_dir: &Path, output: &Path) -> String {
    let base = processed_dir.parent().unwrap_or_else(|| Path::new(""));
    output
        .strip_prefix(base)
        .unwrap_or(output)
        .to_string_lossy()
        .replace('\\', "/")
}
