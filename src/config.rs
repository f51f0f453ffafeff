//! Configuration types for card rendering
//!
//! [`ProcessorConfig`] is the static, read-only configuration of a run. Each
//! task may override parts of it through its `params` overlay; the merged
//! per-task view is [`RenderSettings`].

use crate::{
    compositor::{fonts::FontPaths, ColorSet},
    error::{CardError, Result},
    masks::MaskOptions,
    removal::{remote::DEFAULT_PROMPT, MaskPolicy, RemovalContext, RemovalStrategy},
    types::TaskParams,
    utils::parse_hex_color,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted canvas side, in output pixels
pub const MAX_CANVAS_SIDE: u32 = 8192;

/// Largest accepted supersampling factor
pub const MAX_SUPERSAMPLING: u32 = 6;

/// Largest working canvas, in pixels, after supersampling
pub const MAX_SUPERSAMPLED_PIXELS: u64 = 100_000_000;

/// Local inpainting service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LamaConfig {
    /// Full URL of the `/inpaint` endpoint
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for LamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/inpaint".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Remote generative API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunwayConfig {
    pub base_url: String,
    /// Never serialized back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub prompt: String,
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for the remote task to finish
    pub task_timeout_secs: u64,
    /// Per-request timeout, including the result download
    pub download_timeout_secs: u64,
}

impl Default for RunwayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dev.runwayml.com".to_string(),
            api_key: None,
            prompt: DEFAULT_PROMPT.to_string(),
            poll_interval_ms: 5000,
            task_timeout_secs: 600,
            download_timeout_secs: 120,
        }
    }
}

/// Default colors as `#RRGGBB` strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub white: String,
    pub black: String,
    pub cyan: String,
    pub light_bg: String,
    pub load_idx_bg: String,
    pub speed_idx_bg: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            white: "#FFFFFF".to_string(),
            black: "#222222".to_string(),
            cyan: "#349FCD".to_string(),
            light_bg: "#FFFFFF".to_string(),
            load_idx_bg: "#349FCD".to_string(),
            speed_idx_bg: "#349FCD".to_string(),
        }
    }
}

/// Canvas, font and color defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    pub width: u32,
    pub height: u32,
    pub supersampling: u32,
    /// Font file names (resolved against `fonts_dir`) or absolute paths
    pub font_bold: String,
    pub font_semibold: String,
    pub font_regular: String,
    pub colors: ColorConfig,
    /// Fill the spec and index panels instead of relying on the template
    pub draw_panels: bool,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 620,
            height: 826,
            supersampling: 3,
            font_bold: "Inter-Bold.ttf".to_string(),
            font_semibold: "Inter-SemiBold.ttf".to_string(),
            font_regular: "Inter-Regular.ttf".to_string(),
            colors: ColorConfig::default(),
            draw_panels: false,
        }
    }
}

/// Static configuration for a processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub tasks_dir: PathBuf,
    pub results_dir: PathBuf,
    pub originals_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub logos_dir: PathBuf,
    pub fonts_dir: PathBuf,
    /// Maximum number of pending tasks picked up per batch run
    pub batch_size: usize,
    pub render: RenderDefaults,
    /// Strategy used when a task does not name one
    pub removal_strategy: RemovalStrategy,
    pub mask_policy: MaskPolicy,
    pub inpaint_radius: u32,
    pub masks: MaskOptions,
    pub lama: LamaConfig,
    pub runway: RunwayConfig,
    /// Write intermediate images for every task
    pub debug: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tasks_dir: PathBuf::from("tasks"),
            results_dir: PathBuf::from("results"),
            originals_dir: PathBuf::from("originals"),
            processed_dir: PathBuf::from("processed"),
            templates_dir: PathBuf::from("templates"),
            logos_dir: PathBuf::from("logos"),
            fonts_dir: PathBuf::from("fonts"),
            batch_size: 10,
            render: RenderDefaults::default(),
            removal_strategy: RemovalStrategy::default(),
            mask_policy: MaskPolicy::default(),
            inpaint_radius: 7,
            masks: MaskOptions::default(),
            lama: LamaConfig::default(),
            runway: RunwayConfig::default(),
            debug: false,
        }
    }
}

impl ProcessorConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use tirecard::ProcessorConfig;
    ///
    /// let config = ProcessorConfig::builder()
    ///     .root_dir("/srv/cards")
    ///     .batch_size(5)
    ///     .build()
    ///     .unwrap();
    /// assert!(config.tasks_dir.ends_with("tasks"));
    /// ```
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::default()
    }

    /// Load from a JSON file; relative directories are resolved against the
    /// file's own directory.
    ///
    /// # Errors
    /// I/O, JSON or validation failures
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref)
            .map_err(|e| CardError::file_io_error("read config", path_ref, &e))?;
        let mut config: Self = serde_json::from_str(&text)
            .map_err(|e| CardError::invalid_config(format!("{}: {}", path_ref.display(), e)))?;
        if let Some(base) = path_ref.parent() {
            config.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for dir in [
            &mut self.tasks_dir,
            &mut self.results_dir,
            &mut self.originals_dir,
            &mut self.processed_dir,
            &mut self.templates_dir,
            &mut self.logos_dir,
            &mut self.fonts_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// `CardError::InvalidConfig` naming the offending value
    pub fn validate(&self) -> Result<()> {
        validate_canvas(self.render.width, self.render.height, self.render.supersampling)?;
        if self.batch_size == 0 {
            return Err(CardError::invalid_config("batch_size must be at least 1"));
        }
        if self.inpaint_radius == 0 {
            return Err(CardError::invalid_config("inpaint_radius must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.masks.roi_height_ratio) {
            return Err(CardError::invalid_config(format!(
                "masks.roi_height_ratio must be within 0..=1, got {}",
                self.masks.roi_height_ratio
            )));
        }
        if self.masks.color_quant == 0 {
            return Err(CardError::invalid_config("masks.color_quant must be at least 1"));
        }
        if self.lama.timeout_secs == 0 || self.runway.download_timeout_secs == 0 {
            return Err(CardError::invalid_config("network timeouts must be non-zero"));
        }
        if self.runway.poll_interval_ms == 0 {
            return Err(CardError::invalid_config("runway.poll_interval_ms must be non-zero"));
        }
        ColorSet::from_config(&self.render.colors)?;
        Ok(())
    }
}

fn validate_canvas(width: u32, height: u32, supersampling: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        return Err(CardError::invalid_config(format!(
            "canvas size {}x{} outside 1..={}",
            width, height, MAX_CANVAS_SIDE
        )));
    }
    if supersampling == 0 || supersampling > MAX_SUPERSAMPLING {
        return Err(CardError::invalid_config(format!(
            "supersampling factor {} outside 1..={}",
            supersampling, MAX_SUPERSAMPLING
        )));
    }
    let scale = u64::from(supersampling);
    let pixels = u64::from(width) * scale * u64::from(height) * scale;
    if pixels > MAX_SUPERSAMPLED_PIXELS {
        return Err(CardError::invalid_config(format!(
            "supersampled canvas {}x{} exceeds {} pixels",
            u64::from(width) * scale,
            u64::from(height) * scale,
            MAX_SUPERSAMPLED_PIXELS
        )));
    }
    Ok(())
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one loaded from a file
    #[must_use]
    pub fn from_config(config: ProcessorConfig) -> Self {
        Self { config }
    }

    /// Place every directory under `root` with its default name
    #[must_use]
    pub fn root_dir<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        self.config.tasks_dir = root.join("tasks");
        self.config.results_dir = root.join("results");
        self.config.originals_dir = root.join("originals");
        self.config.processed_dir = root.join("processed");
        self.config.templates_dir = root.join("templates");
        self.config.logos_dir = root.join("logos");
        self.config.fonts_dir = root.join("fonts");
        self
    }

    #[must_use]
    pub fn tasks_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.tasks_dir = dir.into();
        self
    }

    #[must_use]
    pub fn results_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    #[must_use]
    pub fn processed_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.processed_dir = dir.into();
        self
    }

    #[must_use]
    pub fn fonts_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.fonts_dir = dir.into();
        self
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Output canvas size in pixels
    #[must_use]
    pub fn canvas(mut self, width: u32, height: u32) -> Self {
        self.config.render.width = width;
        self.config.render.height = height;
        self
    }

    #[must_use]
    pub fn supersampling(mut self, factor: u32) -> Self {
        self.config.render.supersampling = factor;
        self
    }

    /// Font file names or paths for the bold, semibold and regular faces
    #[must_use]
    pub fn fonts(mut self, bold: &str, semibold: &str, regular: &str) -> Self {
        self.config.render.font_bold = bold.to_string();
        self.config.render.font_semibold = semibold.to_string();
        self.config.render.font_regular = regular.to_string();
        self
    }

    #[must_use]
    pub fn draw_panels(mut self, enabled: bool) -> Self {
        self.config.render.draw_panels = enabled;
        self
    }

    #[must_use]
    pub fn removal_strategy(mut self, strategy: RemovalStrategy) -> Self {
        self.config.removal_strategy = strategy;
        self
    }

    #[must_use]
    pub fn mask_policy(mut self, policy: MaskPolicy) -> Self {
        self.config.mask_policy = policy;
        self
    }

    #[must_use]
    pub fn inpaint_radius(mut self, radius: u32) -> Self {
        self.config.inpaint_radius = radius;
        self
    }

    #[must_use]
    pub fn mask_options(mut self, options: MaskOptions) -> Self {
        self.config.masks = options;
        self
    }

    #[must_use]
    pub fn lama_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.lama.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn runway(mut self, runway: RunwayConfig) -> Self {
        self.config.runway = runway;
        self
    }

    #[must_use]
    pub fn runway_api_key<S: Into<String>>(mut self, key: Option<S>) -> Self {
        self.config.runway.api_key = key.map(Into::into);
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Validate and return the configuration
    ///
    /// # Errors
    /// `CardError::InvalidConfig` from [`ProcessorConfig::validate`]
    pub fn build(self) -> Result<ProcessorConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Per-task merge of `params` over the static configuration
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub supersampling: u32,
    pub fonts: FontPaths,
    pub colors: ColorSet,
    pub strategy: RemovalStrategy,
    pub debug: bool,
    pub draw_panels: bool,
    pub removal: RemovalContext,
}

impl RenderSettings {
    /// Resolve the effective settings for one task.
    ///
    /// Empty or absent params fall through to the configured defaults.
    ///
    /// # Errors
    /// * `CardError::Strategy` - unknown `logo_removal_method`
    /// * `CardError::InvalidConfig` - bad canvas size or color
    pub fn resolve(config: &ProcessorConfig, params: &TaskParams) -> Result<Self> {
        let render = &config.render;
        let width = params.get_u32("width").unwrap_or(render.width);
        let height = params.get_u32("height").unwrap_or(render.height);
        let supersampling = params.get_u32("supersampling").unwrap_or(render.supersampling);
        validate_canvas(width, height, supersampling)?;

        let font = |key: &str, default: &str| {
            resolve_font_path(&config.fonts_dir, params.get_str(key).unwrap_or(default))
        };
        let fonts = FontPaths {
            bold: font("font_bold", &render.font_bold),
            semibold: font("font_semibold", &render.font_semibold),
            regular: font("font_regular", &render.font_regular),
        };

        let c = &render.colors;
        let color = |key: &str, default: &str| parse_hex_color(params.get_str(key).unwrap_or(default));
        let colors = ColorSet {
            white: color("color_white", &c.white)?,
            black: color("color_black", &c.black)?,
            cyan: color("color_cyan", &c.cyan)?,
            light_bg: color("color_light_bg", &c.light_bg)?,
            load_idx_bg: color("color_load_idx_bg", &c.load_idx_bg)?,
            speed_idx_bg: color("color_speed_idx_bg", &c.speed_idx_bg)?,
        };

        let strategy = match params.get_str("logo_removal_method") {
            Some(name) => name.parse()?,
            None => config.removal_strategy,
        };

        Ok(Self {
            width,
            height,
            supersampling,
            fonts,
            colors,
            strategy,
            debug: params.get_bool("debug_logging").unwrap_or(false) || config.debug,
            draw_panels: params.get_bool("draw_panels").unwrap_or(render.draw_panels),
            removal: RemovalContext {
                runway_api_key: params.get_str("runwayml_api_key").map(str::to_string),
                runway_prompt: params.get_str("runwayml_prompt").map(str::to_string),
            },
        })
    }
}

/// Absolute paths are used as given; anything else lives in `fonts_dir`
#[must_use]
pub fn resolve_font_path(fonts_dir: &Path, font: &str) -> PathBuf {
    let path = Path::new(font);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        fonts_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert_eq!(config.render.width, 620);
        assert_eq!(config.render.height, 826);
        assert_eq!(config.render.supersampling, 3);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.inpaint_radius, 7);
        assert_eq!(config.removal_strategy, RemovalStrategy::Local);
        assert_eq!(config.mask_policy, MaskPolicy::TireConstrained);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(ProcessorConfig::builder().batch_size(0).build().is_err());
        assert!(ProcessorConfig::builder().canvas(0, 100).build().is_err());
        assert!(ProcessorConfig::builder().supersampling(0).build().is_err());
        assert!(ProcessorConfig::builder().inpaint_radius(0).build().is_err());

        let mut config = ProcessorConfig::default();
        config.render.colors.cyan = "blue".to_string();
        assert!(matches!(config.validate(), Err(CardError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file_resolves_relative_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tirecard.json");
        std::fs::write(
            &path,
            r#"{"tasks_dir": "incoming", "processed_dir": "/abs/out", "batch_size": 3,
                "render": {"width": 400}, "mask_policy": "unconstrained",
                "removal_strategy": "lama"}"#,
        )
        .unwrap();

        let config = ProcessorConfig::from_file(&path).unwrap();
        assert_eq!(config.tasks_dir, dir.path().join("incoming"));
        assert_eq!(config.processed_dir, PathBuf::from("/abs/out"));
        assert_eq!(config.results_dir, dir.path().join("results"));
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.render.width, 400);
        assert_eq!(config.render.height, 826);
        assert_eq!(config.mask_policy, MaskPolicy::Unconstrained);
        assert_eq!(config.removal_strategy, RemovalStrategy::Service);
    }

    #[test]
    fn test_from_file_rejects_unknown_strategy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"removal_strategy": "magic"}"#).unwrap();
        assert!(ProcessorConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ProcessorConfig::builder().root_dir("/srv").build().unwrap();
        let settings = RenderSettings::resolve(&config, &TaskParams::new()).unwrap();
        assert_eq!((settings.width, settings.height, settings.supersampling), (620, 826, 3));
        assert_eq!(settings.fonts.bold, PathBuf::from("/srv/fonts/Inter-Bold.ttf"));
        assert_eq!(settings.colors.black, Rgba([0x22, 0x22, 0x22, 255]));
        assert_eq!(settings.strategy, RemovalStrategy::Local);
        assert!(!settings.debug);
        assert!(settings.removal.runway_api_key.is_none());
    }

    #[test]
    fn test_resolve_params_overlay() {
        let config = ProcessorConfig::builder().root_dir("/srv").build().unwrap();
        let params = TaskParams::new()
            .with("width", "300")
            .with("height", 400)
            .with("font_bold", "/opt/fonts/Custom.ttf")
            .with("font_regular", "")
            .with("color_white", "#FF0000")
            .with("logo_removal_method", "runwayml")
            .with("runwayml_api_key", "k")
            .with("debug_logging", true);
        let settings = RenderSettings::resolve(&config, &params).unwrap();
        assert_eq!((settings.width, settings.height), (300, 400));
        assert_eq!(settings.fonts.bold, PathBuf::from("/opt/fonts/Custom.ttf"));
        assert_eq!(settings.fonts.regular, PathBuf::from("/srv/fonts/Inter-Regular.ttf"));
        assert_eq!(settings.colors.white, Rgba([255, 0, 0, 255]));
        assert_eq!(settings.strategy, RemovalStrategy::Remote);
        assert_eq!(settings.removal.runway_api_key.as_deref(), Some("k"));
        assert!(settings.debug);
    }

    #[test]
    fn test_resolve_rejects_unknown_strategy_and_bad_color() {
        let config = ProcessorConfig::default();
        let err = RenderSettings::resolve(&config, &TaskParams::new().with("logo_removal_method", "magic"))
            .unwrap_err();
        assert!(matches!(err, CardError::Strategy(_)));

        let err = RenderSettings::resolve(&config, &TaskParams::new().with("color_cyan", "#12"))
            .unwrap_err();
        assert!(matches!(err, CardError::InvalidConfig(_)));

        let err = RenderSettings::resolve(&config, &TaskParams::new().with("width", 0)).unwrap_err();
        assert!(matches!(err, CardError::InvalidConfig(_)));
    }

    #[test]
    fn test_supersampled_canvas_is_capped() {
        // Each side and the factor are in range; the working canvas is not
        let err = ProcessorConfig::builder()
            .canvas(8192, 8192)
            .supersampling(6)
            .build()
            .unwrap_err();
        assert!(matches!(err, CardError::InvalidConfig(_)));
        assert!(err.to_string().contains("49152x49152"), "{}", err);

        assert!(ProcessorConfig::builder().canvas(8192, 8192).supersampling(1).build().is_ok());
        assert!(ProcessorConfig::builder().canvas(3000, 3000).supersampling(3).build().is_ok());

        let params = TaskParams::new().with("width", 6000).with("height", 6000).with("supersampling", 6);
        let err = RenderSettings::resolve(&ProcessorConfig::default(), &params).unwrap_err();
        assert!(matches!(err, CardError::InvalidConfig(_)));
    }
}
