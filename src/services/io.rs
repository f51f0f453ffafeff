//! Image I/O operations service
//!
//! This module separates file I/O operations from business logic,
//! making the pipeline stages testable on in-memory images.

use crate::error::{CardError, Result};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use serde::Serialize;
use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// JPEG quality used for final outputs
pub const JPEG_QUALITY: u8 = 100;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load a required image, reporting absence as a missing resource
    ///
    /// # Arguments
    /// * `path` - Path to the image file
    /// * `label` - What the file is, used in the error message
    ///
    /// # Errors
    /// * `CardError::MissingResource` - the file does not exist
    /// * `CardError::Image` - the file exists but cannot be decoded
    ///
    /// # Examples
    /// ```rust,no_run
    /// use tirecard::services::ImageIOService;
    ///
    /// let template = ImageIOService::load_image("templates/card.png", "template")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P, label: &str) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(CardError::missing_resource(label, path_ref));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                // Vendor photos regularly carry the wrong extension
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| CardError::file_io_error("read image data", path_ref, &io_err))?;
                image::load_from_memory(&data).map_err(|_| CardError::image_load_error(path_ref, &e))
            },
        }
    }

    /// Decode an image received from a collaborator
    ///
    /// # Errors
    /// `CardError::Image` when the bytes are not a supported image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }

    /// Encode as PNG in memory
    ///
    /// # Errors
    /// `CardError::Image` on encoder failure
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Output format implied by the file extension, `None` when the
    /// extension is not one the renderer writes
    #[must_use]
    pub fn format_for_path(path: &Path) -> Option<ImageFormat> {
        match ImageFormat::from_path(path) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Tiff)) => Some(format),
            #[cfg(feature = "webp-support")]
            Ok(ImageFormat::WebP) => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Write an image so that the destination either does not exist or holds
    /// the complete file. JPEG outputs are flattened to RGB.
    ///
    /// # Errors
    /// * `CardError::Validation` - the extension is not a supported output format
    /// * `CardError::Io` or `CardError::Image` - encoding or the final rename fails
    pub fn save_atomic<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let format = Self::format_for_path(path_ref).ok_or_else(|| {
            CardError::validation(format!(
                "unsupported output format for {}",
                path_ref.display()
            ))
        })?;
        let parent = Self::ensure_parent(path_ref)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .map_err(|e| CardError::file_io_error("create temporary file in", &parent, &e))?;

        match format {
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(temp.as_file_mut(), JPEG_QUALITY);
                rgb.write_with_encoder(encoder)?;
            },
            other => {
                let mut buffer = Cursor::new(Vec::new());
                image.write_to(&mut buffer, other)?;
                temp.write_all(buffer.get_ref())
                    .map_err(|e| CardError::file_io_error("write image", path_ref, &e))?;
            },
        }

        temp.persist(path_ref)
            .map_err(|e| CardError::file_io_error("persist image", path_ref, &e.error))?;
        log::debug!("Saved {:?} image to {}", format, path_ref.display());
        Ok(())
    }

    /// Pretty-printed JSON written with the same temp-file-and-rename scheme
    ///
    /// # Errors
    /// `CardError::Json` or `CardError::Io`
    pub fn save_json_atomic<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let parent = Self::ensure_parent(path_ref)?;
        let body = serde_json::to_vec_pretty(value)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .map_err(|e| CardError::file_io_error("create temporary file in", &parent, &e))?;
        temp.write_all(&body)
            .map_err(|e| CardError::file_io_error("write json", path_ref, &e))?;
        temp.persist(path_ref)
            .map_err(|e| CardError::file_io_error("persist json", path_ref, &e.error))?;
        Ok(())
    }

    fn ensure_parent(path: &Path) -> Result<PathBuf> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|e| CardError::file_io_error("create output directory", &parent, &e))?;
        Ok(parent)
    }

    /// Check if a file path has an extension the renderer can write
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        Self::format_for_path(path.as_ref()).is_some()
    }
}

/// Best-effort writer for intermediate stage images
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    dir: Option<PathBuf>,
    task_id: String,
}

impl DebugArtifacts {
    /// Artifacts go to `<processed_dir>/debug/<task_id>_<stage>.png`, with
    /// path separators and parent references in the id flattened to `_`
    #[must_use]
    pub fn new(processed_dir: &Path, task_id: &str, enabled: bool) -> Self {
        Self {
            dir: enabled.then(|| processed_dir.join("debug")),
            task_id: file_safe_id(task_id),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    #[must_use]
    pub fn path_for(&self, stage: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|d| d.join(format!("{}_{}.png", self.task_id, stage)))
    }

    /// Failures are logged and swallowed; artifacts never fail a task
    pub fn save(&self, stage: &str, image: &DynamicImage) {
        let Some(path) = self.path_for(stage) else {
            return;
        };
        match ImageIOService::save_atomic(image, &path) {
            Ok(()) => log::debug!("Debug artifact '{}' written to {}", stage, path.display()),
            Err(e) => log::warn!("Could not write debug artifact '{}': {}", stage, e),
        }
    }
}

fn file_safe_id(task_id: &str) -> String {
    let flattened = task_id.replace(['/', '\\'], "_").replace("..", "_");
    if flattened.trim().is_empty() {
        "task".to_string()
    } else {
        flattened
    }
}
