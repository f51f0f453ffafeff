//! Shared fixtures: a throwaway card workspace with synthetic images

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tirecard::{ProcessorConfig, ProcessorConfigBuilder};

const DEJAVU_BOLD: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";
const DEJAVU: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// True when the system fonts used by rendering tests are installed
pub fn fonts_available() -> bool {
    let available = Path::new(DEJAVU_BOLD).exists() && Path::new(DEJAVU).exists();
    if !available {
        eprintln!("DejaVu fonts not installed, skipping");
    }
    available
}

/// Temporary root with the standard directory layout
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        for dir in ["tasks", "results", "originals", "processed", "templates", "logos"] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        let ws = Self { root };
        tire_photo(160, 140)
            .save(ws.path("originals").join("tire.png"))
            .unwrap();
        RgbaImage::from_pixel(62, 83, Rgba([240, 240, 240, 255]))
            .save(ws.path("templates").join("card.png"))
            .unwrap();
        RgbaImage::from_pixel(16, 16, Rgba([52, 159, 205, 255]))
            .save(ws.path("logos").join("winter.png"))
            .unwrap();
        ws
    }

    pub fn path(&self, dir: &str) -> PathBuf {
        self.root.path().join(dir)
    }

    /// Builder rooted here, rendering small cards with the system fonts
    pub fn builder(&self) -> ProcessorConfigBuilder {
        ProcessorConfig::builder()
            .root_dir(self.root.path())
            .canvas(124, 166)
            .supersampling(2)
            .fonts(DEJAVU_BOLD, DEJAVU_BOLD, DEJAVU)
    }

    pub fn config(&self) -> ProcessorConfig {
        self.builder().build().unwrap()
    }

    pub fn write_task(&self, name: &str, task: &Value) -> PathBuf {
        let path = self.path("tasks").join(format!("{}.json", name));
        std::fs::write(&path, serde_json::to_string_pretty(task).unwrap()).unwrap();
        path
    }

    /// Result record of the task file named `stem`
    pub fn read_result(&self, stem: &str) -> Value {
        let path = self.path("results").join(format!("{}.json", stem));
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }
}

/// A task descriptor pointing at the workspace fixtures
pub fn task(task_id: &str, season: &str) -> Value {
    json!({
        "task_id": task_id,
        "product_data": {
            "brand": "Nordic",
            "model": "Ice Grip 9",
            "width": "205",
            "height": "55",
            "diameter": "R16",
            "load_index": "94",
            "speed_index": "T",
            "season": season
        },
        "original_image": "uploads/tire.png",
        "template": "card.png",
        "icon": "winter.png",
        "output_filename": format!("{}.png", task_id)
    })
}

/// Dark tire disc on a white backdrop, with a white logo bar on the lower
/// sidewall
pub fn tire_photo(width: u32, height: u32) -> RgbaImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 * 0.4;
    RgbaImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let inside = dx * dx + dy * dy <= radius * radius;
        let logo = inside && dy > radius * 0.55 && dx.abs() < radius * 0.3;
        if logo || !inside {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([40, 40, 44, 255])
        }
    })
}
