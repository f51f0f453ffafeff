//! End-to-end task runs against a temporary workspace

mod common;

use common::{fonts_available, task, Workspace};
use image::{ColorType, GenericImageView};
use serde_json::json;
use tirecard::{BorderKeySegmenter, ImageIOService, TaskRunner, TaskStatus};

#[tokio::test]
async fn test_single_task_renders_card_and_records_success() {
    if !fonts_available() {
        return;
    }
    let ws = Workspace::new();
    let runner = TaskRunner::new(ws.config())
        .with_segmenter(Box::new(BorderKeySegmenter::default()))
        .with_background_remover(Box::new(BorderKeySegmenter::default()));
    let path = ws.write_task("e2e-1", &task("e2e-1", "winter"));

    let record = runner.process_task_file(&path).await.unwrap();
    assert_eq!(record.status, TaskStatus::Success, "{:?}", record.error);
    assert_eq!(record.output_image.as_deref(), Some("processed/e2e-1.png"));

    let card = ImageIOService::load_image(ws.path("processed").join("e2e-1.png"), "card").unwrap();
    assert_eq!(card.dimensions(), (124, 166));

    let stored = ws.read_result("e2e-1");
    assert_eq!(stored["status"], "success");
    assert_eq!(stored["output_image"], "processed/e2e-1.png");
    assert!(stored["error"].is_null());
}

#[tokio::test]
async fn test_params_override_canvas_size() {
    if !fonts_available() {
        return;
    }
    let ws = Workspace::new();
    let mut descriptor = task("sized", "summer");
    descriptor["params"] = json!({"width": "100", "height": 140, "draw_panels": 1});
    let path = ws.write_task("sized", &descriptor);

    let record = TaskRunner::new(ws.config()).process_task_file(&path).await.unwrap();
    assert!(record.is_success(), "{:?}", record.error);
    let card = ImageIOService::load_image(ws.path("processed").join("sized.png"), "card").unwrap();
    assert_eq!(card.dimensions(), (100, 140));
}

#[tokio::test]
async fn test_unknown_season_and_missing_icon_still_render() {
    if !fonts_available() {
        return;
    }
    let ws = Workspace::new();
    let mut descriptor = task("plain", "monsoon");
    descriptor["icon"] = json!("absent.png");
    let path = ws.write_task("plain", &descriptor);

    let record = TaskRunner::new(ws.config()).process_task_file(&path).await.unwrap();
    assert!(record.is_success(), "{:?}", record.error);
    assert!(ws.path("processed").join("plain.png").exists());
}

#[tokio::test]
async fn test_missing_product_data_is_rejected_before_io() {
    let ws = Workspace::new();
    let mut descriptor = task("no-data", "winter");
    descriptor.as_object_mut().unwrap().remove("product_data");
    let path = ws.write_task("no-data", &descriptor);

    let record = TaskRunner::new(ws.config()).process_task_file(&path).await.unwrap();
    assert_eq!(record.status, TaskStatus::Error);
    assert!(record.error.as_deref().unwrap().starts_with("ValidationError"));
    assert!(record.message.contains("product_data"));
    assert!(!ws.path("processed").join("no-data.png").exists());
    assert_eq!(ws.read_result("no-data")["status"], "error");
}

#[tokio::test]
async fn test_batch_isolates_failures_and_skips_finished_tasks() {
    if !fonts_available() {
        return;
    }
    let ws = Workspace::new();
    ws.write_task("a-good", &task("a-good", "summer"));
    let mut broken = task("b-broken", "summer");
    broken["original_image"] = json!("missing.png");
    ws.write_task("b-broken", &broken);
    ws.write_task("c-good", &task("c-good", "all-season"));

    let runner = TaskRunner::new(ws.config());
    let summary = runner.run_batch().await.unwrap();
    assert_eq!(summary.records.len(), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.unrecorded, 0);

    let failed = ws.read_result("b-broken");
    assert_eq!(failed["status"], "error");
    assert!(failed["error"].as_str().unwrap().starts_with("MissingResourceError"));
    assert!(!ws.path("processed").join("b-broken.png").exists());

    // Every task now has a record; a second pass has nothing to do
    let again = runner.run_batch().await.unwrap();
    assert!(again.records.is_empty());
}

#[tokio::test]
async fn test_batch_size_caps_pending_tasks() {
    let ws = Workspace::new();
    for id in ["t1", "t2", "t3"] {
        ws.write_task(id, &json!({"task_id": id}));
    }
    let config = ws.builder().batch_size(2).build().unwrap();
    let summary = TaskRunner::new(config).run_batch().await.unwrap();
    assert_eq!(summary.records.len(), 2);
    assert!(ws.path("results").join("t1.json").exists());
    assert!(ws.path("results").join("t2.json").exists());
    assert!(!ws.path("results").join("t3.json").exists());
}

#[tokio::test]
async fn test_debug_artifacts_written_per_stage() {
    if !fonts_available() {
        return;
    }
    let ws = Workspace::new();
    let mut descriptor = task("dbg", "winter");
    descriptor["params"] = json!({"debug_logging": "true"});
    let path = ws.write_task("dbg", &descriptor);

    let runner = TaskRunner::new(ws.config())
        .with_segmenter(Box::new(BorderKeySegmenter::default()))
        .with_background_remover(Box::new(BorderKeySegmenter::default()));
    let record = runner.process_task_file(&path).await.unwrap();
    assert!(record.is_success(), "{:?}", record.error);

    let debug_dir = ws.path("processed").join("debug");
    for stage in ["mask", "inpaint", "nologo", "nobg", "crop"] {
        assert!(
            debug_dir.join(format!("dbg_{}.png", stage)).exists(),
            "missing {} artifact",
            stage
        );
    }
    let mask = ImageIOService::load_image(debug_dir.join("dbg_mask.png"), "mask").unwrap();
    assert_eq!(mask.color(), ColorType::L8);
    let inpainted = ImageIOService::load_image(debug_dir.join("dbg_inpaint.png"), "inpaint").unwrap();
    assert_eq!(inpainted.color(), ColorType::Rgba8);
}

#[tokio::test]
async fn test_result_keyed_by_task_file_not_task_id() {
    let ws = Workspace::new();
    ws.write_task("a", &json!({"task_id": "b"}));

    let runner = TaskRunner::new(ws.config());
    let summary = runner.run_batch().await.unwrap();
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].task_id, "b");
    assert_eq!(ws.read_result("a")["task_id"], "b");
    assert!(!ws.path("results").join("b.json").exists());

    // The record is found again, so the task is not reprocessed
    assert!(runner.pending_tasks().unwrap().is_empty());
    assert!(runner.run_batch().await.unwrap().records.is_empty());
}

#[tokio::test]
async fn test_dotted_task_stems_are_tracked_separately() {
    let ws = Workspace::new();
    ws.write_task("x", &json!({"task_id": "x"}));
    ws.write_task("x.v2", &json!({"task_id": "x-v2"}));

    let runner = TaskRunner::new(ws.config());
    let first = runner.process_task_file(ws.path("tasks").join("x.json")).await.unwrap();
    assert_eq!(first.task_id, "x");

    let pending = runner.pending_tasks().unwrap();
    assert_eq!(pending, vec![ws.path("tasks").join("x.v2.json")]);

    let summary = runner.run_batch().await.unwrap();
    assert_eq!(summary.records.len(), 1);
    assert_eq!(ws.read_result("x.v2")["task_id"], "x-v2");
    assert_eq!(ws.read_result("x")["task_id"], "x");
    assert!(runner.pending_tasks().unwrap().is_empty());
}

#[tokio::test]
async fn test_task_id_cannot_redirect_result_write() {
    let ws = Workspace::new();
    let victim = json!({"task_id": "t"});
    let victim_path = ws.write_task("t", &victim);
    ws.write_task("evil", &json!({"task_id": "../tasks/t"}));

    let summary = TaskRunner::new(ws.config()).run_batch().await.unwrap();
    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.unrecorded, 0);

    let untouched: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&victim_path).unwrap()).unwrap();
    assert_eq!(untouched, victim);

    let record = ws.read_result("evil");
    assert_eq!(record["task_id"], "../tasks/t");
    assert_eq!(record["status"], "error");
    assert_eq!(ws.read_result("t")["task_id"], "t");
}
