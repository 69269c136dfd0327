//! Tests for the export module

use atm_segmentation::export::{ExportMetadata, SelectionExport, FEATURE_NAMES};
use atm_segmentation::prelude::*;
use chrono::NaiveDate;
use ndarray::Array2;
use ndarray_npy::ReadNpyExt;
use std::fs::{self, File};
use tempfile::TempDir;

fn observations() -> Vec<Observation> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut obs = Vec::new();
    for d in 0..30u64 {
        let date = start + chrono::Days::new(d);
        obs.push(Observation::new("ATM-2", date, 1000.0 + d as f64));
        obs.push(Observation::new("ATM-1", date, if d % 10 == 0 { 2000.0 } else { 800.0 }));
        obs.push(Observation::new("ATM-3", date, 0.0));
    }
    obs
}

fn run() -> (PipelineOutput, SegmentationConfig) {
    let pipeline = PipelineBuilder::new()
        .quota("normal_estable", 1)
        .quota("event_driven", 3)
        .experiment("export_test", "three ATMs")
        .build()
        .unwrap();
    let output = pipeline.run(&observations()).unwrap();
    (output, pipeline.config().clone())
}

#[test]
fn test_features_npy_matches_summary() {
    let (output, config) = run();
    let dir = TempDir::new().unwrap();
    SegmentationExporter::new(dir.path())
        .export(&output, &config)
        .unwrap();

    let file = File::open(dir.path().join("summary_features.npy")).unwrap();
    let array = Array2::<f64>::read_npy(file).unwrap();

    assert_eq!(array.shape(), &[3, FEATURE_NAMES.len()]);
    for (i, row) in output.summaries.iter().enumerate() {
        assert_eq!(array[[i, 0]], row.summary.n_observations as f64);
        assert_eq!(array[[i, 1]], row.summary.median);
        assert_eq!(array[[i, 2]], row.summary.p95);
        assert_eq!(array[[i, 3]], row.summary.ratio);
    }
}

#[test]
fn test_summary_json_round_trip() {
    let (output, config) = run();
    let dir = TempDir::new().unwrap();
    SegmentationExporter::new(dir.path())
        .export(&output, &config)
        .unwrap();

    let raw = fs::read_to_string(dir.path().join("summary.json")).unwrap();
    let rows: Vec<ClassifiedSummary> = serde_json::from_str(&raw).unwrap();
    assert_eq!(rows, output.summaries);
    assert!(raw.contains("\"label\": \"event_driven\""));
    assert!(raw.contains("\"entity_id\": \"ATM-1\""));
}

#[test]
fn test_selection_and_report_files() {
    let (output, config) = run();
    let dir = TempDir::new().unwrap();
    SegmentationExporter::new(dir.path())
        .export(&output, &config)
        .unwrap();

    let raw = fs::read_to_string(dir.path().join("selection.json")).unwrap();
    let selection: SelectionExport = serde_json::from_str(&raw).unwrap();
    assert_eq!(selection.selections, output.selection.result);
    assert_eq!(selection.notices.len(), 1);
    assert!(raw.contains("\"kind\": \"clamped\""));

    let report: SelectionReport =
        serde_json::from_str(&fs::read_to_string(dir.path().join("report.json")).unwrap())
            .unwrap();
    assert_eq!(report, output.selection.report);

    let text = fs::read_to_string(dir.path().join("report.txt")).unwrap();
    assert_eq!(text, output.selection.report.to_string());
}

#[test]
fn test_metadata_file() {
    let (output, config) = run();
    let dir = TempDir::new().unwrap();
    SegmentationExporter::new(dir.path())
        .export(&output, &config)
        .unwrap();

    let metadata: ExportMetadata =
        serde_json::from_str(&fs::read_to_string(dir.path().join("metadata.json")).unwrap())
            .unwrap();
    assert_eq!(metadata.n_entities, 3);
    assert_eq!(metadata.total_requested, 4);
    assert_eq!(metadata.total_selected, 2);
    assert_eq!(metadata.mode, SelectionMode::Random);
    assert_eq!(metadata.experiment.as_deref(), Some("export_test"));
    assert_eq!(metadata.label_counts[&PreclusterLabel::EventDriven], 1);
    assert_eq!(metadata.label_counts[&PreclusterLabel::NormalEstable], 2);
    assert!(chrono::DateTime::parse_from_rfc3339(&metadata.export_timestamp).is_ok());
}

#[test]
fn test_export_creates_nested_directory() {
    let (output, config) = run();
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    atm_segmentation::export_run(&output, &config, &nested).unwrap();
    assert!(nested.join("metadata.json").exists());
}
