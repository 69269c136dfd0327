//! Data Export Module
//!
//! Writes the artifacts of a segmentation run for downstream consumers.
//!
//! # Output Files
//!
//! | File | Format | Content |
//! |------|--------|---------|
//! | `summary.json` | JSON | Classified summary rows |
//! | `summary_features.npy` | NumPy `[n_atms, 4]` f64 | n_observations, median, p95, ratio |
//! | `selection.json` | JSON | Selected ids per label and notices |
//! | `report.json` | JSON | Reporting table (unrounded percentages) |
//! | `report.txt` | text | Rendered reporting table |
//! | `metadata.json` | JSON | Timestamp, mode, seed (random mode only), thresholds, label counts |
//! | `forecast_<label>.json` | JSON | Forecasting hand-off run (optional) |
//!
//! Rows of `summary_features.npy` follow `summary.json` order (ATM id
//! ascending).
//!
//! # Example
//!
//! ```ignore
//! use atm_segmentation::export::SegmentationExporter;
//!
//! let exporter = SegmentationExporter::new("output");
//! exporter.export(&output, pipeline.config())?;
//! ```

use crate::config::SegmentationConfig;
use crate::error::{Result, SegmentationError};
use crate::history::ForecastRun;
use crate::pipeline::PipelineOutput;
use crate::precluster::{ClassifiedSummary, PreclusterLabel, PreclusterThresholds};
use crate::sampling::{SelectionMode, SelectionNotice, SelectionResult};
use ndarray::Array2;
use ndarray_npy::WriteNpyExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Column order of `summary_features.npy`.
pub const FEATURE_NAMES: [&str; 4] = ["n_observations", "median", "p95", "ratio"];

/// Metadata about an exported run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Number of profiled ATMs
    pub n_entities: usize,

    /// Columns of `summary_features.npy`
    pub feature_names: Vec<String>,

    /// ATM counts per label
    pub label_counts: BTreeMap<PreclusterLabel, usize>,

    /// Thresholds used for classification
    pub thresholds: PreclusterThresholds,

    /// Selection policy
    pub mode: SelectionMode,

    /// Seed, recorded only for random mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Sum of requested counts
    pub total_requested: usize,

    /// ATMs actually selected
    pub total_selected: usize,

    /// Experiment name, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,

    /// Export timestamp
    pub export_timestamp: String,
}

impl ExportMetadata {
    /// Describe a run.
    pub fn from_output(output: &PipelineOutput, config: &SegmentationConfig) -> Self {
        Self {
            n_entities: output.entity_count(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            label_counts: output.stats.iter().collect(),
            thresholds: config.thresholds,
            mode: config.selection.mode,
            seed: config
                .selection
                .mode
                .is_randomized()
                .then_some(config.selection.seed),
            total_requested: output.selection.report.total_requested,
            total_selected: output.selection.result.total_selected(),
            experiment: config.metadata.as_ref().map(|m| m.name.clone()),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Contents of `selection.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionExport {
    /// Per-label selections
    pub selections: SelectionResult,

    /// Clamp and skip notices
    pub notices: Vec<SelectionNotice>,
}

/// Writes segmentation artifacts into one directory.
pub struct SegmentationExporter {
    output_dir: PathBuf,
}

impl SegmentationExporter {
    /// Create an exporter for a directory (created on export).
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Target directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export every artifact of a run.
    pub fn export(&self, output: &PipelineOutput, config: &SegmentationConfig) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        self.write_json("summary.json", &output.summaries)?;
        self.export_features(&output.summaries)?;

        self.write_json(
            "selection.json",
            &SelectionExport {
                selections: output.selection.result.clone(),
                notices: output.selection.notices.clone(),
            },
        )?;
        self.write_json("report.json", &output.selection.report)?;

        let report_path = self.output_dir.join("report.txt");
        fs::write(&report_path, output.selection.report.to_string())?;

        self.write_json("metadata.json", &ExportMetadata::from_output(output, config))?;

        log::info!(
            "Exported {} ATMs and {} selections to {}",
            output.entity_count(),
            output.selection.result.total_selected(),
            self.output_dir.display()
        );
        Ok(())
    }

    /// Export a forecasting run as `forecast_<label>.json`.
    pub fn export_forecasts(&self, label: PreclusterLabel, run: &ForecastRun) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let name = format!("forecast_{label}.json");
        self.write_json(&name, run)?;
        Ok(self.output_dir.join(name))
    }

    /// Export the numeric summary columns as a 2D NumPy array.
    fn export_features(&self, rows: &[ClassifiedSummary]) -> Result<()> {
        let array = summary_features(rows)?;

        let path = self.output_dir.join("summary_features.npy");
        let mut file = File::create(&path)?;
        array
            .write_npy(&mut file)
            .map_err(|e| SegmentationError::Export(format!("failed to write {}: {e}", path.display())))?;

        log::debug!(
            "Exported features: {} [{} ATMs × {} columns]",
            path.display(),
            array.nrows(),
            array.ncols()
        );
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.output_dir.join(name);
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, value)?;
        log::debug!("Exported {}", path.display());
        Ok(())
    }
}

/// `[n_atms, 4]` array of n_observations, median, p95, ratio.
pub fn summary_features(rows: &[ClassifiedSummary]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = rows
        .iter()
        .flat_map(|row| {
            let s = &row.summary;
            [s.n_observations as f64, s.median, s.p95, s.ratio]
        })
        .collect();

    Array2::from_shape_vec((rows.len(), FEATURE_NAMES.len()), flat)
        .map_err(|e| SegmentationError::Export(format!("failed to shape summary array: {e}")))
}

/// Convenience function for direct export.
pub fn export_run<P: AsRef<Path>>(
    output: &PipelineOutput,
    config: &SegmentationConfig,
    output_dir: P,
) -> Result<()> {
    SegmentationExporter::new(output_dir).export(output, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precluster::PreclusterStats;
    use crate::profiling::StructuralSummary;
    use crate::sampling::SelectionOutcome;
    use tempfile::TempDir;

    fn classified(id: &str, n: usize, median: f64, p95: f64) -> ClassifiedSummary {
        ClassifiedSummary::from_summary(
            StructuralSummary::from_stats(id, n, median, p95),
            &PreclusterThresholds::default(),
        )
    }

    fn output() -> PipelineOutput {
        let summaries = vec![
            classified("A", 10, 1000.0, 1500.0),
            classified("B", 8, 0.0, 40.0),
        ];
        PipelineOutput {
            stats: PreclusterStats::from_classified(&summaries),
            summaries,
            selection: SelectionOutcome::default(),
        }
    }

    #[test]
    fn test_summary_features_layout() {
        let array = summary_features(&output().summaries).unwrap();
        assert_eq!(array.shape(), &[2, 4]);
        assert_eq!(array[[0, 0]], 10.0);
        assert_eq!(array[[0, 3]], 1.5);
        assert_eq!(array[[1, 1]], 0.0);
        assert_eq!(array[[1, 3]], 0.0);

        let empty = summary_features(&[]).unwrap();
        assert_eq!(empty.shape(), &[0, 4]);
    }

    #[test]
    fn test_export_writes_all_files() {
        let dir = TempDir::new().unwrap();
        let out_dir = dir.path().join("run");
        let exporter = SegmentationExporter::new(&out_dir);
        exporter
            .export(&output(), &SegmentationConfig::default())
            .unwrap();

        for name in [
            "summary.json",
            "summary_features.npy",
            "selection.json",
            "report.json",
            "report.txt",
            "metadata.json",
        ] {
            assert!(out_dir.join(name).exists(), "{name} should exist");
        }
    }

    #[test]
    fn test_metadata_accuracy() {
        let config = SegmentationConfig::sample();
        let metadata = ExportMetadata::from_output(&output(), &config);
        assert_eq!(metadata.n_entities, 2);
        assert_eq!(metadata.label_counts[&PreclusterLabel::EventDriven], 1);
        assert_eq!(metadata.label_counts[&PreclusterLabel::NormalEstable], 1);
        assert_eq!(metadata.label_counts.len(), 4);
        assert_eq!(metadata.seed, Some(42));
        assert_eq!(metadata.experiment.as_deref(), Some("baseline"));

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"event_driven\":1"));
        assert!(json.contains("\"mode\":\"random\""));
    }

    #[test]
    fn test_metadata_omits_seed_for_deterministic_modes() {
        let mut config = SegmentationConfig::sample();
        config.selection.mode = SelectionMode::HighestMedian;
        let metadata = ExportMetadata::from_output(&output(), &config);
        assert_eq!(metadata.seed, None);

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(!json.contains("\"seed\""));
        let back: ExportMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, None);
    }

    #[test]
    fn test_export_forecasts_file_name() {
        let dir = TempDir::new().unwrap();
        let exporter = SegmentationExporter::new(dir.path());
        let path = exporter
            .export_forecasts(PreclusterLabel::NormalConPicos, &ForecastRun::default())
            .unwrap();
        assert!(path.ends_with("forecast_normal_con_picos.json"));
        assert!(path.exists());
    }
}
