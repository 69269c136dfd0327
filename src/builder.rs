//! Fluent builder for segmentation configuration.
//!
//! # Quick Start
//!
//! ```ignore
//! use atm_segmentation::PipelineBuilder;
//!
//! let pipeline = PipelineBuilder::new()
//!     .quota("normal_estable", 40)
//!     .quota("event_driven", 20)
//!     .build()?;
//!
//! let output = pipeline.run(&observations)?;
//! ```
//!
//! # Defaults
//!
//! | Setting | Default |
//! |---------|---------|
//! | `grande` | 200 000 |
//! | `estable` | 3 |
//! | `evento` | 8 |
//! | `picos` | 5 |
//! | mode | `random` |
//! | seed | 42 |
//! | min history | 150 days |
//! | horizon | 30 days |
//!
//! ## Deterministic selection
//!
//! ```ignore
//! let pipeline = PipelineBuilder::new()
//!     .mode(SelectionMode::HighestRatio)
//!     .quota("normal_con_picos", 10)
//!     .build()?;
//! ```

use crate::config::{
    DataPathConfig, ExperimentMetadata, SegmentationConfig, SelectionConfig, SummaryConfig,
};
use crate::error::Result;
use crate::history::HistoryConfig;
use crate::pipeline::SegmentationPipeline;
use crate::precluster::PreclusterThresholds;
use crate::sampling::{SelectionMode, SelectionRequest, DEFAULT_SEED};
use std::path::PathBuf;

/// Fluent builder for [`SegmentationPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    thresholds: PreclusterThresholds,
    parallel: bool,
    mode: SelectionMode,
    seed: u64,
    quotas: SelectionRequest,
    history: HistoryConfig,
    data: Option<DataPathConfig>,
    metadata: Option<ExperimentMetadata>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a new pipeline builder with default settings.
    pub fn new() -> Self {
        Self {
            thresholds: PreclusterThresholds::default(),
            parallel: false,
            mode: SelectionMode::default(),
            seed: DEFAULT_SEED,
            quotas: SelectionRequest::new(),
            history: HistoryConfig::primary(),
            data: None,
            metadata: None,
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SegmentationConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            parallel: config.summary.parallel,
            mode: config.selection.mode,
            seed: config.selection.seed,
            quotas: config.selection.quotas,
            history: config.history,
            data: config.data,
            metadata: config.metadata,
        }
    }

    // =========================================================================
    // Thresholds
    // =========================================================================

    /// Replace all four thresholds.
    pub fn thresholds(mut self, thresholds: PreclusterThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Median at or above which an ATM counts as large.
    pub fn grande(mut self, value: f64) -> Self {
        self.thresholds.grande = value;
        self
    }

    /// Maximum ratio for a large ATM to count as stable.
    pub fn estable(mut self, value: f64) -> Self {
        self.thresholds.estable = value;
        self
    }

    /// Ratio at or above which an ATM is event driven.
    pub fn evento(mut self, value: f64) -> Self {
        self.thresholds.evento = value;
        self
    }

    /// Ratio at or above which an ATM is spiky.
    pub fn picos(mut self, value: f64) -> Self {
        self.thresholds.picos = value;
        self
    }

    /// Run the summary and classification on the rayon pool.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Selection policy.
    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Seed for random mode.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Request `count` ATMs of `label`. Repeating a label replaces its count.
    pub fn quota(mut self, label: &str, count: usize) -> Self {
        self.quotas.insert(label, count);
        self
    }

    /// Replace the whole request.
    pub fn quotas(mut self, request: SelectionRequest) -> Self {
        self.quotas = request;
        self
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Minimum history for the forecasting hand-off.
    pub fn min_history(mut self, days: usize) -> Self {
        self.history.min_observations = days;
        self
    }

    /// Use the legacy 30-day minimum.
    pub fn legacy_history(mut self) -> Self {
        self.history.min_observations = HistoryConfig::legacy().min_observations;
        self
    }

    /// Forecast horizon in days.
    pub fn horizon(mut self, days: usize) -> Self {
        self.history.horizon = days;
        self
    }

    // =========================================================================
    // Data & Metadata
    // =========================================================================

    /// Input table and output directory.
    pub fn data(mut self, input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.data = Some(DataPathConfig {
            input: input.into(),
            output_dir: output_dir.into(),
            columns: None,
        });
        self
    }

    /// Set experiment name and description.
    pub fn experiment(mut self, name: &str, description: &str) -> Self {
        self.metadata = Some(ExperimentMetadata {
            name: name.to_string(),
            description: Some(description.to_string()),
            version: None,
            tags: None,
        });
        self
    }

    /// Set experiment metadata with full control.
    pub fn with_metadata(mut self, metadata: ExperimentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Build and validate the configuration.
    pub fn build_config(self) -> Result<SegmentationConfig> {
        let config = SegmentationConfig {
            thresholds: self.thresholds,
            summary: SummaryConfig {
                parallel: self.parallel,
            },
            selection: SelectionConfig {
                mode: self.mode,
                seed: self.seed,
                quotas: self.quotas,
            },
            history: self.history,
            data: self.data,
            metadata: self.metadata,
        };

        config.validate()?;
        Ok(config)
    }

    /// Build a ready-to-use pipeline.
    pub fn build(self) -> Result<SegmentationPipeline> {
        SegmentationPipeline::from_config(self.build_config()?)
    }

    /// Get a summary of the current configuration.
    pub fn summary(&self) -> String {
        let quotas: Vec<String> = self
            .quotas
            .entries()
            .iter()
            .map(|e| format!("{}={}", e.label, e.count))
            .collect();

        format!(
            "PipelineBuilder Summary:\n\
             - Thresholds: grande={} estable={} evento={} picos={}\n\
             - Selection: {} (seed {})\n\
             - Quotas: {}\n\
             - History: >= {} days, horizon {}\n\
             - Parallel: {}",
            self.thresholds.grande,
            self.thresholds.estable,
            self.thresholds.evento,
            self.thresholds.picos,
            self.mode,
            self.seed,
            if quotas.is_empty() {
                "none".to_string()
            } else {
                quotas.join(", ")
            },
            self.history.min_observations,
            self.history.horizon,
            self.parallel,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let config = PipelineBuilder::new().build_config().unwrap();
        assert_eq!(config, SegmentationConfig::default());
    }

    #[test]
    fn test_builder_thresholds() {
        let config = PipelineBuilder::new()
            .grande(100_000.0)
            .estable(2.5)
            .evento(9.0)
            .picos(4.0)
            .build_config()
            .unwrap();
        assert_eq!(
            config.thresholds,
            PreclusterThresholds::new(100_000.0, 2.5, 9.0, 4.0)
        );
    }

    #[test]
    fn test_builder_rejects_bad_threshold() {
        assert!(PipelineBuilder::new().evento(0.0).build().is_err());
    }

    #[test]
    fn test_builder_quotas_keep_order_and_replace() {
        let config = PipelineBuilder::new()
            .quota("event_driven", 2)
            .quota("normal_estable", 3)
            .quota("event_driven", 5)
            .build_config()
            .unwrap();
        let labels: Vec<&str> = config
            .selection
            .quotas
            .entries()
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, vec!["event_driven", "normal_estable"]);
        assert_eq!(config.selection.quotas.total_requested(), 8);
    }

    #[test]
    fn test_builder_selection_and_history() {
        let config = PipelineBuilder::new()
            .mode(SelectionMode::HighestMedian)
            .seed(7)
            .legacy_history()
            .horizon(14)
            .parallel(true)
            .build_config()
            .unwrap();
        assert_eq!(config.selection.mode, SelectionMode::HighestMedian);
        assert_eq!(config.selection.seed, 7);
        assert_eq!(config.history.min_observations, 30);
        assert_eq!(config.history.horizon, 14);
        assert!(config.summary.parallel);
    }

    #[test]
    fn test_builder_round_trips_config() {
        let original = SegmentationConfig::sample();
        let rebuilt = PipelineBuilder::from_config(original.clone())
            .build_config()
            .unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_builder_summary() {
        let builder = PipelineBuilder::new()
            .quota("event_driven", 2)
            .experiment("trial", "short run");
        let summary = builder.summary();
        assert!(summary.contains("event_driven=2"));
        assert!(summary.contains("random (seed 42)"));
        assert!(builder.build().is_ok());
    }
}
