//! Unified Pipeline for ATM Segmentation
//!
//! Connects the stages of a segmentation run:
//! - Input validation
//! - Structural summary (per-ATM median, p95, ratio)
//! - Precluster classification
//! - Quota sampling with a reporting table
//! - History preparation for the forecasting hand-off
//!
//! # Architecture
//!
//! ```text
//! Observations ─► ObservationValidator ─► StructuralSummaryBuilder ─► Vec<StructuralSummary>
//!                     (errors abort)                                         │
//!                                                                            ▼
//!                                         PreclusterClassifier::classify_all ─► Vec<ClassifiedSummary>
//!                                                                            │
//!                                                                            ▼
//!                                              QuotaSampler::select_multi ─► SelectionOutcome
//!                                                                            │
//!                                                   HistoryIndex + Forecaster ─► ForecastRun
//! ```
//!
//! Every stage is a pure function of its inputs and the configuration, so
//! two runs with the same observations and config produce the same output.
//!
//! # Example
//!
//! ```ignore
//! use atm_segmentation::prelude::*;
//!
//! let pipeline = PipelineBuilder::new()
//!     .quota("normal_estable", 40)
//!     .quota("event_driven", 20)
//!     .build()?;
//!
//! let output = pipeline.run(&observations)?;
//! println!("{}", output.selection.report);
//! ```
//!
//! # Output Structure
//!
//! | Field | Type | Description |
//! |-------|------|-------------|
//! | `summaries` | `Vec<ClassifiedSummary>` | One row per ATM, sorted by id |
//! | `stats` | `PreclusterStats` | ATM counts per label |
//! | `selection` | `SelectionOutcome` | Selected ids, report, notices |

use crate::{
    config::SegmentationConfig,
    error::{Result, SegmentationError},
    history::{forecast_selection, Forecaster, ForecastRun, HistoryIndex},
    precluster::{ClassifiedSummary, PreclusterClassifier, PreclusterLabel, PreclusterStats},
    profiling::{count_entities, Observation, StructuralSummaryBuilder},
    sampling::{QuotaSampler, SelectionOutcome, SelectionRequest},
    validation::{validate_thresholds, ObservationValidator, ValidationResult},
};

/// Output from a full segmentation run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineOutput {
    /// Classified structural summary, one row per ATM
    pub summaries: Vec<ClassifiedSummary>,

    /// ATM counts per label
    pub stats: PreclusterStats,

    /// Quota selection outcome
    pub selection: SelectionOutcome,
}

impl PipelineOutput {
    /// Ids selected for a label, empty if the label was not processed.
    pub fn selected_ids(&self, label: PreclusterLabel) -> &[String] {
        self.selection.result.get(label).unwrap_or(&[])
    }

    /// Classified row of an ATM.
    pub fn summary_for(&self, entity_id: &str) -> Option<&ClassifiedSummary> {
        self.summaries
            .binary_search_by(|row| row.entity_id().cmp(entity_id))
            .ok()
            .map(|idx| &self.summaries[idx])
    }

    /// Number of profiled ATMs.
    pub fn entity_count(&self) -> usize {
        self.summaries.len()
    }
}

/// Segmentation pipeline assembled from a [`SegmentationConfig`].
#[derive(Debug, Clone)]
pub struct SegmentationPipeline {
    config: SegmentationConfig,
    summary_builder: StructuralSummaryBuilder,
    classifier: PreclusterClassifier,
    sampler: QuotaSampler,
    validator: ObservationValidator,
}

impl SegmentationPipeline {
    /// Create a pipeline from a validated configuration.
    pub fn from_config(config: SegmentationConfig) -> Result<Self> {
        config.validate()?;

        for warning in validate_thresholds(&config.thresholds).warnings() {
            log::warn!("{warning}");
        }

        let parallel = config.summary.parallel;
        let classifier = PreclusterClassifier::new(config.thresholds)?.with_parallel(parallel);
        let sampler = QuotaSampler::new(config.selection.mode, config.selection.seed);

        Ok(Self {
            summary_builder: StructuralSummaryBuilder::new().with_parallel(parallel),
            classifier,
            sampler,
            validator: ObservationValidator::new(),
            config,
        })
    }

    /// Check an observation table, rejecting it on validation errors.
    ///
    /// Warnings are logged and returned with the result.
    pub fn validate_input(&self, observations: &[Observation]) -> Result<ValidationResult> {
        let result = self.validator.validate_observations(observations);

        if result.has_errors() {
            return Err(SegmentationError::input(result.errors().join("; ")));
        }
        for warning in result.warnings() {
            log::warn!("{warning}");
        }

        Ok(result)
    }

    /// Validate, summarize and classify an observation table.
    pub fn profile(&self, observations: &[Observation]) -> Result<Vec<ClassifiedSummary>> {
        self.validate_input(observations)?;

        log::info!(
            "Profiling {} observations across {} ATMs",
            observations.len(),
            count_entities(observations)
        );

        let summaries = self.summary_builder.build(observations);
        Ok(self.classifier.classify_all(summaries))
    }

    /// Select from a classified table with the configured quotas.
    pub fn select(&self, classified: &[ClassifiedSummary]) -> Result<SelectionOutcome> {
        self.select_with(classified, &self.config.selection.quotas)
    }

    /// Select from a classified table with an explicit request.
    pub fn select_with(
        &self,
        classified: &[ClassifiedSummary],
        request: &SelectionRequest,
    ) -> Result<SelectionOutcome> {
        self.sampler.select_multi(classified, request)
    }

    /// Run profiling, classification and selection end to end.
    pub fn run(&self, observations: &[Observation]) -> Result<PipelineOutput> {
        let summaries = self.profile(observations)?;
        let stats = PreclusterStats::from_classified(&summaries);
        log::info!("Classified {stats}");

        let selection = self.select(&summaries)?;

        Ok(PipelineOutput {
            summaries,
            stats,
            selection,
        })
    }

    /// Forecast the ATMs selected for one label.
    ///
    /// `index` should be built once per observation table with
    /// [`HistoryIndex::new`] and reused across labels.
    pub fn forecast_label<F: Forecaster + ?Sized>(
        &self,
        output: &PipelineOutput,
        label: PreclusterLabel,
        index: &HistoryIndex,
        forecaster: &F,
    ) -> ForecastRun {
        let ids = output.selected_ids(label);
        log::info!("Forecasting {} ATMs selected for {label}", ids.len());
        forecast_selection(ids, index, forecaster, &self.config.history)
    }

    /// Get the pipeline configuration.
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Get the sampler built from the configuration.
    pub fn sampler(&self) -> &QuotaSampler {
        &self.sampler
    }
}
