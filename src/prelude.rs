//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```ignore
//! use atm_segmentation::prelude::*;
//!
//! let pipeline = PipelineBuilder::new().quota("event_driven", 10).build()?;
//! let output = pipeline.run(&observations)?;
//! ```
//!
//! # What's Included
//!
//! ## Core Pipeline
//! - [`SegmentationPipeline`] - End-to-end run
//! - [`PipelineBuilder`] - Fluent configuration
//! - [`SegmentationConfig`] - Serializable configuration
//! - [`PipelineOutput`] - Run output container
//!
//! ## Stages
//! - [`Observation`], [`ObservationLoader`] - Input rows and loading
//! - [`StructuralSummary`] - Per-ATM statistics
//! - [`PreclusterLabel`], [`PreclusterThresholds`] - Classification
//! - [`QuotaSampler`], [`SelectionMode`], [`SelectionRequest`] - Sampling
//! - [`HistoryIndex`], [`Forecaster`] - Forecasting hand-off
//!
//! ## Export & Validation
//! - [`SegmentationExporter`] - JSON / NumPy artifacts
//! - [`ObservationValidator`] - Input checks

pub use crate::builder::PipelineBuilder;
pub use crate::config::{ExperimentMetadata, SegmentationConfig};
pub use crate::error::{Result, SegmentationError};
pub use crate::export::SegmentationExporter;
pub use crate::history::{
    forecast_selection, EntityHistory, ForecastPoint, ForecastRun, Forecaster, HistoryConfig,
    HistoryIndex,
};
pub use crate::pipeline::{PipelineOutput, SegmentationPipeline};
pub use crate::precluster::{
    classify, ClassifiedSummary, PreclusterClassifier, PreclusterLabel, PreclusterStats,
    PreclusterThresholds,
};
pub use crate::profiling::{
    build_summary, ColumnMapping, Observation, ObservationLoader, StructuralSummary,
    StructuralSummaryBuilder,
};
pub use crate::sampling::{
    QuotaSampler, SelectionMode, SelectionNotice, SelectionOutcome, SelectionReport,
    SelectionRequest, SelectionResult,
};
pub use crate::validation::{ObservationValidator, ValidationResult};
