//! ATM Segmentation
//!
//! Structural profiling, precluster classification and quota sampling of ATM
//! withdrawal histories.
//!
//! # Overview
//!
//! The library reduces a table of daily withdrawals to one structural row
//! per ATM, assigns each ATM one of four behavioral categories, and draws a
//! per-category sample that feeds a downstream forecasting model:
//!
//! - **event_driven**: zero typical demand or very high p95/median ratio
//! - **grande_y_estable**: high volume with low volatility
//! - **normal_con_picos**: regular demand with spikes
//! - **normal_estable**: regular, stable demand
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ATM Segmentation                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  profiling/   - Observation loading and structural summary      │
//! │  precluster/  - Threshold rules and label statistics            │
//! │  sampling/    - Quota selection and reporting table             │
//! │  history      - Per-ATM history and forecasting hand-off        │
//! │  validation   - Input and threshold checks                      │
//! │  export/      - JSON / NumPy artifacts                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use atm_segmentation::prelude::*;
//!
//! let observations = ObservationLoader::new().load("insumos/df_general.csv")?;
//! let pipeline = PipelineBuilder::new()
//!     .quota("normal_estable", 40)
//!     .quota("event_driven", 20)
//!     .build()?;
//!
//! let output = pipeline.run(&observations)?;
//! println!("{}", output.selection.report);
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod pipeline;
pub mod precluster;
pub mod prelude;
pub mod profiling;
pub mod sampling;
pub mod validation;

// Re-exports - Errors
pub use error::{Result, SegmentationError};

// Re-exports - Config
pub use config::{
    DataPathConfig, ExperimentMetadata, SegmentationConfig, SelectionConfig, SummaryConfig,
};

// Re-exports - Profiling
pub use profiling::{
    build_summary, ColumnMapping, Observation, ObservationLoader, StructuralSummary,
    StructuralSummaryBuilder,
};

// Re-exports - Classification
pub use precluster::{
    classify, ClassifiedSummary, PreclusterClassifier, PreclusterLabel, PreclusterStats,
    PreclusterThresholds,
};

// Re-exports - Sampling
pub use sampling::{
    select, select_multi, QuotaSampler, SelectionMode, SelectionNotice, SelectionOutcome,
    SelectionReport, SelectionRequest, SelectionResult,
};

// Re-exports - History
pub use history::{
    forecast_selection, EntityHistory, ForecastPoint, ForecastRun, Forecaster, HistoryConfig,
    HistoryIndex,
};

// Re-exports - Export
pub use export::{export_run, ExportMetadata, SegmentationExporter};

// Re-exports - Validation
pub use validation::{ObservationValidator, ValidationLevel, ValidationResult};

pub use builder::PipelineBuilder;
pub use pipeline::{PipelineOutput, SegmentationPipeline};
