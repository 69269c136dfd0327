//! Segmentation configuration management.
//!
//! One serializable struct holds every parameter of a segmentation run so
//! that a run can be reproduced from a single file.
//!
//! # Features
//!
//! - **Unified Configuration**: thresholds, summary, selection and history in one struct
//! - **Serialization**: save/load configurations to TOML or JSON
//! - **Validation**: loading validates before returning
//!
//! # Example
//!
//! ```ignore
//! use atm_segmentation::config::SegmentationConfig;
//!
//! let config = SegmentationConfig::sample();
//! config.save_toml("segmentation.toml")?;
//!
//! let loaded = SegmentationConfig::load_toml("segmentation.toml")?;
//! let pipeline = SegmentationPipeline::from_config(loaded)?;
//! ```

use crate::error::{Result, SegmentationError};
use crate::history::HistoryConfig;
use crate::precluster::PreclusterThresholds;
use crate::profiling::ColumnMapping;
use crate::sampling::{SelectionMode, SelectionRequest, DEFAULT_SEED};
use std::fs;
use std::path::{Path, PathBuf};

/// Unified segmentation configuration.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SegmentationConfig {
    /// Classification thresholds
    #[serde(default)]
    pub thresholds: PreclusterThresholds,

    /// Structural summary options
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Quota selection options
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Forecasting hand-off requirements
    #[serde(default)]
    pub history: HistoryConfig,

    /// Input/output locations (used by the command-line tool)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataPathConfig>,

    /// Experiment metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExperimentMetadata>,
}

/// Structural summary options.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SummaryConfig {
    /// Reduce groups and classify on the rayon pool
    #[serde(default)]
    pub parallel: bool,
}

/// Quota selection options.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SelectionConfig {
    /// Selection policy
    #[serde(default)]
    pub mode: SelectionMode,

    /// Seed for random mode
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Ordered per-label requested counts
    #[serde(default)]
    pub quotas: SelectionRequest,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::default(),
            seed: DEFAULT_SEED,
            quotas: SelectionRequest::new(),
        }
    }
}

/// Input table and output directory.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataPathConfig {
    /// Observation table (`.csv` or `.json`)
    pub input: PathBuf,

    /// Directory receiving exported artifacts
    pub output_dir: PathBuf,

    /// CSV column names, defaults to `cajero,fecha,retiro`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnMapping>,
}

/// Experiment metadata for tracking and reproducibility.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExperimentMetadata {
    /// Experiment name
    pub name: String,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Version or git commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Custom tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ExperimentMetadata {
    /// Metadata with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
            tags: None,
        }
    }
}

impl SegmentationConfig {
    /// Create default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration written by `segment_atms --generate-config`.
    pub fn sample() -> Self {
        Self {
            selection: SelectionConfig {
                quotas: SelectionRequest::new()
                    .with("normal_estable", 40)
                    .with("normal_con_picos", 20)
                    .with("event_driven", 20)
                    .with("grande_y_estable", 20),
                ..Default::default()
            },
            data: Some(DataPathConfig {
                input: PathBuf::from("insumos/df_general.csv"),
                output_dir: PathBuf::from("output"),
                columns: None,
            }),
            metadata: Some(ExperimentMetadata::named("baseline")),
            ..Default::default()
        }
    }

    /// Set experiment metadata.
    pub fn with_metadata(mut self, metadata: ExperimentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set thresholds.
    pub fn with_thresholds(mut self, thresholds: PreclusterThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the selection options.
    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    /// Set the data paths.
    pub fn with_data(mut self, data: DataPathConfig) -> Self {
        self.data = Some(data);
        self
    }

    /// Validate the configuration.
    ///
    /// Unknown quota labels are not checked here; they surface as
    /// [`SegmentationError::InvalidLabel`] at selection time.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.history.validate().map_err(SegmentationError::config)?;

        let duplicates = self.selection.quotas.duplicate_labels();
        if !duplicates.is_empty() {
            return Err(SegmentationError::config(format!(
                "selection.quotas lists labels more than once: {}",
                duplicates.join(", ")
            )));
        }

        if let Some(data) = &self.data {
            if data.input.as_os_str().is_empty() {
                return Err(SegmentationError::config("data.input must not be empty"));
            }
            if data.output_dir.as_os_str().is_empty() {
                return Err(SegmentationError::config("data.output_dir must not be empty"));
            }
        }

        Ok(())
    }

    /// Save configuration to TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load configuration from TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SegmentationConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Load configuration from JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: SegmentationConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}
