//! Error types for the segmentation pipeline.
//!
//! Structural computation (summary, classification) never fails on
//! well-formed numeric input. The contract violations live in the sampling
//! stage (`InvalidLabel`, `InvalidMode`, `EmptyCluster`); the remaining
//! variants cover configuration, input loading and export.
//!
//! Requesting more entities than a precluster holds is not an error: the
//! request is clamped and a [`SelectionNotice`](crate::sampling::SelectionNotice)
//! is returned instead.

use crate::precluster::PreclusterLabel;

/// Errors produced by the segmentation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    /// Requested label is not one of the four precluster categories.
    #[error(
        "invalid precluster label '{0}'; expected one of: event_driven, grande_y_estable, normal_con_picos, normal_estable"
    )]
    InvalidLabel(String),

    /// Selection mode string was not recognized.
    #[error("invalid selection mode '{0}'; expected one of: random, highest_ratio, highest_median")]
    InvalidMode(String),

    /// Single-label selection against a precluster with no entities.
    #[error("no entities available in precluster '{0}'")]
    EmptyCluster(PreclusterLabel),

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed or rejected observation input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// Failure while writing array outputs.
    #[error("export failed: {0}")]
    Export(String),
}

impl SegmentationError {
    /// Shorthand for [`SegmentationError::InvalidConfig`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Shorthand for [`SegmentationError::InvalidInput`].
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for the caller contract violations of the sampling stage.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::InvalidLabel(_) | Self::InvalidMode(_))
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SegmentationError>;
