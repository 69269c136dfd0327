//! Quota sampling of classified ATMs.
//!
//! Given a classified table and a per-label requested count, the
//! [`QuotaSampler`] selects ATMs per precluster under one of three policies
//! and reports what was actually selected.
//!
//! # Selection Modes
//!
//! - **Random**: uniform sample without replacement, driven by an explicit
//!   seed (same seed + same rows ⇒ same selection)
//! - **HighestRatio**: the `n` rows with the largest p95/median ratio
//! - **HighestMedian**: the `n` rows with the largest median
//!
//! Deterministic modes use a stable descending sort, so ties keep the
//! original row order.
//!
//! # Soft Conditions
//!
//! Requests above availability are clamped, and in the multi-label form
//! labels without ATMs are skipped. Both produce a [`SelectionNotice`] that
//! is logged and returned to the caller; neither aborts the call.
//!
//! # Reporting
//!
//! Each processed label gets a [`ReportRow`] whose percentage is computed
//! against the sum of the *originally requested* counts, fixed before any
//! clamping. After clamping, percentages need not sum to 100.
//!
//! # Example
//!
//! ```ignore
//! use atm_segmentation::sampling::{QuotaSampler, SelectionMode, SelectionRequest};
//!
//! let request = SelectionRequest::new()
//!     .with("normal_estable", 40)
//!     .with("event_driven", 20);
//!
//! let sampler = QuotaSampler::new(SelectionMode::Random, 42);
//! let outcome = sampler.select_multi(&classified, &request)?;
//! println!("{}", outcome.report);
//! ```

pub mod quota;

pub use quota::{select, select_multi, QuotaSampler, DEFAULT_SEED};

use crate::error::{Result, SegmentationError};
use crate::precluster::PreclusterLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Selection Mode
// ============================================================================

/// Selection policy applied within one precluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SelectionMode {
    /// Seeded uniform sample without replacement
    #[default]
    Random,

    /// Largest p95/median ratio first
    HighestRatio,

    /// Largest median first
    HighestMedian,
}

impl SelectionMode {
    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            SelectionMode::Random => "random",
            SelectionMode::HighestRatio => "highest_ratio",
            SelectionMode::HighestMedian => "highest_median",
        }
    }

    /// Whether the selection depends on the seed.
    pub fn is_randomized(&self) -> bool {
        matches!(self, SelectionMode::Random)
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SelectionMode {
    type Err = SegmentationError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "random" | "aleatorio" => Ok(SelectionMode::Random),
            "highest_ratio" | "mayor_ratio" => Ok(SelectionMode::HighestRatio),
            "highest_median" | "mayor_mediana" => Ok(SelectionMode::HighestMedian),
            _ => Err(SegmentationError::InvalidMode(raw.to_string())),
        }
    }
}

impl TryFrom<String> for SelectionMode {
    type Error = SegmentationError;

    fn try_from(raw: String) -> Result<Self> {
        raw.parse()
    }
}

impl From<SelectionMode> for String {
    fn from(mode: SelectionMode) -> Self {
        mode.name().to_string()
    }
}

// ============================================================================
// Request
// ============================================================================

/// Requested count for one label.
///
/// The label is kept as text so that an unknown name surfaces as
/// [`SegmentationError::InvalidLabel`] at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEntry {
    /// Precluster label name
    pub label: String,

    /// Number of ATMs requested
    pub count: usize,
}

/// Ordered mapping from label to requested count.
///
/// Entry order is the processing and reporting order. Inserting an existing
/// label replaces its count in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionRequest {
    entries: Vec<QuotaEntry>,
}

impl SelectionRequest {
    /// Empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, label: impl Into<String>, count: usize) -> Self {
        self.insert(label, count);
        self
    }

    /// Set the count for a label.
    pub fn insert(&mut self, label: impl Into<String>, count: usize) {
        let label = label.into();
        match self.entries.iter_mut().find(|e| e.label == label) {
            Some(entry) => entry.count = count,
            None => self.entries.push(QuotaEntry { label, count }),
        }
    }

    /// Entries in request order.
    pub fn entries(&self) -> &[QuotaEntry] {
        &self.entries
    }

    /// Sum of requested counts, before any clamping. Saturates at `usize::MAX`.
    pub fn total_requested(&self) -> usize {
        self.entries
            .iter()
            .fold(0usize, |total, e| total.saturating_add(e.count))
    }

    /// Number of labels in the request.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no label is requested.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels that appear more than once (possible only via deserialization).
    pub fn duplicate_labels(&self) -> Vec<&str> {
        let mut dups: Vec<&str> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let repeated = self.entries[..i].iter().any(|e| e.label == entry.label);
            if repeated && !dups.contains(&entry.label.as_str()) {
                dups.push(&entry.label);
            }
        }
        dups
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for SelectionRequest {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut request = SelectionRequest::new();
        for (label, count) in iter {
            request.insert(label, count);
        }
        request
    }
}

// ============================================================================
// Notices
// ============================================================================

/// Non-fatal condition raised while selecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionNotice {
    /// Request exceeded availability; all available ATMs were selected.
    Clamped {
        label: PreclusterLabel,
        requested: usize,
        available: usize,
    },

    /// Label had no ATMs and was left out of the result.
    SkippedEmpty {
        label: PreclusterLabel,
        requested: usize,
    },
}

impl SelectionNotice {
    /// Label the notice refers to.
    pub fn label(&self) -> PreclusterLabel {
        match self {
            SelectionNotice::Clamped { label, .. } | SelectionNotice::SkippedEmpty { label, .. } => {
                *label
            }
        }
    }
}

impl fmt::Display for SelectionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionNotice::Clamped {
                label,
                requested,
                available,
            } => write!(
                f,
                "{label}: only {available} ATMs available, requested {requested}; selecting all"
            ),
            SelectionNotice::SkippedEmpty { label, requested } => {
                write!(f, "{label}: no ATMs available (requested {requested}); skipped")
            }
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Selection for one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelection {
    /// Precluster label
    pub label: PreclusterLabel,

    /// Originally requested count
    pub requested: usize,

    /// ATMs available with this label
    pub available: usize,

    /// Selected ATM ids, in selection order
    pub entity_ids: Vec<String>,
}

impl LabelSelection {
    /// Number of ATMs actually selected.
    pub fn selected(&self) -> usize {
        self.entity_ids.len()
    }

    /// Whether the request was reduced to availability.
    pub fn was_clamped(&self) -> bool {
        self.requested > self.available
    }
}

/// Per-label selections in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    selections: Vec<LabelSelection>,
}

impl SelectionResult {
    /// Selected ids for a label, if it was processed.
    pub fn get(&self, label: PreclusterLabel) -> Option<&[String]> {
        self.selections
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.entity_ids.as_slice())
    }

    /// Whether the label was processed.
    pub fn contains(&self, label: PreclusterLabel) -> bool {
        self.get(label).is_some()
    }

    /// Processed labels in request order.
    pub fn labels(&self) -> Vec<PreclusterLabel> {
        self.selections.iter().map(|s| s.label).collect()
    }

    /// Iterate over per-label selections.
    pub fn iter(&self) -> impl Iterator<Item = &LabelSelection> {
        self.selections.iter()
    }

    /// Total ATMs selected across labels.
    pub fn total_selected(&self) -> usize {
        self.selections.iter().map(|s| s.selected()).sum()
    }

    /// Number of processed labels.
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    /// True when no label was processed.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// `{label → ids}` view handed to the forecasting side.
    pub fn to_map(&self) -> BTreeMap<PreclusterLabel, Vec<String>> {
        self.selections
            .iter()
            .map(|s| (s.label, s.entity_ids.clone()))
            .collect()
    }

    pub(crate) fn push(&mut self, selection: LabelSelection) {
        self.selections.push(selection);
    }
}

/// One row of the selection report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Precluster label
    pub label: PreclusterLabel,

    /// Share of the original request total, in percent (unrounded)
    pub percentage: f64,

    /// ATMs actually selected
    pub n_selected: usize,
}

impl ReportRow {
    /// Build a row; a zero request total reports 0%.
    pub fn new(label: PreclusterLabel, n_selected: usize, total_requested: usize) -> Self {
        let percentage = if total_requested == 0 {
            0.0
        } else {
            n_selected as f64 / total_requested as f64 * 100.0
        };
        Self {
            label,
            percentage,
            n_selected,
        }
    }

    /// Percentage rounded to two decimals.
    pub fn percentage_rounded(&self) -> f64 {
        (self.percentage * 100.0).round() / 100.0
    }
}

/// Reporting summary of a multi-label selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    /// Sum of the requested counts before clamping
    pub total_requested: usize,

    /// One row per processed label
    pub rows: Vec<ReportRow>,
}

impl SelectionReport {
    /// Empty report for a request total.
    pub fn new(total_requested: usize) -> Self {
        Self {
            total_requested,
            rows: Vec::new(),
        }
    }

    /// Sum of reported percentages (100 only if nothing was clamped or skipped).
    pub fn total_percentage(&self) -> f64 {
        self.rows.iter().map(|r| r.percentage).sum()
    }

    /// Row for a label.
    pub fn row(&self, label: PreclusterLabel) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.label == label)
    }
}

impl fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20} {:>15} {:>10}", "Pre-cluster", "Percentage (%)", "Count (n)")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<20} {:>15.2} {:>10}",
                row.label.name().to_uppercase(),
                row.percentage_rounded(),
                row.n_selected
            )?;
        }
        Ok(())
    }
}

/// Everything produced by a multi-label selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// Per-label selections
    pub result: SelectionResult,

    /// Reporting table
    pub report: SelectionReport,

    /// Clamp and skip notices, in processing order
    pub notices: Vec<SelectionNotice>,
}

// ============================================================================
// Unit Tests
// ============================================================================
