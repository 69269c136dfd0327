//! Precluster classification of ATM structural summaries.
//!
//! Each [`StructuralSummary`] is assigned exactly one of four behavioral
//! categories by ordered threshold rules. Classification is a pure, total
//! function of `(median, ratio, thresholds)`: no randomness, no history and
//! no "unclassified" outcome.
//!
//! # Rules
//!
//! Evaluated top to bottom, first match wins:
//!
//! | # | Condition | Label |
//! |---|-----------|-------|
//! | 1 | `median == 0` | `event_driven` |
//! | 2 | `median >= grande && ratio <= estable` | `grande_y_estable` |
//! | 3 | `ratio >= evento` | `event_driven` |
//! | 4 | `ratio >= picos` | `normal_con_picos` |
//! | 5 | otherwise | `normal_estable` |
//!
//! Rule 2 runs before the generic ratio checks so that a large, stable ATM
//! with a moderately high ratio is not labeled spiky. With
//! `estable < evento` (true for the defaults 3 < 8) rules 2 and 3 can never
//! both hold for the same row.
//!
//! # Example
//!
//! ```
//! use atm_segmentation::precluster::{classify, PreclusterLabel, PreclusterThresholds};
//!
//! let thresholds = PreclusterThresholds::default();
//! assert_eq!(classify(250_000.0, 2.0, &thresholds), PreclusterLabel::GrandeYEstable);
//! assert_eq!(classify(500.0, 10.0, &thresholds), PreclusterLabel::EventDriven);
//! assert_eq!(classify(500.0, 6.0, &thresholds), PreclusterLabel::NormalConPicos);
//! assert_eq!(classify(0.0, 0.0, &thresholds), PreclusterLabel::EventDriven);
//! ```

use crate::error::{Result, SegmentationError};
use crate::profiling::StructuralSummary;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Labels
// ============================================================================

/// Behavioral category of an ATM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreclusterLabel {
    /// Volatility-dominated demand: zero typical demand or very high p95/median
    EventDriven,

    /// High-volume ATM with low volatility
    GrandeYEstable,

    /// Regular demand with noticeable spikes
    NormalConPicos,

    /// Regular, stable demand
    NormalEstable,
}

impl PreclusterLabel {
    /// All labels in canonical order.
    pub const ALL: [PreclusterLabel; 4] = [
        PreclusterLabel::EventDriven,
        PreclusterLabel::GrandeYEstable,
        PreclusterLabel::NormalConPicos,
        PreclusterLabel::NormalEstable,
    ];

    /// Canonical snake_case name.
    pub fn name(&self) -> &'static str {
        match self {
            PreclusterLabel::EventDriven => "event_driven",
            PreclusterLabel::GrandeYEstable => "grande_y_estable",
            PreclusterLabel::NormalConPicos => "normal_con_picos",
            PreclusterLabel::NormalEstable => "normal_estable",
        }
    }

    /// Index into [`PreclusterLabel::ALL`].
    #[inline]
    pub fn as_index(&self) -> usize {
        match self {
            PreclusterLabel::EventDriven => 0,
            PreclusterLabel::GrandeYEstable => 1,
            PreclusterLabel::NormalConPicos => 2,
            PreclusterLabel::NormalEstable => 3,
        }
    }
}

impl std::fmt::Display for PreclusterLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PreclusterLabel {
    type Err = SegmentationError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "event_driven" => Ok(PreclusterLabel::EventDriven),
            "grande_y_estable" => Ok(PreclusterLabel::GrandeYEstable),
            "normal_con_picos" => Ok(PreclusterLabel::NormalConPicos),
            "normal_estable" => Ok(PreclusterLabel::NormalEstable),
            _ => Err(SegmentationError::InvalidLabel(raw.to_string())),
        }
    }
}

// ============================================================================
// Thresholds
// ============================================================================

/// Default median threshold for the large-ATM category.
pub const DEFAULT_GRANDE: f64 = 200_000.0;
/// Default maximum ratio for the large-and-stable category.
pub const DEFAULT_ESTABLE: f64 = 3.0;
/// Default minimum ratio for the event-driven category.
pub const DEFAULT_EVENTO: f64 = 8.0;
/// Default minimum ratio for the spiky category.
pub const DEFAULT_PICOS: f64 = 5.0;

/// Classification thresholds.
///
/// All four values must be positive and finite. Instances are plain values;
/// the classifier never mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreclusterThresholds {
    /// Median at or above which an ATM counts as large
    pub grande: f64,

    /// Maximum ratio for a large ATM to count as stable
    pub estable: f64,

    /// Ratio at or above which an ATM is event driven
    pub evento: f64,

    /// Ratio at or above which an ATM is spiky
    pub picos: f64,
}

impl Default for PreclusterThresholds {
    fn default() -> Self {
        Self {
            grande: DEFAULT_GRANDE,
            estable: DEFAULT_ESTABLE,
            evento: DEFAULT_EVENTO,
            picos: DEFAULT_PICOS,
        }
    }
}

impl PreclusterThresholds {
    /// Create a custom threshold set.
    pub fn new(grande: f64, estable: f64, evento: f64, picos: f64) -> Self {
        Self {
            grande,
            estable,
            evento,
            picos,
        }
    }

    /// Reject non-positive or non-finite thresholds.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("grande", self.grande),
            ("estable", self.estable),
            ("evento", self.evento),
            ("picos", self.picos),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SegmentationError::config(format!(
                    "threshold '{name}' must be a positive finite number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Rules 2 and 3 are mutually exclusive only when `estable < evento`.
    pub fn has_safe_rule_order(&self) -> bool {
        self.estable < self.evento
    }

    /// `normal_con_picos` can only be produced when `picos < evento`.
    pub fn spiky_reachable(&self) -> bool {
        self.picos < self.evento
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Assign a label from median and ratio. Total and deterministic.
#[inline]
pub fn classify(median: f64, ratio: f64, thresholds: &PreclusterThresholds) -> PreclusterLabel {
    if median == 0.0 {
        PreclusterLabel::EventDriven
    } else if median >= thresholds.grande && ratio <= thresholds.estable {
        PreclusterLabel::GrandeYEstable
    } else if ratio >= thresholds.evento {
        PreclusterLabel::EventDriven
    } else if ratio >= thresholds.picos {
        PreclusterLabel::NormalConPicos
    } else {
        PreclusterLabel::NormalEstable
    }
}

/// A structural summary row with its precluster label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSummary {
    /// Structural statistics
    #[serde(flatten)]
    pub summary: StructuralSummary,

    /// Assigned category
    pub label: PreclusterLabel,
}

impl ClassifiedSummary {
    /// Classify one summary row.
    pub fn from_summary(summary: StructuralSummary, thresholds: &PreclusterThresholds) -> Self {
        let label = classify(summary.median, summary.ratio, thresholds);
        Self { summary, label }
    }

    /// ATM identifier.
    #[inline]
    pub fn entity_id(&self) -> &str {
        &self.summary.entity_id
    }

    /// Median daily withdrawal.
    #[inline]
    pub fn median(&self) -> f64 {
        self.summary.median
    }

    /// p95 / median ratio.
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.summary.ratio
    }
}

/// Applies [`classify`] independently to every summary row.
#[derive(Debug, Clone, Default)]
pub struct PreclusterClassifier {
    thresholds: PreclusterThresholds,
    parallel: bool,
}

impl PreclusterClassifier {
    /// Classifier with validated thresholds.
    pub fn new(thresholds: PreclusterThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            parallel: false,
        })
    }

    /// Classify rows on the rayon pool. Row order is preserved.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Active thresholds.
    pub fn thresholds(&self) -> &PreclusterThresholds {
        &self.thresholds
    }

    /// Label of a single row.
    pub fn classify_row(&self, summary: &StructuralSummary) -> PreclusterLabel {
        classify(summary.median, summary.ratio, &self.thresholds)
    }

    /// Label every row, keeping input order.
    pub fn classify_all(&self, summaries: Vec<StructuralSummary>) -> Vec<ClassifiedSummary> {
        let thresholds = &self.thresholds;
        if self.parallel {
            summaries
                .into_par_iter()
                .map(|s| ClassifiedSummary::from_summary(s, thresholds))
                .collect()
        } else {
            summaries
                .into_iter()
                .map(|s| ClassifiedSummary::from_summary(s, thresholds))
                .collect()
        }
    }
}

// ============================================================================
// Label Statistics
// ============================================================================

/// Entity counts per precluster label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreclusterStats {
    /// Total number of classified entities
    pub total: usize,

    /// Counts indexed by [`PreclusterLabel::as_index`]
    counts: [usize; 4],
}

impl PreclusterStats {
    /// Count labels over a classified table.
    pub fn from_classified(rows: &[ClassifiedSummary]) -> Self {
        let mut stats = Self::default();
        for row in rows {
            stats.counts[row.label.as_index()] += 1;
            stats.total += 1;
        }
        stats
    }

    /// Number of entities with the given label.
    pub fn count(&self, label: PreclusterLabel) -> usize {
        self.counts[label.as_index()]
    }

    /// Share of entities with the given label, in `[0, 1]`.
    pub fn share(&self, label: PreclusterLabel) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(label) as f64 / self.total as f64
    }

    /// Labels with no entities.
    pub fn empty_labels(&self) -> Vec<PreclusterLabel> {
        PreclusterLabel::ALL
            .into_iter()
            .filter(|l| self.count(*l) == 0)
            .collect()
    }

    /// `(label, count)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (PreclusterLabel, usize)> + '_ {
        PreclusterLabel::ALL.into_iter().map(|l| (l, self.count(l)))
    }
}

impl std::fmt::Display for PreclusterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} entities:", self.total)?;
        for (label, count) in self.iter() {
            write!(f, " {label}={count}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
