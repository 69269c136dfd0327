//! Per-entity structural summary (count, median, p95, ratio).
//!
//! # Statistics
//!
//! Percentiles use linear interpolation between closest ranks over the
//! sorted values (not nearest-rank):
//!
//! ```text
//! pos   = q * (n - 1)
//! value = x[floor(pos)] + (x[ceil(pos)] - x[floor(pos)]) * (pos - floor(pos))
//! ```
//!
//! The median is the 0.5 percentile under the same definition, which equals
//! the mean of the two middle values for even `n`.
//!
//! # Ratio guard
//!
//! `ratio = p95 / median`, except that a zero median yields `0`, and any
//! non-finite quotient is normalized to `0`. The ratio is therefore always
//! finite.
//!
//! # Row order
//!
//! Output rows are sorted by `entity_id` ascending. Downstream sampling uses
//! this order for stable tie-breaking and as the population order for seeded
//! random draws.
//!
//! Ids are compared as strings, byte by byte. Numeric ids therefore sort
//! lexicographically (`"10"` before `"9"`), not by numeric value. Zero-pad
//! numeric ids (`"009"`, `"010"`) to get numeric order.

use super::Observation;
use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Percentile used for the upper-tail statistic.
pub const UPPER_QUANTILE: f64 = 0.95;

/// Structural digest of one entity's withdrawal series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralSummary {
    /// ATM identifier (unique key)
    pub entity_id: String,

    /// Number of (non-missing) observations
    pub n_observations: usize,

    /// Median daily withdrawal
    pub median: f64,

    /// 95th percentile of daily withdrawals
    pub p95: f64,

    /// `p95 / median`, 0 when the quotient is undefined
    pub ratio: f64,
}

impl StructuralSummary {
    /// Build a summary row from precomputed statistics, applying the ratio guard.
    pub fn from_stats(
        entity_id: impl Into<String>,
        n_observations: usize,
        median: f64,
        p95: f64,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            n_observations,
            median,
            p95,
            ratio: guarded_ratio(p95, median),
        }
    }

    /// Summarize one entity's values. Non-finite values are treated as missing.
    pub fn from_values(entity_id: impl Into<String>, values: &[f64]) -> Self {
        let mut clean: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        clean.sort_by(f64::total_cmp);

        let median = percentile(&clean, 0.5).unwrap_or(0.0);
        let p95 = percentile(&clean, UPPER_QUANTILE).unwrap_or(0.0);
        Self::from_stats(entity_id, clean.len(), median, p95)
    }
}

/// `p95 / median` with zero-median and non-finite results mapped to 0.
#[inline]
pub fn guarded_ratio(p95: f64, median: f64) -> f64 {
    if median == 0.0 {
        return 0.0;
    }
    let ratio = p95 / median;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Linear-interpolated percentile of an ascending-sorted slice.
///
/// Returns `None` for an empty slice. `q` is clamped to `[0, 1]`.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = if q.is_nan() { 0.5 } else { q.clamp(0.0, 1.0) };
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Reduces an observation table to one [`StructuralSummary`] per entity.
///
/// The reduction is a pure function of the input rows. With `parallel`
/// enabled, per-entity statistics are computed on the rayon pool; the output
/// is identical to the sequential path.
#[derive(Debug, Clone, Default)]
pub struct StructuralSummaryBuilder {
    parallel: bool,
}

impl StructuralSummaryBuilder {
    /// Create a sequential builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel reduction.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether per-entity reduction runs on the rayon pool.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Build the summary table. Empty input yields an empty table.
    pub fn build(&self, observations: &[Observation]) -> Vec<StructuralSummary> {
        let groups = group_values(observations);

        let summaries: Vec<StructuralSummary> = if self.parallel {
            groups
                .into_par_iter()
                .map(|(id, values)| StructuralSummary::from_values(id, &values))
                .collect()
        } else {
            groups
                .into_iter()
                .map(|(id, values)| StructuralSummary::from_values(id, &values))
                .collect()
        };

        log::debug!(
            "Built structural summary: {} observations -> {} entities",
            observations.len(),
            summaries.len()
        );
        summaries
    }
}

/// Convenience wrapper around a sequential [`StructuralSummaryBuilder`].
pub fn build_summary(observations: &[Observation]) -> Vec<StructuralSummary> {
    StructuralSummaryBuilder::new().build(observations)
}

/// Group values by entity, sorted by entity id.
fn group_values(observations: &[Observation]) -> Vec<(&str, Vec<f64>)> {
    let mut groups: AHashMap<&str, Vec<f64>> = AHashMap::new();
    for obs in observations {
        groups
            .entry(obs.entity_id.as_str())
            .or_default()
            .push(obs.value);
    }

    let mut groups: Vec<(&str, Vec<f64>)> = groups.into_iter().collect();
    groups.sort_unstable_by(|a, b| a.0.cmp(b.0));
    groups
}

// ============================================================================
// Unit Tests
// ============================================================================
