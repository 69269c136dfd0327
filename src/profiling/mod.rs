//! Structural profiling of per-ATM withdrawal series.
//!
//! Raw input is a flat table of daily observations, one row per
//! `(entity_id, date)`. Profiling reduces it to one [`StructuralSummary`]
//! per entity:
//!
//! ```text
//! Observation rows ──group by entity_id──► values per entity
//!                                              │
//!                     count, median, p95 ◄─────┘
//!                                              │
//!                        ratio = p95 / median (0 when undefined)
//! ```
//!
//! # Modules
//!
//! - [`summary`]: the [`StructuralSummaryBuilder`] reduction
//! - [`loader`]: reading observation tables from CSV or JSON files
//!
//! # Example
//!
//! ```
//! use atm_segmentation::profiling::{build_summary, Observation};
//! use chrono::NaiveDate;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let observations = vec![
//!     Observation::new("ATM-001", day, 1_000.0),
//!     Observation::new("ATM-001", day.succ_opt().unwrap(), 3_000.0),
//! ];
//!
//! let summary = build_summary(&observations);
//! assert_eq!(summary.len(), 1);
//! assert_eq!(summary[0].median, 2_000.0);
//! ```

pub mod loader;
pub mod summary;

pub use loader::{ColumnMapping, ObservationLoader};
pub use summary::{build_summary, percentile, StructuralSummary, StructuralSummaryBuilder};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily withdrawal observation for one ATM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// ATM identifier (cajero)
    pub entity_id: String,

    /// Calendar day of the withdrawal total
    pub date: NaiveDate,

    /// Withdrawn amount for the day (non-negative)
    pub value: f64,
}

impl Observation {
    /// Create a new observation.
    pub fn new(entity_id: impl Into<String>, date: NaiveDate, value: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            date,
            value,
        }
    }
}

/// Count the distinct entities present in an observation table.
pub fn count_entities(observations: &[Observation]) -> usize {
    let mut seen: ahash::AHashSet<&str> = ahash::AHashSet::new();
    for obs in observations {
        seen.insert(obs.entity_id.as_str());
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_observation_new() {
        let obs = Observation::new("A", day(1), 10.0);
        assert_eq!(obs.entity_id, "A");
        assert_eq!(obs.date, day(1));
        assert_eq!(obs.value, 10.0);
    }

    #[test]
    fn test_count_entities() {
        let obs = vec![
            Observation::new("A", day(1), 1.0),
            Observation::new("B", day(1), 1.0),
            Observation::new("A", day(2), 1.0),
        ];
        assert_eq!(count_entities(&obs), 2);
        assert_eq!(count_entities(&[]), 0);
    }

    #[test]
    fn test_observation_serde_uses_iso_dates() {
        let obs = Observation::new("A", day(5), 12.5);
        let json = serde_json::to_string(&obs).unwrap();
        assert!(json.contains("\"2024-03-05\""));
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obs);
    }
}
