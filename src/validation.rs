//! Input Validation Module
//!
//! Checks an observation table and a threshold set before they reach the
//! profiling stage.
//!
//! # Validation Categories
//!
//! 1. **Identity**: empty entity ids (error)
//! 2. **Amounts**: negative withdrawals (error), missing or non-finite values (warning)
//! 3. **Uniqueness**: duplicate `(entity_id, date)` pairs (warning)
//! 4. **Thresholds**: rule-order and reachability conditions (warning)
//!
//! # Usage
//!
//! ```ignore
//! use atm_segmentation::validation::ObservationValidator;
//!
//! let result = ObservationValidator::new().validate_observations(&observations);
//! if result.has_errors() {
//!     for error in result.errors() {
//!         eprintln!("{error}");
//!     }
//! }
//! ```

use crate::precluster::PreclusterThresholds;
use crate::profiling::Observation;
use ahash::AHashSet;
use chrono::NaiveDate;
use std::fmt;

/// Validation result for a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    /// Data is valid
    Valid,
    /// Data has minor issues (warnings)
    Warning(String),
    /// Data has serious issues (errors)
    Error(String),
}

impl ValidationLevel {
    /// Check if this result indicates valid data.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationLevel::Valid)
    }

    /// Check if this result is a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationLevel::Warning(_))
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, ValidationLevel::Error(_))
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Valid => write!(f, "Valid"),
            ValidationLevel::Warning(msg) => write!(f, "Warning: {msg}"),
            ValidationLevel::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Aggregated validation result.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    results: Vec<(String, ValidationLevel)>,
}

impl ValidationResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation result.
    pub fn add(&mut self, check_name: &str, level: ValidationLevel) {
        self.results.push((check_name.to_string(), level));
    }

    /// Append every check of another result.
    pub fn merge(&mut self, other: ValidationResult) {
        self.results.extend(other.results);
    }

    /// Check if all validations passed (no errors or warnings).
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|(_, level)| level.is_valid())
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_error())
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_warning())
    }

    /// Warnings as `check: message` lines.
    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Warning(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    /// Errors as `check: message` lines.
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(name, level)| match level {
                ValidationLevel::Error(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect()
    }

    /// Get all results.
    pub fn all_results(&self) -> &[(String, ValidationLevel)] {
        &self.results
    }

    /// Get the number of checks performed.
    pub fn check_count(&self) -> usize {
        self.results.len()
    }

    /// Get the number of passed checks.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|(_, l)| l.is_valid()).count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.passed_count();
        let total = self.check_count();
        writeln!(f, "Validation: {passed}/{total} checks passed")?;

        for (name, level) in &self.results {
            if !level.is_valid() {
                writeln!(f, "  - {name}: {level}")?;
            }
        }

        Ok(())
    }
}

/// Configuration for observation validation.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Negative amounts are errors
    pub check_negative: bool,

    /// Missing / non-finite amounts are warnings
    pub check_missing: bool,

    /// Repeated `(entity_id, date)` pairs are warnings
    pub check_duplicates: bool,

    /// Maximum offending rows quoted in a message
    pub max_examples: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_negative: true,
            check_missing: true,
            check_duplicates: true,
            max_examples: 3,
        }
    }
}

/// Validator for observation tables.
#[derive(Debug, Clone, Default)]
pub struct ObservationValidator {
    config: ValidationConfig,
}

impl ObservationValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate an observation table.
    pub fn validate_observations(&self, observations: &[Observation]) -> ValidationResult {
        let mut result = ValidationResult::new();

        if observations.is_empty() {
            result.add(
                "observations",
                ValidationLevel::Warning("No observations to validate".to_string()),
            );
            return result;
        }

        self.validate_entity_ids(observations, &mut result);

        if self.config.check_negative {
            self.validate_negative(observations, &mut result);
        }

        if self.config.check_missing {
            self.validate_missing(observations, &mut result);
        }

        if self.config.check_duplicates {
            self.validate_duplicates(observations, &mut result);
        }

        result
    }

    fn validate_entity_ids(&self, observations: &[Observation], result: &mut ValidationResult) {
        let rows: Vec<usize> = observations
            .iter()
            .enumerate()
            .filter(|(_, obs)| obs.entity_id.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        if rows.is_empty() {
            result.add("entity_ids", ValidationLevel::Valid);
        } else {
            result.add(
                "entity_ids",
                ValidationLevel::Error(format!(
                    "{} rows with empty entity id (rows {})",
                    rows.len(),
                    self.examples(&rows)
                )),
            );
        }
    }

    fn validate_negative(&self, observations: &[Observation], result: &mut ValidationResult) {
        let rows: Vec<usize> = observations
            .iter()
            .enumerate()
            .filter(|(_, obs)| obs.value < 0.0)
            .map(|(i, _)| i)
            .collect();

        if rows.is_empty() {
            result.add("negative_values", ValidationLevel::Valid);
        } else {
            result.add(
                "negative_values",
                ValidationLevel::Error(format!(
                    "{} negative withdrawal amounts (rows {})",
                    rows.len(),
                    self.examples(&rows)
                )),
            );
        }
    }

    fn validate_missing(&self, observations: &[Observation], result: &mut ValidationResult) {
        let missing = observations.iter().filter(|o| !o.value.is_finite()).count();

        if missing == 0 {
            result.add("missing_values", ValidationLevel::Valid);
        } else {
            result.add(
                "missing_values",
                ValidationLevel::Warning(format!(
                    "{missing} of {} amounts are missing or non-finite and will be ignored",
                    observations.len()
                )),
            );
        }
    }

    fn validate_duplicates(&self, observations: &[Observation], result: &mut ValidationResult) {
        let mut seen: AHashSet<(&str, NaiveDate)> = AHashSet::with_capacity(observations.len());
        let duplicates = observations
            .iter()
            .filter(|obs| !seen.insert((obs.entity_id.as_str(), obs.date)))
            .count();

        if duplicates == 0 {
            result.add("unique_days", ValidationLevel::Valid);
        } else {
            result.add(
                "unique_days",
                ValidationLevel::Warning(format!(
                    "{duplicates} repeated (entity, date) pairs; each row is counted"
                )),
            );
        }
    }

    fn examples(&self, rows: &[usize]) -> String {
        let shown: Vec<String> = rows
            .iter()
            .take(self.config.max_examples)
            .map(|r| r.to_string())
            .collect();
        if rows.len() > self.config.max_examples {
            format!("{}, ...", shown.join(", "))
        } else {
            shown.join(", ")
        }
    }
}

/// Sanity-check a threshold set beyond the positivity enforced by
/// [`PreclusterThresholds::validate`].
pub fn validate_thresholds(thresholds: &PreclusterThresholds) -> ValidationResult {
    let mut result = ValidationResult::new();

    if thresholds.has_safe_rule_order() {
        result.add("rule_order", ValidationLevel::Valid);
    } else {
        result.add(
            "rule_order",
            ValidationLevel::Warning(format!(
                "estable ({}) >= evento ({}): large stable entities may shadow event-driven ones",
                thresholds.estable, thresholds.evento
            )),
        );
    }

    if thresholds.spiky_reachable() {
        result.add("picos_reachable", ValidationLevel::Valid);
    } else {
        result.add(
            "picos_reachable",
            ValidationLevel::Warning(format!(
                "picos ({}) >= evento ({}): normal_con_picos can never be assigned",
                thresholds.picos, thresholds.evento
            )),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn clean() -> Vec<Observation> {
        vec![
            Observation::new("A", day(1), 100.0),
            Observation::new("A", day(2), 120.0),
            Observation::new("B", day(1), 0.0),
        ]
    }

    #[test]
    fn test_clean_observations() {
        let result = ObservationValidator::new().validate_observations(&clean());
        assert!(result.is_valid());
        assert_eq!(result.check_count(), 4);
    }

    #[test]
    fn test_empty_input_is_warning() {
        let result = ObservationValidator::new().validate_observations(&[]);
        assert!(result.has_warnings());
        assert!(!result.has_errors());
    }

    #[test]
    fn test_empty_entity_id_is_error() {
        let mut obs = clean();
        obs.push(Observation::new("  ", day(3), 5.0));
        let result = ObservationValidator::new().validate_observations(&obs);
        assert!(result.has_errors());
        assert!(result.errors()[0].contains("rows 3"));
    }

    #[test]
    fn test_negative_value_is_error() {
        let mut obs = clean();
        obs.push(Observation::new("B", day(2), -1.0));
        let result = ObservationValidator::new().validate_observations(&obs);
        assert!(result.has_errors());
        assert!(result.errors()[0].starts_with("negative_values"));
    }

    #[test]
    fn test_missing_value_is_warning() {
        let mut obs = clean();
        obs.push(Observation::new("B", day(2), f64::NAN));
        obs.push(Observation::new("B", day(3), f64::INFINITY));
        let result = ObservationValidator::new().validate_observations(&obs);
        assert!(!result.has_errors());
        assert!(result.warnings()[0].contains("2 of 5"));
    }

    #[test]
    fn test_duplicate_days_are_warning() {
        let mut obs = clean();
        obs.push(Observation::new("A", day(1), 50.0));
        let result = ObservationValidator::new().validate_observations(&obs);
        assert!(!result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_disabled_checks_are_skipped() {
        let mut obs = clean();
        obs.push(Observation::new("B", day(2), -1.0));
        let validator = ObservationValidator::with_config(ValidationConfig {
            check_negative: false,
            ..Default::default()
        });
        assert!(validator.validate_observations(&obs).is_valid());
    }

    #[test]
    fn test_examples_are_truncated() {
        let obs: Vec<Observation> = (1..=5).map(|d| Observation::new("", day(d), 1.0)).collect();
        let result = ObservationValidator::new().validate_observations(&obs);
        assert!(result.errors()[0].contains("rows 0, 1, 2, ..."));
    }

    #[test]
    fn test_threshold_warnings() {
        assert!(validate_thresholds(&PreclusterThresholds::default()).is_valid());

        let shadowing = PreclusterThresholds::new(200_000.0, 9.0, 8.0, 5.0);
        let result = validate_thresholds(&shadowing);
        assert!(result.has_warnings());
        assert!(!result.has_errors());

        let unreachable = PreclusterThresholds::new(200_000.0, 3.0, 8.0, 8.0);
        assert_eq!(validate_thresholds(&unreachable).warnings().len(), 1);
    }

    #[test]
    fn test_validation_result_display_and_merge() {
        let mut result = ValidationResult::new();
        result.add("test1", ValidationLevel::Valid);
        result.add("test2", ValidationLevel::Warning("minor issue".to_string()));

        let mut other = ValidationResult::new();
        other.add("test3", ValidationLevel::Error("major issue".to_string()));
        result.merge(other);

        let display = format!("{result}");
        assert!(display.contains("1/3"));
        assert!(display.contains("major issue"));
    }
}
