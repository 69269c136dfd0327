//! Per-ATM history preparation and the forecasting hand-off.
//!
//! The forecasting model is an external collaborator. This module prepares
//! what it consumes and drives it over a selected id list:
//!
//! ```text
//! SelectionResult[label] ──► ids ──► HistoryIndex::history(id) ──► EntityHistory
//!                                                                     │
//!                                len < min_observations? ── skip ◄────┤
//!                                                                     ▼
//!                                         Forecaster::forecast(history, horizon)
//!                                                                     │
//!                                    keep predictions after last date ▼
//!                                                             ForecastRun
//! ```
//!
//! The primary model needs at least 150 days of history; the legacy path
//! accepts 30. Per-ATM failures are recorded and do not stop the run.

use crate::error::Result;
use crate::profiling::Observation;
use ahash::AHashMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Minimum history for the primary forecasting path.
pub const PRIMARY_MIN_OBSERVATIONS: usize = 150;
/// Minimum history for the legacy forecasting path.
pub const LEGACY_MIN_OBSERVATIONS: usize = 30;
/// Default forecast horizon in days.
pub const DEFAULT_HORIZON: usize = 30;

/// History requirements for the forecasting hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Minimum number of observations an ATM needs to be forecast
    pub min_observations: usize,

    /// Number of future days requested from the forecaster
    pub horizon: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self::primary()
    }
}

impl HistoryConfig {
    /// Primary model requirements (≥150 days).
    pub fn primary() -> Self {
        Self {
            min_observations: PRIMARY_MIN_OBSERVATIONS,
            horizon: DEFAULT_HORIZON,
        }
    }

    /// Legacy model requirements (≥30 days).
    pub fn legacy() -> Self {
        Self {
            min_observations: LEGACY_MIN_OBSERVATIONS,
            horizon: DEFAULT_HORIZON,
        }
    }

    /// Override the horizon.
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Horizon must be positive.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.horizon == 0 {
            return Err("history.horizon must be > 0".to_string());
        }
        Ok(())
    }
}

/// One ATM's withdrawal series, sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityHistory {
    entity_id: String,
    points: Vec<(NaiveDate, f64)>,
}

impl EntityHistory {
    /// Build from unsorted points.
    pub fn new(entity_id: impl Into<String>, mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.sort_by_key(|(date, _)| *date);
        Self {
            entity_id: entity_id.into(),
            points,
        }
    }

    /// ATM identifier.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// `(date, amount)` points in date order.
    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// Number of observed days.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the ATM has no observations.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Last observed date.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(date, _)| *date)
    }

    /// Mean of finite amounts, rounded to two decimals.
    pub fn mean(&self) -> Option<f64> {
        let finite: Vec<f64> = self
            .points
            .iter()
            .map(|(_, v)| *v)
            .filter(|v| v.is_finite())
            .collect();
        if finite.is_empty() {
            return None;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        Some((mean * 100.0).round() / 100.0)
    }
}

/// Observations grouped per ATM, built once per run.
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    by_entity: AHashMap<String, Vec<(NaiveDate, f64)>>,
}

impl HistoryIndex {
    /// Group an observation table by ATM.
    pub fn new(observations: &[Observation]) -> Self {
        let mut by_entity: AHashMap<String, Vec<(NaiveDate, f64)>> = AHashMap::new();
        for obs in observations {
            by_entity
                .entry(obs.entity_id.clone())
                .or_default()
                .push((obs.date, obs.value));
        }
        Self { by_entity }
    }

    /// Date-sorted history of one ATM, `None` if it has no rows.
    pub fn history(&self, entity_id: &str) -> Option<EntityHistory> {
        self.by_entity
            .get(entity_id)
            .map(|points| EntityHistory::new(entity_id, points.clone()))
    }

    /// Number of observed days for an ATM (0 when unknown).
    pub fn history_len(&self, entity_id: &str) -> usize {
        self.by_entity.get(entity_id).map_or(0, Vec::len)
    }

    /// Number of ATMs in the index.
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }
}

/// Single-ATM convenience over [`HistoryIndex`].
pub fn prepare_entity_history(
    observations: &[Observation],
    entity_id: &str,
) -> Option<EntityHistory> {
    let points: Vec<(NaiveDate, f64)> = observations
        .iter()
        .filter(|obs| obs.entity_id == entity_id)
        .map(|obs| (obs.date, obs.value))
        .collect();
    if points.is_empty() {
        None
    } else {
        Some(EntityHistory::new(entity_id, points))
    }
}

// ============================================================================
// Forecasting hand-off
// ============================================================================

/// One predicted day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Forecast date
    pub date: NaiveDate,

    /// Predicted withdrawal amount
    pub value: f64,
}

/// External forecasting model.
///
/// Implementations may return fitted in-sample values alongside future
/// predictions; only points dated after the last observation are kept.
pub trait Forecaster {
    /// Forecast `horizon` days past the end of `history`.
    fn forecast(&self, history: &EntityHistory, horizon: usize) -> Result<Vec<ForecastPoint>>;
}

/// Forecast for one ATM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityForecast {
    /// ATM identifier
    pub entity_id: String,

    /// Observed days used as history
    pub n_history: usize,

    /// Mean historical withdrawal (two decimals)
    pub historical_mean: Option<f64>,

    /// Predictions after the last observed date
    pub predictions: Vec<ForecastPoint>,
}

/// ATM left out of a forecasting run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntity {
    /// ATM identifier
    pub entity_id: String,

    /// Observed days available
    pub n_history: usize,

    /// Minimum required
    pub required: usize,
}

/// ATM whose forecast call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntity {
    /// ATM identifier
    pub entity_id: String,

    /// Error message from the forecaster
    pub error: String,
}

/// Outcome of forecasting a selected id list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
    /// Successful forecasts, in list order
    pub forecasts: Vec<EntityForecast>,

    /// ATMs with insufficient history
    pub skipped: Vec<SkippedEntity>,

    /// ATMs whose forecast failed
    pub failed: Vec<FailedEntity>,
}

impl ForecastRun {
    /// Forecast for an ATM, if it succeeded.
    pub fn get(&self, entity_id: &str) -> Option<&EntityForecast> {
        self.forecasts.iter().find(|f| f.entity_id == entity_id)
    }

    /// Number of ATMs attempted (forecast, skipped or failed).
    pub fn attempted(&self) -> usize {
        self.forecasts.len() + self.skipped.len() + self.failed.len()
    }
}

/// Forecast every id in `entity_ids`, skipping short histories.
pub fn forecast_selection<F: Forecaster + ?Sized>(
    entity_ids: &[String],
    index: &HistoryIndex,
    forecaster: &F,
    config: &HistoryConfig,
) -> ForecastRun {
    let mut run = ForecastRun::default();

    for entity_id in entity_ids {
        let history = match index.history(entity_id) {
            Some(history) if history.len() >= config.min_observations => history,
            other => {
                let n_history = other.map_or(0, |h| h.len());
                log::warn!(
                    "Skipping ATM {entity_id}: {n_history} days of history (minimum {})",
                    config.min_observations
                );
                run.skipped.push(SkippedEntity {
                    entity_id: entity_id.clone(),
                    n_history,
                    required: config.min_observations,
                });
                continue;
            }
        };

        match forecaster.forecast(&history, config.horizon) {
            Ok(points) => {
                let last = history.last_date();
                let predictions: Vec<ForecastPoint> = points
                    .into_iter()
                    .filter(|p| last.map_or(true, |last| p.date > last))
                    .collect();
                log::info!(
                    "ATM {entity_id}: {} days of history, {} days predicted",
                    history.len(),
                    predictions.len()
                );
                run.forecasts.push(EntityForecast {
                    entity_id: entity_id.clone(),
                    n_history: history.len(),
                    historical_mean: history.mean(),
                    predictions,
                });
            }
            Err(e) => {
                log::error!("Forecast failed for ATM {entity_id}: {e}");
                run.failed.push(FailedEntity {
                    entity_id: entity_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    run
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentationError;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
    }

    fn observations(id: &str, days: usize, value: f64) -> Vec<Observation> {
        (0..days)
            .map(|d| Observation::new(id, start() + chrono::Days::new(d as u64), value))
            .collect()
    }

    /// Repeats the historical mean, also echoing one in-sample day.
    struct MeanForecaster;

    impl Forecaster for MeanForecaster {
        fn forecast(&self, history: &EntityHistory, horizon: usize) -> Result<Vec<ForecastPoint>> {
            let last = history
                .last_date()
                .ok_or_else(|| SegmentationError::input("empty history"))?;
            let mean = history.mean().unwrap_or(0.0);
            let mut points = vec![ForecastPoint { date: last, value: mean }];
            for d in 1..=horizon {
                points.push(ForecastPoint {
                    date: last + chrono::Days::new(d as u64),
                    value: mean,
                });
            }
            Ok(points)
        }
    }

    struct FailingForecaster;

    impl Forecaster for FailingForecaster {
        fn forecast(&self, _: &EntityHistory, _: usize) -> Result<Vec<ForecastPoint>> {
            Err(SegmentationError::input("model not loaded"))
        }
    }

    #[test]
    fn test_history_config_presets() {
        assert_eq!(HistoryConfig::primary().min_observations, 150);
        assert_eq!(HistoryConfig::legacy().min_observations, 30);
        assert_eq!(HistoryConfig::default(), HistoryConfig::primary());
        assert!(HistoryConfig::primary().with_horizon(0).validate().is_err());
    }

    #[test]
    fn test_history_is_sorted_by_date() {
        let d = start();
        let obs = vec![
            Observation::new("A", d + chrono::Days::new(2), 3.0),
            Observation::new("B", d, 9.0),
            Observation::new("A", d, 1.0),
            Observation::new("A", d + chrono::Days::new(1), 2.0),
        ];
        let history = prepare_entity_history(&obs, "A").unwrap();
        let values: Vec<f64> = history.points().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(history.last_date(), Some(d + chrono::Days::new(2)));
        assert_eq!(history.mean(), Some(2.0));
        assert!(prepare_entity_history(&obs, "Z").is_none());

        let index = HistoryIndex::new(&obs);
        assert_eq!(index.history("A").unwrap(), history);
        assert_eq!(index.history_len("B"), 1);
        assert_eq!(index.history_len("Z"), 0);
        assert_eq!(index.entity_count(), 2);
    }

    #[test]
    fn test_mean_rounds_to_cents() {
        let history = EntityHistory::new(
            "A",
            vec![(start(), 1.0), (start() + chrono::Days::new(1), 2.0), (start(), f64::NAN)],
        );
        let h3 = EntityHistory::new(
            "B",
            vec![
                (start(), 1.0),
                (start() + chrono::Days::new(1), 1.0),
                (start() + chrono::Days::new(2), 2.0),
            ],
        );
        assert_eq!(history.mean(), Some(1.5));
        assert_eq!(h3.mean(), Some(1.33));
    }

    #[test]
    fn test_forecast_selection_skips_short_histories() {
        let mut obs = observations("long", 160, 100.0);
        obs.extend(observations("short", 40, 50.0));
        let index = HistoryIndex::new(&obs);
        let ids = vec!["long".to_string(), "short".to_string(), "ghost".to_string()];

        let run = forecast_selection(&ids, &index, &MeanForecaster, &HistoryConfig::primary());
        assert_eq!(run.forecasts.len(), 1);
        assert_eq!(run.skipped.len(), 2);
        assert_eq!(run.attempted(), 3);

        let long = run.get("long").unwrap();
        assert_eq!(long.n_history, 160);
        assert_eq!(long.historical_mean, Some(100.0));
        // In-sample echo dropped, horizon kept
        assert_eq!(long.predictions.len(), 30);
        assert!(long.predictions[0].date > start() + chrono::Days::new(159));

        assert_eq!(run.skipped[0].entity_id, "short");
        assert_eq!(run.skipped[0].n_history, 40);
        assert_eq!(run.skipped[1].n_history, 0);
    }

    #[test]
    fn test_forecast_selection_legacy_threshold() {
        let obs = observations("short", 40, 50.0);
        let index = HistoryIndex::new(&obs);
        let ids = vec!["short".to_string()];
        let run = forecast_selection(
            &ids,
            &index,
            &MeanForecaster,
            &HistoryConfig::legacy().with_horizon(7),
        );
        assert_eq!(run.forecasts.len(), 1);
        assert_eq!(run.forecasts[0].predictions.len(), 7);
    }

    #[test]
    fn test_forecast_failures_are_recorded() {
        let obs = observations("A", 200, 10.0);
        let index = HistoryIndex::new(&obs);
        let ids = vec!["A".to_string()];
        let run = forecast_selection(&ids, &index, &FailingForecaster, &HistoryConfig::primary());
        assert!(run.forecasts.is_empty());
        assert_eq!(run.failed.len(), 1);
        assert!(run.failed[0].error.contains("model not loaded"));
    }
}
