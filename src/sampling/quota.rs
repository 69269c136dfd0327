//! Quota sampler: per-label selection under a fixed policy.
//!
//! # Contracts
//!
//! Single-label ([`QuotaSampler::select`]):
//! - unknown label → [`SegmentationError::InvalidLabel`], before touching data
//! - no ATMs with the label → [`SegmentationError::EmptyCluster`]
//! - `n` above availability → clamped, notice logged
//!
//! Multi-label ([`QuotaSampler::select_multi`]):
//! - every label is parsed up front; an unknown one fails the whole call
//! - empty labels are skipped with a notice
//! - over-requests are clamped with a notice
//!
//! The population order for every mode is the order of the input rows
//! (summary rows are sorted by ATM id). Random mode re-seeds per label, so
//! a label's draw does not depend on which labels were requested before it.

use super::{
    LabelSelection, ReportRow, SelectionMode, SelectionNotice, SelectionOutcome, SelectionReport,
    SelectionRequest, SelectionResult,
};
use crate::error::{Result, SegmentationError};
use crate::precluster::{ClassifiedSummary, PreclusterLabel};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 42;

/// Selects ATMs per precluster label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSampler {
    mode: SelectionMode,
    seed: u64,
}

impl Default for QuotaSampler {
    fn default() -> Self {
        Self::new(SelectionMode::default(), DEFAULT_SEED)
    }
}

impl QuotaSampler {
    /// Sampler with an explicit mode and seed.
    pub fn new(mode: SelectionMode, seed: u64) -> Self {
        Self { mode, seed }
    }

    /// Sampler from a mode name (`random`, `highest_ratio`, `highest_median`).
    pub fn from_mode_name(mode: &str, seed: u64) -> Result<Self> {
        Ok(Self::new(mode.parse()?, seed))
    }

    /// Active selection mode.
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Seed for random mode.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Select up to `n` ATM ids with the named label.
    pub fn select(&self, rows: &[ClassifiedSummary], label: &str, n: usize) -> Result<Vec<String>> {
        let label: PreclusterLabel = label.parse()?;
        Ok(self.select_label(rows, label, n)?.entity_ids)
    }

    /// Select up to `n` ATMs with `label`, keeping request bookkeeping.
    pub fn select_label(
        &self,
        rows: &[ClassifiedSummary],
        label: PreclusterLabel,
        n: usize,
    ) -> Result<LabelSelection> {
        let members = members_of(rows, label);
        if members.is_empty() {
            return Err(SegmentationError::EmptyCluster(label));
        }

        let selection = self.take(label, &members, n);
        if selection.was_clamped() {
            log::warn!("{}", clamp_notice(&selection));
        }
        Ok(selection)
    }

    /// Run the single-label algorithm for every entry of `request`.
    pub fn select_multi(
        &self,
        rows: &[ClassifiedSummary],
        request: &SelectionRequest,
    ) -> Result<SelectionOutcome> {
        let parsed = request
            .entries()
            .iter()
            .map(|entry| Ok((entry.label.parse::<PreclusterLabel>()?, entry.count)))
            .collect::<Result<Vec<_>>>()?;

        for (i, (label, _)) in parsed.iter().enumerate() {
            if parsed[..i].iter().any(|(seen, _)| seen == label) {
                return Err(SegmentationError::config(format!(
                    "label '{label}' appears more than once in the quota request"
                )));
            }
        }

        let total_requested = request.total_requested();
        let mut result = SelectionResult::default();
        let mut report = SelectionReport::new(total_requested);
        let mut notices = Vec::new();

        for (label, requested) in parsed {
            let members = members_of(rows, label);
            if members.is_empty() {
                let notice = SelectionNotice::SkippedEmpty { label, requested };
                log::warn!("{notice}");
                notices.push(notice);
                continue;
            }

            let selection = self.take(label, &members, requested);
            if selection.was_clamped() {
                let notice = clamp_notice(&selection);
                log::warn!("{notice}");
                notices.push(notice);
            }

            report
                .rows
                .push(ReportRow::new(label, selection.selected(), total_requested));
            result.push(selection);
        }

        log::info!(
            "Selected {} ATMs across {} preclusters ({} requested, mode={}, seed={})",
            result.total_selected(),
            result.len(),
            total_requested,
            self.mode,
            self.seed
        );

        Ok(SelectionOutcome {
            result,
            report,
            notices,
        })
    }

    fn take(
        &self,
        label: PreclusterLabel,
        members: &[&ClassifiedSummary],
        requested: usize,
    ) -> LabelSelection {
        let available = members.len();
        let n = requested.min(available);

        let entity_ids = match self.mode {
            SelectionMode::Random => random_pick(members, n, self.seed),
            SelectionMode::HighestRatio => top_by(members, n, ClassifiedSummary::ratio),
            SelectionMode::HighestMedian => top_by(members, n, ClassifiedSummary::median),
        };

        LabelSelection {
            label,
            requested,
            available,
            entity_ids,
        }
    }
}

/// Single-label selection with an explicit mode and seed.
pub fn select(
    rows: &[ClassifiedSummary],
    label: &str,
    n: usize,
    mode: SelectionMode,
    seed: u64,
) -> Result<Vec<String>> {
    QuotaSampler::new(mode, seed).select(rows, label, n)
}

/// Multi-label selection with an explicit mode and seed.
pub fn select_multi(
    rows: &[ClassifiedSummary],
    request: &SelectionRequest,
    mode: SelectionMode,
    seed: u64,
) -> Result<SelectionOutcome> {
    QuotaSampler::new(mode, seed).select_multi(rows, request)
}

fn members_of(rows: &[ClassifiedSummary], label: PreclusterLabel) -> Vec<&ClassifiedSummary> {
    rows.iter().filter(|row| row.label == label).collect()
}

fn clamp_notice(selection: &LabelSelection) -> SelectionNotice {
    SelectionNotice::Clamped {
        label: selection.label,
        requested: selection.requested,
        available: selection.available,
    }
}

/// Seeded draw of `n` distinct members, in draw order.
fn random_pick(members: &[&ClassifiedSummary], n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    rand::seq::index::sample(&mut rng, members.len(), n)
        .into_iter()
        .map(|idx| members[idx].entity_id().to_string())
        .collect()
}

/// First `n` members by descending key; stable, so ties keep row order.
fn top_by<F>(members: &[&ClassifiedSummary], n: usize, key: F) -> Vec<String>
where
    F: Fn(&ClassifiedSummary) -> f64,
{
    let mut ordered: Vec<&ClassifiedSummary> = members.to_vec();
    ordered.sort_by(|a, b| key(*b).total_cmp(&key(*a)));
    ordered
        .into_iter()
        .take(n)
        .map(|row| row.entity_id().to_string())
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precluster::PreclusterThresholds;
    use crate::profiling::StructuralSummary;

    fn classified(id: &str, median: f64, ratio: f64) -> ClassifiedSummary {
        ClassifiedSummary::from_summary(
            StructuralSummary {
                entity_id: id.to_string(),
                n_observations: 180,
                median,
                p95: median * ratio,
                ratio,
            },
            &PreclusterThresholds::default(),
        )
    }

    /// Five stable ATMs, two spiky ATMs, no large ATMs.
    fn table() -> Vec<ClassifiedSummary> {
        vec![
            classified("a", 1_000.0, 2.0),
            classified("b", 3_000.0, 1.5),
            classified("c", 2_000.0, 2.0),
            classified("d", 3_000.0, 4.0),
            classified("e", 500.0, 1.1),
            classified("p1", 800.0, 6.0),
            classified("p2", 900.0, 7.0),
        ]
    }

    #[test]
    fn test_select_highest_ratio_stable_ties() {
        let sampler = QuotaSampler::new(SelectionMode::HighestRatio, DEFAULT_SEED);
        let ids = sampler.select(&table(), "normal_estable", 3).unwrap();
        // d=4.0, then a and c tie at 2.0 in row order
        assert_eq!(ids, vec!["d", "a", "c"]);
    }

    #[test]
    fn test_select_highest_median_stable_ties() {
        let sampler = QuotaSampler::new(SelectionMode::HighestMedian, DEFAULT_SEED);
        let ids = sampler.select(&table(), "normal_estable", 2).unwrap();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[test]
    fn test_select_random_is_reproducible() {
        let sampler = QuotaSampler::new(SelectionMode::Random, 7);
        let first = sampler.select(&table(), "normal_estable", 3).unwrap();
        let second = sampler.select(&table(), "normal_estable", 3).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);

        let mut unique = first.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
        for id in &first {
            assert!(["a", "b", "c", "d", "e"].contains(&id.as_str()));
        }
    }

    #[test]
    fn test_select_clamps_over_request() {
        for mode in [
            SelectionMode::Random,
            SelectionMode::HighestRatio,
            SelectionMode::HighestMedian,
        ] {
            let sampler = QuotaSampler::new(mode, 1);
            let mut ids = sampler.select(&table(), "normal_con_picos", 10).unwrap();
            ids.sort();
            assert_eq!(ids, vec!["p1", "p2"]);
        }
    }

    #[test]
    fn test_select_zero_returns_empty() {
        let sampler = QuotaSampler::default();
        assert!(sampler.select(&table(), "normal_estable", 0).unwrap().is_empty());
    }

    #[test]
    fn test_select_empty_cluster_fails() {
        let err = QuotaSampler::default()
            .select(&table(), "grande_y_estable", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            SegmentationError::EmptyCluster(PreclusterLabel::GrandeYEstable)
        ));
    }

    #[test]
    fn test_select_invalid_label_fails_on_empty_table() {
        let err = QuotaSampler::default().select(&[], "huge", 1).unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidLabel(_)));
    }

    #[test]
    fn test_from_mode_name() {
        assert!(QuotaSampler::from_mode_name("mayor_ratio", 3).is_ok());
        assert!(matches!(
            QuotaSampler::from_mode_name("best", 3),
            Err(SegmentationError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_select_multi_skips_and_clamps() {
        let request = SelectionRequest::new()
            .with("normal_estable", 2)
            .with("grande_y_estable", 3)
            .with("normal_con_picos", 5);
        let outcome = QuotaSampler::new(SelectionMode::HighestRatio, 0)
            .select_multi(&table(), &request)
            .unwrap();

        assert_eq!(
            outcome.result.labels(),
            vec![PreclusterLabel::NormalEstable, PreclusterLabel::NormalConPicos]
        );
        assert_eq!(
            outcome.result.get(PreclusterLabel::NormalConPicos).unwrap(),
            ["p2", "p1"]
        );
        assert!(!outcome.result.contains(PreclusterLabel::GrandeYEstable));
        assert!(outcome.report.row(PreclusterLabel::GrandeYEstable).is_none());

        // Percentages use the pre-clamp total of 10
        assert_eq!(outcome.report.total_requested, 10);
        let picos = outcome.report.row(PreclusterLabel::NormalConPicos).unwrap();
        assert_eq!(picos.n_selected, 2);
        assert!((picos.percentage - 20.0).abs() < 1e-9);
        assert!((outcome.report.total_percentage() - 40.0).abs() < 1e-9);

        assert_eq!(outcome.notices.len(), 2);
        assert!(matches!(
            outcome.notices[0],
            SelectionNotice::SkippedEmpty {
                label: PreclusterLabel::GrandeYEstable,
                requested: 3
            }
        ));
        assert!(matches!(
            outcome.notices[1],
            SelectionNotice::Clamped {
                label: PreclusterLabel::NormalConPicos,
                requested: 5,
                available: 2
            }
        ));
    }

    #[test]
    fn test_select_multi_invalid_label_is_fatal() {
        let request = SelectionRequest::new()
            .with("normal_estable", 2)
            .with("mega_atm", 1);
        let err = QuotaSampler::default()
            .select_multi(&table(), &request)
            .unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidLabel(ref s) if s == "mega_atm"));
    }

    #[test]
    fn test_select_multi_rejects_repeated_label() {
        let request: SelectionRequest = serde_json::from_str(
            r#"[{"label": "normal_estable", "count": 1}, {"label": "NORMAL_ESTABLE", "count": 2}]"#,
        )
        .unwrap();
        assert_eq!(request.len(), 2);

        let err = QuotaSampler::default()
            .select_multi(&table(), &request)
            .unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidConfig(_)));
        assert!(err.to_string().contains("normal_estable"));
    }

    #[test]
    fn test_select_multi_huge_request_does_not_overflow() {
        let request = SelectionRequest::new()
            .with("normal_estable", usize::MAX)
            .with("normal_con_picos", 1);
        assert_eq!(request.total_requested(), usize::MAX);

        let outcome = QuotaSampler::new(SelectionMode::HighestRatio, DEFAULT_SEED)
            .select_multi(&table(), &request)
            .unwrap();
        assert_eq!(outcome.report.total_requested, usize::MAX);
        assert_eq!(outcome.result.get(PreclusterLabel::NormalEstable).unwrap().len(), 5);
        assert_eq!(outcome.result.get(PreclusterLabel::NormalConPicos).unwrap(), ["p2"]);
        for row in &outcome.report.rows {
            assert!(row.percentage.is_finite());
            assert!(row.percentage < 1e-10);
        }
    }

    #[test]
    fn test_select_multi_random_matches_single_label() {
        let sampler = QuotaSampler::new(SelectionMode::Random, 99);
        let request = SelectionRequest::new()
            .with("normal_con_picos", 1)
            .with("normal_estable", 3);
        let outcome = sampler.select_multi(&table(), &request).unwrap();
        let single = sampler.select(&table(), "normal_estable", 3).unwrap();
        assert_eq!(outcome.result.get(PreclusterLabel::NormalEstable).unwrap(), single);
    }

    #[test]
    fn test_select_multi_empty_request() {
        let outcome = QuotaSampler::default()
            .select_multi(&table(), &SelectionRequest::new())
            .unwrap();
        assert!(outcome.result.is_empty());
        assert!(outcome.report.rows.is_empty());
        assert_eq!(outcome.report.total_requested, 0);
    }

    #[test]
    fn test_free_functions() {
        let ids = select(&table(), "normal_estable", 1, SelectionMode::HighestMedian, 0).unwrap();
        assert_eq!(ids, vec!["b"]);

        let request = SelectionRequest::new().with("event_driven", 1);
        let outcome = select_multi(&table(), &request, SelectionMode::Random, 0).unwrap();
        assert!(outcome.result.is_empty());
        assert_eq!(outcome.notices.len(), 1);
    }
}
