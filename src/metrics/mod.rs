//! Grouped information retrieval metrics.
//!
//! Predictions arrive as three flat, parallel slices: the query (group) each
//! entry belongs to, the model score, and the relevance label. Entries are
//! grouped by query, every group is scored by a [`GroupScorer`], and the
//! per-group scores are averaged.
//!
//! # Example
//!
//! ```rust
//! use transformers_lightning_rs::metrics::{EmptyTargetAction, RetrievalMetric};
//!
//! # fn main() -> transformers_lightning_rs::Result<()> {
//! let indexes = [0, 0, 0, 1, 1, 1, 1];
//! let preds = [0.2, 0.3, 0.5, 0.1, 0.3, 0.5, 0.2];
//! let target = [false, false, true, false, true, false, false];
//!
//! let hr = RetrievalMetric::hit_rate(1)?.with_empty_target_action(EmptyTargetAction::Skip);
//! assert_eq!(hr.compute(&indexes, &preds, &target)?, 0.5);
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod scorers;

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::{LightningError, Result};

pub use accumulator::RetrievalAccumulator;
pub use scorers::{
    AveragePrecision, GroupScorer, HitRate, MetricKind, PrecisionAtK, RecallAtK, ReciprocalRank,
    Scorer,
};

/// Relevance value that marks entries to ignore.
pub const DEFAULT_EXCLUDE: i64 = -100;

/// What to do with queries that have no positive target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyTargetAction {
    /// Leave the query out of the average (all skipped gives `0.0`).
    #[default]
    Skip,
    /// Fail with a data error.
    Error,
    /// Count the query as `1.0`.
    Pos,
    /// Count the query as `0.0`.
    Neg,
}

/// Sum of per-group scores and the number of groups that contributed.
///
/// Shards of a distributed evaluation each produce one of these; the caller
/// combines them with [`GroupedScore::merge`] and reads [`GroupedScore::value`].
///
/// ```rust
/// use transformers_lightning_rs::metrics::GroupedScore;
///
/// let a = GroupedScore { sum: 1.0, count: 2 };
/// let b = GroupedScore { sum: 2.0, count: 2 };
/// assert_eq!(a.merge(b).value(), 0.75);
/// assert_eq!(GroupedScore::default().value(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedScore {
    /// Sum of retained group contributions
    pub sum: f64,
    /// Number of retained groups
    pub count: usize,
}

impl GroupedScore {
    /// Combine two partial results.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }

    /// Mean contribution, `0.0` when no group was retained.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }
}

/// Group entries by query and accumulate per-group scores.
///
/// Entries whose relevance equals `exclude` are dropped first. Groups keep
/// input order internally and are visited in order of first appearance.
///
/// # Errors
///
/// Returns [`LightningError::Data`] if the slices differ in length, or if a
/// query has no positive target and `action` is [`EmptyTargetAction::Error`].
pub fn grouped_partial<K, R, S>(
    group_ids: &[K],
    predictions: &[f64],
    relevance: &[R],
    scorer: &S,
    action: EmptyTargetAction,
    exclude: Option<i64>,
) -> Result<GroupedScore>
where
    K: Eq + Hash + Debug,
    R: Copy + Into<i64>,
    S: GroupScorer + ?Sized,
{
    if predictions.len() != group_ids.len() || relevance.len() != group_ids.len() {
        return Err(LightningError::Data(format!(
            "group_ids, predictions and relevance must have the same length, got {}, {} and {}",
            group_ids.len(),
            predictions.len(),
            relevance.len()
        )));
    }

    let mut positions: HashMap<&K, usize> = HashMap::new();
    let mut groups: Vec<(&K, Vec<(f64, i64)>)> = Vec::new();

    for ((id, &pred), &rel) in group_ids.iter().zip(predictions).zip(relevance) {
        let rel: i64 = rel.into();
        if exclude == Some(rel) {
            continue;
        }
        let slot = *positions.entry(id).or_insert_with(|| {
            groups.push((id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push((pred, rel));
    }

    let mut score = GroupedScore::default();
    let mut skipped = 0usize;

    for (id, group) in &groups {
        if group.iter().any(|&(_, rel)| rel > 0) {
            score.sum += scorer.score(group);
            score.count += 1;
            continue;
        }
        match action {
            EmptyTargetAction::Skip => skipped += 1,
            EmptyTargetAction::Error => {
                return Err(LightningError::Data(format!(
                    "query {id:?} has no positive target"
                )));
            }
            EmptyTargetAction::Pos => {
                score.sum += 1.0;
                score.count += 1;
            }
            EmptyTargetAction::Neg => score.count += 1,
        }
    }

    tracing::debug!(
        groups = groups.len(),
        skipped,
        retained = score.count,
        "Aggregated grouped retrieval metric"
    );
    if score.count == 0 && skipped > 0 {
        tracing::warn!(skipped, "Every query lacked a positive target; metric is 0.0");
    }

    Ok(score)
}

/// Grouped mean of per-group scores. See [`grouped_partial`].
///
/// # Errors
///
/// Same as [`grouped_partial`].
pub fn grouped_mean<K, R, S>(
    group_ids: &[K],
    predictions: &[f64],
    relevance: &[R],
    scorer: &S,
    action: EmptyTargetAction,
    exclude: Option<i64>,
) -> Result<f64>
where
    K: Eq + Hash + Debug,
    R: Copy + Into<i64>,
    S: GroupScorer + ?Sized,
{
    grouped_partial(group_ids, predictions, relevance, scorer, action, exclude)
        .map(|score| score.value())
}

/// Hit rate at `k`, averaged over queries.
///
/// # Errors
///
/// Returns [`LightningError::Config`] if `k == 0`, and the errors of
/// [`grouped_partial`] otherwise.
pub fn hit_rate_at_k<K, R>(
    group_ids: &[K],
    predictions: &[f64],
    relevance: &[R],
    k: usize,
    action: EmptyTargetAction,
    exclude: Option<i64>,
) -> Result<f64>
where
    K: Eq + Hash + Debug,
    R: Copy + Into<i64>,
{
    let scorer = HitRate::new(k)?;
    grouped_mean(group_ids, predictions, relevance, &scorer, action, exclude)
}

/// A configured retrieval metric: a scorer plus the grouping policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalMetric {
    scorer: Scorer,
    empty_target_action: EmptyTargetAction,
    exclude: Option<i64>,
}

impl RetrievalMetric {
    /// Wrap a validated scorer with the default policy
    /// ([`EmptyTargetAction::Skip`], exclude `-100`).
    #[must_use]
    pub fn new(scorer: Scorer) -> Self {
        Self {
            scorer,
            empty_target_action: EmptyTargetAction::default(),
            exclude: Some(DEFAULT_EXCLUDE),
        }
    }

    /// Build from a declarative description.
    ///
    /// # Errors
    ///
    /// Returns an error if `k` is not positive.
    pub fn from_kind(kind: &MetricKind) -> Result<Self> {
        kind.build().map(Self::new)
    }

    /// Hit rate at `k`.
    ///
    /// # Errors
    ///
    /// Returns an error if `k == 0`.
    pub fn hit_rate(k: usize) -> Result<Self> {
        HitRate::new(k).map(|s| Self::new(Scorer::HitRate(s)))
    }

    /// Set the policy for queries without positive targets.
    #[must_use]
    pub fn with_empty_target_action(mut self, action: EmptyTargetAction) -> Self {
        self.empty_target_action = action;
        self
    }

    /// Set (or clear) the relevance value to ignore.
    #[must_use]
    pub fn with_exclude(mut self, exclude: Option<i64>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Display label, e.g. `hit_rate@1`.
    #[must_use]
    pub fn label(&self) -> String {
        self.scorer.label()
    }

    /// The per-group scorer.
    #[must_use]
    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Policy for queries without positive targets.
    #[must_use]
    pub fn empty_target_action(&self) -> EmptyTargetAction {
        self.empty_target_action
    }

    /// Relevance value that is ignored.
    #[must_use]
    pub fn exclude(&self) -> Option<i64> {
        self.exclude
    }

    /// Compute the metric over one shard of data.
    ///
    /// # Errors
    ///
    /// See [`grouped_partial`].
    pub fn compute<K, R>(&self, group_ids: &[K], predictions: &[f64], relevance: &[R]) -> Result<f64>
    where
        K: Eq + Hash + Debug,
        R: Copy + Into<i64>,
    {
        self.compute_partial(group_ids, predictions, relevance)
            .map(|score| score.value())
    }

    /// Like [`RetrievalMetric::compute`], but returns the `(sum, count)`
    /// pair for cross-shard reduction.
    ///
    /// # Errors
    ///
    /// See [`grouped_partial`].
    pub fn compute_partial<K, R>(
        &self,
        group_ids: &[K],
        predictions: &[f64],
        relevance: &[R],
    ) -> Result<GroupedScore>
    where
        K: Eq + Hash + Debug,
        R: Copy + Into<i64>,
    {
        grouped_partial(
            group_ids,
            predictions,
            relevance,
            &self.scorer,
            self.empty_target_action,
            self.exclude,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: [i64; 7] = [0, 0, 0, 1, 1, 1, 1];
    const PREDS: [f64; 7] = [0.2, 0.3, 0.5, 0.1, 0.3, 0.5, 0.2];
    const TARGET: [bool; 7] = [false, false, true, false, true, false, false];

    #[test]
    fn test_hit_rate_reference_example() {
        let hr = hit_rate_at_k(&IDS, &PREDS, &TARGET, 1, EmptyTargetAction::Skip, None).unwrap();
        assert_eq!(hr, 0.5);
    }

    #[test]
    fn test_hit_rate_larger_k() {
        let hr = hit_rate_at_k(&IDS, &PREDS, &TARGET, 2, EmptyTargetAction::Skip, None).unwrap();
        assert_eq!(hr, 1.0);

        // k larger than every group
        let hr = hit_rate_at_k(&IDS, &PREDS, &TARGET, 50, EmptyTargetAction::Skip, None).unwrap();
        assert_eq!(hr, 1.0);
    }

    #[test]
    fn test_zero_k_is_config_error() {
        let err =
            hit_rate_at_k(&IDS, &PREDS, &TARGET, 0, EmptyTargetAction::Skip, None).unwrap_err();
        assert!(matches!(err, LightningError::Config(_)));

        // Regardless of data shape
        let err = hit_rate_at_k::<i64, bool>(&[1], &[], &[], 0, EmptyTargetAction::Error, None)
            .unwrap_err();
        assert!(matches!(err, LightningError::Config(_)));
    }

    #[test]
    fn test_mismatched_lengths() {
        let err = hit_rate_at_k(&IDS, &PREDS[..6], &TARGET, 1, EmptyTargetAction::Skip, None)
            .unwrap_err();
        assert!(matches!(err, LightningError::Data(_)));

        let err = hit_rate_at_k(&IDS, &PREDS, &TARGET[..3], 1, EmptyTargetAction::Skip, None)
            .unwrap_err();
        assert!(matches!(err, LightningError::Data(_)));
    }

    #[test]
    fn test_non_contiguous_groups() {
        let ids = ["q1", "q2", "q1", "q2"];
        let preds = [0.9, 0.1, 0.1, 0.9];
        let target = [1, 1, 0, 0];

        let hr = hit_rate_at_k(&ids, &preds, &target, 1, EmptyTargetAction::Skip, None).unwrap();
        assert_eq!(hr, 0.5);
    }

    #[test]
    fn test_empty_target_actions() {
        let ids = [0, 0, 1, 1, 2, 2];
        let preds = [0.9, 0.1, 0.8, 0.2, 0.5, 0.4];
        let target = [1, 0, 0, 1, 0, 0];

        let run = |action| hit_rate_at_k(&ids, &preds, &target, 1, action, None);

        assert_eq!(run(EmptyTargetAction::Skip).unwrap(), 0.5);
        assert!(matches!(
            run(EmptyTargetAction::Error).unwrap_err(),
            LightningError::Data(_)
        ));
        assert!((run(EmptyTargetAction::Pos).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((run(EmptyTargetAction::Neg).unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_groups_skipped_returns_zero() {
        let hr = hit_rate_at_k(&[0, 1], &[0.3, 0.4], &[0, 0], 1, EmptyTargetAction::Skip, None)
            .unwrap();
        assert_eq!(hr, 0.0);

        let empty: [i64; 0] = [];
        let hr = hit_rate_at_k(&empty, &[], &[0i64; 0], 1, EmptyTargetAction::Skip, None).unwrap();
        assert_eq!(hr, 0.0);
    }

    #[test]
    fn test_exclude_drops_entries() {
        // The excluded entry would otherwise win the top-1 slot of query 0.
        let ids = [0, 0, 0, 1, 1];
        let preds = [0.99, 0.5, 0.1, 0.7, 0.2];
        let target = [DEFAULT_EXCLUDE, 1, 0, 1, 0];

        let hr = hit_rate_at_k(
            &ids,
            &preds,
            &target,
            1,
            EmptyTargetAction::Skip,
            Some(DEFAULT_EXCLUDE),
        )
        .unwrap();
        assert_eq!(hr, 1.0);
    }

    #[test]
    fn test_fully_excluded_group_disappears() {
        let ids = [0, 0, 1];
        let preds = [0.9, 0.1, 0.5];
        let target = [1, 0, -1];

        let hr = hit_rate_at_k(&ids, &preds, &target, 1, EmptyTargetAction::Neg, Some(-1)).unwrap();
        assert_eq!(hr, 1.0);
    }

    #[test]
    fn test_ties_broken_by_input_order() {
        let ids = [0, 0, 1, 1];
        let preds = [0.5, 0.5, 0.5, 0.5];
        let target = [1, 0, 0, 1];

        let hr = hit_rate_at_k(&ids, &preds, &target, 1, EmptyTargetAction::Skip, None).unwrap();
        assert_eq!(hr, 0.5);
    }

    #[test]
    fn test_partial_merge_equals_single_shard() {
        let metric = RetrievalMetric::hit_rate(1).unwrap();
        let whole = metric.compute(&IDS, &PREDS, &TARGET).unwrap();

        let left = metric.compute_partial(&IDS[..3], &PREDS[..3], &TARGET[..3]).unwrap();
        let right = metric.compute_partial(&IDS[3..], &PREDS[3..], &TARGET[3..]).unwrap();

        assert_eq!(left, GroupedScore { sum: 1.0, count: 1 });
        assert_eq!(right, GroupedScore { sum: 0.0, count: 1 });
        assert_eq!(left.merge(right).value(), whole);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_custom_scorer_closure() {
        let group_size = |group: &[(f64, i64)]| group.len() as f64;

        let mean_size =
            grouped_mean(&IDS, &PREDS, &TARGET, &group_size, EmptyTargetAction::Skip, None)
                .unwrap();
        assert_eq!(mean_size, 3.5);
    }

    #[test]
    fn test_metric_builder_settings() {
        let metric = RetrievalMetric::hit_rate(3)
            .unwrap()
            .with_empty_target_action(EmptyTargetAction::Pos)
            .with_exclude(None);

        assert_eq!(metric.label(), "hit_rate@3");
        assert_eq!(metric.empty_target_action(), EmptyTargetAction::Pos);
        assert_eq!(metric.exclude(), None);
        assert_eq!(RetrievalMetric::hit_rate(1).unwrap().exclude(), Some(-100));
    }

    #[test]
    fn test_empty_target_action_yaml() {
        let action: EmptyTargetAction = serde_yaml::from_str("neg").unwrap();
        assert_eq!(action, EmptyTargetAction::Neg);
        assert!(serde_yaml::from_str::<EmptyTargetAction>("maybe").is_err());
    }
}
