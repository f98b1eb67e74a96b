//! Batch-wise accumulation for evaluation loops.

use std::fmt::Debug;
use std::hash::Hash;

use super::{GroupedScore, RetrievalMetric};
use crate::error::{LightningError, Result};

/// Collects batches and evaluates a [`RetrievalMetric`] over all of them.
///
/// A query may span several batches; grouping happens at `compute` time.
///
/// # Example
///
/// ```rust
/// use transformers_lightning_rs::metrics::{RetrievalAccumulator, RetrievalMetric};
///
/// # fn main() -> transformers_lightning_rs::Result<()> {
/// let mut acc = RetrievalAccumulator::new(RetrievalMetric::hit_rate(1)?);
/// acc.update(&[7, 7], &[0.1, 0.9], &[0, 0])?;
/// acc.update(&[7], &[0.95], &[1])?;
///
/// assert_eq!(acc.len(), 3);
/// assert_eq!(acc.compute()?, 1.0);
///
/// acc.reset();
/// assert!(acc.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetrievalAccumulator<K> {
    metric: RetrievalMetric,
    group_ids: Vec<K>,
    predictions: Vec<f64>,
    relevance: Vec<i64>,
}

impl<K> RetrievalAccumulator<K>
where
    K: Eq + Hash + Debug + Clone,
{
    /// Create an empty accumulator.
    #[must_use]
    pub fn new(metric: RetrievalMetric) -> Self {
        Self {
            metric,
            group_ids: Vec::new(),
            predictions: Vec::new(),
            relevance: Vec::new(),
        }
    }

    /// The wrapped metric.
    #[must_use]
    pub fn metric(&self) -> &RetrievalMetric {
        &self.metric
    }

    /// Append a batch.
    ///
    /// # Errors
    ///
    /// Returns [`LightningError::Data`] if the slices differ in length; the
    /// accumulator is left unchanged.
    pub fn update<R>(&mut self, group_ids: &[K], predictions: &[f64], relevance: &[R]) -> Result<()>
    where
        R: Copy + Into<i64>,
    {
        if predictions.len() != group_ids.len() || relevance.len() != group_ids.len() {
            return Err(LightningError::Data(format!(
                "batch slices must have the same length, got {}, {} and {}",
                group_ids.len(),
                predictions.len(),
                relevance.len()
            )));
        }
        self.group_ids.extend_from_slice(group_ids);
        self.predictions.extend_from_slice(predictions);
        self.relevance.extend(relevance.iter().map(|&r| r.into()));
        Ok(())
    }

    /// Metric over everything seen since the last reset.
    ///
    /// # Errors
    ///
    /// See [`RetrievalMetric::compute`].
    pub fn compute(&self) -> Result<f64> {
        self.compute_partial().map(|score| score.value())
    }

    /// `(sum, count)` over everything seen, for cross-shard reduction.
    ///
    /// # Errors
    ///
    /// See [`RetrievalMetric::compute_partial`].
    pub fn compute_partial(&self) -> Result<GroupedScore> {
        self.metric
            .compute_partial(&self.group_ids, &self.predictions, &self.relevance)
    }

    /// Drop all accumulated entries.
    pub fn reset(&mut self) {
        self.group_ids.clear();
        self.predictions.clear();
        self.relevance.clear();
    }

    /// Number of accumulated entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.group_ids.len()
    }

    /// Whether nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{EmptyTargetAction, MetricKind};

    #[test]
    fn test_batches_match_single_call() {
        let ids = [0, 1, 0, 2, 1, 2, 0];
        let preds = [0.4, 0.9, 0.8, 0.1, 0.2, 0.7, 0.3];
        let target = [0, 0, 1, 1, 1, 0, 0];

        let metric = RetrievalMetric::from_kind(&MetricKind::AveragePrecision).unwrap();
        let expected = metric.compute(&ids, &preds, &target).unwrap();

        let mut acc = RetrievalAccumulator::new(metric);
        acc.update(&ids[..2], &preds[..2], &target[..2]).unwrap();
        acc.update(&ids[2..5], &preds[2..5], &target[2..5]).unwrap();
        acc.update(&ids[5..], &preds[5..], &target[5..]).unwrap();

        assert_eq!(acc.compute().unwrap(), expected);
    }

    #[test]
    fn test_update_rejects_mismatched_batch() {
        let mut acc = RetrievalAccumulator::new(RetrievalMetric::hit_rate(1).unwrap());
        acc.update(&["a"], &[0.5], &[true]).unwrap();

        let err = acc.update(&["a", "b"], &[0.5], &[true, false]).unwrap_err();
        assert!(matches!(err, LightningError::Data(_)));
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn test_compute_propagates_empty_target_error() {
        let metric = RetrievalMetric::hit_rate(1)
            .unwrap()
            .with_empty_target_action(EmptyTargetAction::Error);
        let mut acc = RetrievalAccumulator::new(metric);
        acc.update(&[1, 1], &[0.3, 0.2], &[0, 0]).unwrap();

        assert!(matches!(acc.compute().unwrap_err(), LightningError::Data(_)));

        acc.reset();
        assert_eq!(acc.compute().unwrap(), 0.0);
    }
}
