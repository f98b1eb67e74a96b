//! Bridge to the candle framework.
//!
//! Applies scheduled learning rates to a [`candle_nn::Optimizer`] and turns
//! prediction tensors into the flat inputs of the retrieval metrics.

use candle_core::{DType, Tensor};
use candle_nn::Optimizer;

use crate::error::Result;
use crate::metrics::{GroupedScore, RetrievalMetric};
use crate::scheduler::LrSchedule;

impl LrSchedule {
    /// Advance the schedule and set the optimizer's learning rate to
    /// `base_lr * factor`. Returns the learning rate that was set.
    pub fn step_optimizer<O: Optimizer>(&mut self, optimizer: &mut O, base_lr: f64) -> f64 {
        let lr = base_lr * self.step();
        optimizer.set_learning_rate(lr);
        lr
    }
}

/// Flatten `(indexes, preds, target)` tensors of any matching shape.
///
/// Indexes and targets are cast to `i64`, predictions to `f64`.
///
/// # Errors
///
/// Returns an error if a tensor cannot be cast or copied to the host.
pub fn flatten_retrieval_tensors(
    indexes: &Tensor,
    preds: &Tensor,
    target: &Tensor,
) -> Result<(Vec<i64>, Vec<f64>, Vec<i64>)> {
    let indexes = indexes.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?;
    let preds = preds.flatten_all()?.to_dtype(DType::F64)?.to_vec1::<f64>()?;
    let target = target.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?;
    Ok((indexes, preds, target))
}

impl RetrievalMetric {
    /// Compute the metric directly from tensors.
    ///
    /// # Errors
    ///
    /// Returns tensor conversion errors and the errors of
    /// [`RetrievalMetric::compute`].
    pub fn compute_tensors(&self, indexes: &Tensor, preds: &Tensor, target: &Tensor) -> Result<f64> {
        self.compute_tensors_partial(indexes, preds, target)
            .map(|score| score.value())
    }

    /// Tensor variant of [`RetrievalMetric::compute_partial`].
    ///
    /// # Errors
    ///
    /// See [`RetrievalMetric::compute_tensors`].
    pub fn compute_tensors_partial(
        &self,
        indexes: &Tensor,
        preds: &Tensor,
        target: &Tensor,
    ) -> Result<GroupedScore> {
        let (indexes, preds, target) = flatten_retrieval_tensors(indexes, preds, target)?;
        self.compute_partial(&indexes, &preds, &target)
    }
}
