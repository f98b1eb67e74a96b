//! Command implementations behind the `transformers-lightning` binary.
//!
//! Each command writes its report to any [`Write`] sink so it can be
//! exercised without spawning the binary.

use std::io::Write;

use crate::config::LightningConfig;
use crate::dataset::RetrievalSet;
use crate::error::Result;

/// Validate a configuration and print a summary.
///
/// # Errors
///
/// Returns the first validation error.
pub fn validate<W: Write>(config: &LightningConfig, out: &mut W) -> Result<()> {
    config.validate()?;

    writeln!(out, "✓ Configuration is valid")?;
    writeln!(out, "  Scheduler: {}", config.scheduler.name())?;
    writeln!(out, "  Warmup steps: {}", config.scheduler.num_warmup_steps())?;
    if let Some(total) = config.scheduler.num_training_steps() {
        writeln!(out, "  Training steps: {total}")?;
    }
    writeln!(out, "  Learning rate: {:e}", config.learning_rate)?;
    if let Some(layerwise) = &config.layerwise {
        writeln!(
            out,
            "  Layerwise decay: {} over {} layers",
            layerwise.decay_rate, layerwise.num_layers
        )?;
    }
    let labels: Vec<String> = config
        .build_metrics()?
        .iter()
        .map(crate::metrics::RetrievalMetric::label)
        .collect();
    writeln!(out, "  Metrics: {}", labels.join(", "))?;
    Ok(())
}

/// Print the schedule from the configured cursor onward, one step per line.
///
/// Without `steps`, the trace runs to `num_training_steps` inclusive (or to
/// the end of warmup for policies without a decay phase).
///
/// # Errors
///
/// Returns an error if the schedule is invalid or the sink fails.
pub fn schedule<W: Write>(config: &LightningConfig, steps: Option<usize>, out: &mut W) -> Result<()> {
    let mut schedule = config.build_schedule()?;
    let base_lrs = config.base_lrs()?;
    let head_lr = base_lrs.last().copied().unwrap_or(config.learning_rate);

    let first = usize::try_from(schedule.last_step() + 1).unwrap_or_default();
    let end = config
        .scheduler
        .num_training_steps()
        .unwrap_or_else(|| config.scheduler.num_warmup_steps());
    let count = steps.unwrap_or_else(|| (end + 1).saturating_sub(first));

    tracing::debug!(first, count, "Tracing learning rate schedule");

    writeln!(out, "step\tfactor\tlr")?;
    for step in first..first.saturating_add(count) {
        let factor = schedule.step();
        writeln!(out, "{step}\t{factor:.6}\t{:.6e}", head_lr * factor)?;
    }
    Ok(())
}

/// Compute every configured metric over an evaluation set.
///
/// # Errors
///
/// Returns configuration errors for invalid metrics and data errors from
/// the metric computation.
pub fn evaluate<W: Write>(config: &LightningConfig, set: &RetrievalSet, out: &mut W) -> Result<()> {
    let metrics = config.build_metrics()?;

    tracing::info!(
        entries = set.len(),
        metrics = metrics.len(),
        "Evaluating retrieval metrics"
    );

    for metric in &metrics {
        let value = set.evaluate(metric)?;
        writeln!(out, "{}\t{value:.6}", metric.label())?;
    }
    Ok(())
}
