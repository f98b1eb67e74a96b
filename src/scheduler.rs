//! Learning rate schedulers.
//!
//! A schedule turns a training step into a multiplicative factor for the
//! base learning rate. The policy is chosen once, at construction, and each
//! variant of [`SchedulePolicy`] carries only the parameters it needs.
//!
//! # Example
//!
//! ```rust
//! use transformers_lightning_rs::scheduler::{LrSchedule, SchedulePolicy};
//!
//! # fn main() -> transformers_lightning_rs::Result<()> {
//! let mut schedule = LrSchedule::new(SchedulePolicy::LinearWithWarmup {
//!     num_warmup_steps: 10,
//!     num_training_steps: 110,
//! })?;
//!
//! // Stateless lookup
//! assert_eq!(schedule.factor_at(10), 1.0);
//! assert_eq!(schedule.factor_at(110), 0.0);
//!
//! // "Get next" mode: the cursor starts at -1, so the first call yields step 0
//! assert_eq!(schedule.step(), 0.0);
//! assert_eq!(schedule.last_step(), 0);
//! # Ok(())
//! # }
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{LightningError, Result};

/// Learning rate schedule policy.
///
/// Serialized with a `policy` tag, e.g.
///
/// ```yaml
/// policy: cosine_with_warmup
/// num_warmup_steps: 100
/// num_training_steps: 1000
/// num_cycles: 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SchedulePolicy {
    /// Constant factor of `1.0`.
    Constant,
    /// Linear warmup, then constant.
    ConstantWithWarmup {
        /// Number of warmup steps (must be > 0)
        num_warmup_steps: usize,
    },
    /// Linear decay from `1.0` to `0.0`, no warmup.
    Linear {
        /// Total number of training steps
        num_training_steps: usize,
    },
    /// Linear warmup then linear decay.
    LinearWithWarmup {
        /// Number of warmup steps
        #[serde(default)]
        num_warmup_steps: usize,
        /// Total number of training steps
        num_training_steps: usize,
    },
    /// Linear warmup then cosine decay.
    CosineWithWarmup {
        /// Number of warmup steps
        #[serde(default)]
        num_warmup_steps: usize,
        /// Total number of training steps
        num_training_steps: usize,
        /// Number of cosine waves (0.5 decays once from max to 0)
        #[serde(default = "default_cosine_cycles")]
        num_cycles: f64,
    },
    /// Linear warmup then cosine decay with hard restarts.
    CosineWithHardRestarts {
        /// Number of warmup steps
        #[serde(default)]
        num_warmup_steps: usize,
        /// Total number of training steps
        num_training_steps: usize,
        /// Number of hard restarts
        #[serde(default = "default_restart_cycles")]
        num_cycles: f64,
    },
    /// Linear warmup then polynomial decay. Combine with
    /// [`LayerwiseDecay`] for per-layer base rates.
    PolynomialDecayWithWarmup {
        /// Number of warmup steps
        #[serde(default)]
        num_warmup_steps: usize,
        /// Total number of training steps
        num_training_steps: usize,
        /// Polynomial power (1.0 is linear)
        #[serde(default = "default_power")]
        power: f64,
    },
}

fn default_cosine_cycles() -> f64 {
    0.5
}
fn default_restart_cycles() -> f64 {
    1.0
}
fn default_power() -> f64 {
    1.0
}

impl SchedulePolicy {
    /// Short policy name, as used in config files.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::ConstantWithWarmup { .. } => "constant_with_warmup",
            Self::Linear { .. } => "linear",
            Self::LinearWithWarmup { .. } => "linear_with_warmup",
            Self::CosineWithWarmup { .. } => "cosine_with_warmup",
            Self::CosineWithHardRestarts { .. } => "cosine_with_hard_restarts",
            Self::PolynomialDecayWithWarmup { .. } => "polynomial_decay_with_warmup",
        }
    }

    /// Number of warmup steps (0 for policies without warmup).
    #[must_use]
    pub fn num_warmup_steps(&self) -> usize {
        match *self {
            Self::Constant | Self::Linear { .. } => 0,
            Self::ConstantWithWarmup { num_warmup_steps }
            | Self::LinearWithWarmup {
                num_warmup_steps, ..
            }
            | Self::CosineWithWarmup {
                num_warmup_steps, ..
            }
            | Self::CosineWithHardRestarts {
                num_warmup_steps, ..
            }
            | Self::PolynomialDecayWithWarmup {
                num_warmup_steps, ..
            } => num_warmup_steps,
        }
    }

    /// Total number of training steps, if the policy has a decay phase.
    #[must_use]
    pub fn num_training_steps(&self) -> Option<usize> {
        match *self {
            Self::Constant | Self::ConstantWithWarmup { .. } => None,
            Self::Linear { num_training_steps }
            | Self::LinearWithWarmup {
                num_training_steps, ..
            }
            | Self::CosineWithWarmup {
                num_training_steps, ..
            }
            | Self::CosineWithHardRestarts {
                num_training_steps, ..
            }
            | Self::PolynomialDecayWithWarmup {
                num_training_steps, ..
            } => Some(num_training_steps),
        }
    }

    /// Validate the static parameters of this policy.
    ///
    /// # Errors
    ///
    /// Returns [`LightningError::Config`] if warmup is zero for
    /// constant-with-warmup, if the total step count does not exceed the
    /// warmup, or if `num_cycles` / `power` is not a positive finite number.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Constant => Ok(()),
            Self::ConstantWithWarmup { num_warmup_steps } => {
                if num_warmup_steps == 0 {
                    return Err(LightningError::Config(
                        "num_warmup_steps must be > 0 for constant_with_warmup".into(),
                    ));
                }
                Ok(())
            }
            Self::Linear { num_training_steps } => check_steps(0, num_training_steps),
            Self::LinearWithWarmup {
                num_warmup_steps,
                num_training_steps,
            } => check_steps(num_warmup_steps, num_training_steps),
            Self::CosineWithWarmup {
                num_warmup_steps,
                num_training_steps,
                num_cycles,
            }
            | Self::CosineWithHardRestarts {
                num_warmup_steps,
                num_training_steps,
                num_cycles,
            } => {
                check_steps(num_warmup_steps, num_training_steps)?;
                check_positive("num_cycles", num_cycles)
            }
            Self::PolynomialDecayWithWarmup {
                num_warmup_steps,
                num_training_steps,
                power,
            } => {
                check_steps(num_warmup_steps, num_training_steps)?;
                check_positive("power", power)
            }
        }
    }

    /// Learning rate factor at `step`.
    ///
    /// Only meaningful for validated policies, but never panics on
    /// unvalidated ones.
    #[must_use]
    pub fn factor(&self, step: usize) -> f64 {
        match *self {
            Self::Constant => 1.0,
            Self::ConstantWithWarmup { num_warmup_steps } => {
                if step < num_warmup_steps {
                    ratio(step, num_warmup_steps)
                } else {
                    1.0
                }
            }
            Self::Linear { num_training_steps } => {
                ratio(num_training_steps.saturating_sub(step), num_training_steps)
            }
            Self::LinearWithWarmup {
                num_warmup_steps,
                num_training_steps,
            } => {
                if step < num_warmup_steps {
                    return ratio(step, num_warmup_steps);
                }
                ratio(
                    num_training_steps.saturating_sub(step),
                    num_training_steps.saturating_sub(num_warmup_steps),
                )
            }
            Self::CosineWithWarmup {
                num_warmup_steps,
                num_training_steps,
                num_cycles,
            } => {
                if step < num_warmup_steps {
                    return ratio(step, num_warmup_steps);
                }
                let progress = decay_progress(step, num_warmup_steps, num_training_steps);
                if progress >= 1.0 {
                    return 0.0;
                }
                (0.5 * (1.0 + (PI * num_cycles * 2.0 * progress).cos())).max(0.0)
            }
            Self::CosineWithHardRestarts {
                num_warmup_steps,
                num_training_steps,
                num_cycles,
            } => {
                if step < num_warmup_steps {
                    return ratio(step, num_warmup_steps);
                }
                let progress = decay_progress(step, num_warmup_steps, num_training_steps);
                if progress >= 1.0 {
                    return 0.0;
                }
                // Lands on 1.0 exactly at every restart boundary.
                0.5 * (1.0 + (PI * ((num_cycles * progress) % 1.0)).cos())
            }
            Self::PolynomialDecayWithWarmup {
                num_warmup_steps,
                num_training_steps,
                power,
            } => {
                if step < num_warmup_steps {
                    return ratio(step, num_warmup_steps);
                }
                let remaining = ratio(
                    num_training_steps.saturating_sub(step),
                    num_training_steps.saturating_sub(num_warmup_steps),
                );
                remaining.powf(power)
            }
        }
    }
}

fn check_steps(num_warmup_steps: usize, num_training_steps: usize) -> Result<()> {
    if num_training_steps <= num_warmup_steps {
        return Err(LightningError::Config(format!(
            "num_training_steps ({num_training_steps}) must be greater than num_warmup_steps ({num_warmup_steps})"
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LightningError::Config(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    num as f64 / den.max(1) as f64
}

fn decay_progress(step: usize, num_warmup_steps: usize, num_training_steps: usize) -> f64 {
    ratio(
        step.saturating_sub(num_warmup_steps),
        num_training_steps.saturating_sub(num_warmup_steps),
    )
}

/// Learning rate schedule with a resumable step cursor.
///
/// The cursor (`last_step`) starts at `-1` for a fresh run, or at the last
/// completed step when resuming. [`LrSchedule::step`] advances it by one and
/// returns the factor for the new position; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct LrSchedule {
    /// Selected policy
    policy: SchedulePolicy,
    /// Step the next call to `step` will return (`last_step + 1`)
    next_step: usize,
}

impl LrSchedule {
    /// Create a fresh schedule (`last_step = -1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the policy parameters are invalid.
    pub fn new(policy: SchedulePolicy) -> Result<Self> {
        Self::with_last_step(policy, -1)
    }

    /// Create a schedule resuming after `last_step`.
    ///
    /// ```rust
    /// use transformers_lightning_rs::scheduler::{LrSchedule, SchedulePolicy};
    ///
    /// # fn main() -> transformers_lightning_rs::Result<()> {
    /// let policy = SchedulePolicy::CosineWithWarmup {
    ///     num_warmup_steps: 5,
    ///     num_training_steps: 50,
    ///     num_cycles: 0.5,
    /// };
    /// let fresh = LrSchedule::new(policy.clone())?;
    /// let mut resumed = LrSchedule::with_last_step(policy, 9)?;
    ///
    /// assert_eq!(resumed.step(), fresh.factor_at(10));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the policy parameters are invalid,
    /// `last_step < -1`, or `last_step + 1` does not fit a step counter.
    pub fn with_last_step(policy: SchedulePolicy, last_step: i64) -> Result<Self> {
        policy.validate()?;
        if last_step < -1 {
            return Err(LightningError::Config(format!(
                "last_step must be >= -1, got {last_step}"
            )));
        }
        let next_step = last_step
            .checked_add(1)
            .and_then(|next| usize::try_from(next).ok())
            .ok_or_else(|| {
                LightningError::Config(format!("last_step {last_step} is too large to resume from"))
            })?;

        tracing::debug!(
            policy = policy.name(),
            last_step,
            "Created learning rate schedule"
        );

        Ok(Self { policy, next_step })
    }

    /// The selected policy.
    #[must_use]
    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    /// Last step processed (`-1` before the first call to `step`).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn last_step(&self) -> i64 {
        self.next_step as i64 - 1
    }

    /// Factor at an arbitrary step. Does not touch the cursor.
    #[must_use]
    pub fn factor_at(&self, step: usize) -> f64 {
        self.policy.factor(step)
    }

    /// Advance the cursor by one and return the factor at the new step.
    pub fn step(&mut self) -> f64 {
        let factor = self.policy.factor(self.next_step);
        self.next_step += 1;
        factor
    }

    /// Learning rate at `step` for a single base rate.
    #[must_use]
    pub fn lr_at(&self, step: usize, base_lr: f64) -> f64 {
        base_lr * self.factor_at(step)
    }

    /// Learning rates at `step` for several parameter groups.
    ///
    /// The shared factor is applied to every base rate; per-group base rates
    /// (e.g. from [`LayerwiseDecay`]) are the caller's.
    #[must_use]
    pub fn lrs_at(&self, step: usize, base_lrs: &[f64]) -> Vec<f64> {
        let factor = self.factor_at(step);
        base_lrs.iter().map(|lr| lr * factor).collect()
    }

    /// The next `n` factors, without advancing this schedule.
    #[must_use]
    pub fn trace(&self, n: usize) -> Vec<f64> {
        let mut cursor = self.clone();
        (0..n).map(|_| cursor.step()).collect()
    }
}

/// Per-layer base learning rate multipliers.
///
/// Layer `depth` (0 = embeddings, `num_layers` = task head) gets
/// `decay_rate^(num_layers - depth)`, so lower layers train with smaller
/// rates. The time-decay factor from [`LrSchedule`] is applied on top.
///
/// # Example
///
/// ```rust
/// use transformers_lightning_rs::scheduler::LayerwiseDecay;
///
/// # fn main() -> transformers_lightning_rs::Result<()> {
/// let decay = LayerwiseDecay::new(0.5, 2)?;
/// assert_eq!(decay.multipliers(), vec![0.25, 0.5, 1.0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerwiseDecay {
    decay_rate: f64,
    num_layers: usize,
}

impl LayerwiseDecay {
    /// Create a layerwise decay.
    ///
    /// # Errors
    ///
    /// Returns an error if `decay_rate` is outside `(0, 1]` or `num_layers`
    /// is zero.
    pub fn new(decay_rate: f64, num_layers: usize) -> Result<Self> {
        if !(decay_rate > 0.0 && decay_rate <= 1.0) {
            return Err(LightningError::Config(format!(
                "layerwise decay_rate must be in (0, 1], got {decay_rate}"
            )));
        }
        if num_layers == 0 {
            return Err(LightningError::Config(
                "layerwise num_layers must be > 0".into(),
            ));
        }
        Ok(Self {
            decay_rate,
            num_layers,
        })
    }

    /// Number of layers (excluding embeddings).
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    /// Multiplier for a layer; depths past the head are clamped to it.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn multiplier(&self, depth: usize) -> f64 {
        let exponent = self.num_layers - depth.min(self.num_layers);
        self.decay_rate.powf(exponent as f64)
    }

    /// Multipliers for depths `0..=num_layers`.
    #[must_use]
    pub fn multipliers(&self) -> Vec<f64> {
        (0..=self.num_layers).map(|d| self.multiplier(d)).collect()
    }

    /// Base learning rates for depths `0..=num_layers`.
    #[must_use]
    pub fn base_lrs(&self, base_lr: f64) -> Vec<f64> {
        self.multipliers().into_iter().map(|m| m * base_lr).collect()
    }
}
