//! Configuration parsing and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LightningError, Result};
use crate::metrics::{EmptyTargetAction, MetricKind, RetrievalMetric, DEFAULT_EXCLUDE};
use crate::scheduler::{LayerwiseDecay, LrSchedule, SchedulePolicy};

/// Run configuration: learning-rate schedule and retrieval evaluation.
///
/// # Example
///
/// ```rust
/// use transformers_lightning_rs::LightningConfig;
///
/// # fn main() -> transformers_lightning_rs::Result<()> {
/// let yaml = r#"
/// learning_rate: 1.0e-4
/// scheduler:
///   policy: cosine_with_hard_restarts
///   num_warmup_steps: 5
///   num_training_steps: 20
///   num_cycles: 2.0
/// retrieval:
///   metrics:
///     - name: hit_rate
///       k: 1
/// "#;
/// let config: LightningConfig = serde_yaml::from_str(yaml)?;
/// config.validate()?;
///
/// let schedule = config.build_schedule()?;
/// assert_eq!(schedule.factor_at(5), 1.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightningConfig {
    /// Base learning rate the schedule factor multiplies.
    #[serde(default = "default_lr")]
    pub learning_rate: f64,

    /// Last completed step (`-1` for a fresh run).
    #[serde(default = "default_last_step")]
    pub last_step: i64,

    /// Learning rate schedule.
    pub scheduler: SchedulePolicy,

    /// Per-layer base rate decay (used with polynomial decay).
    #[serde(default)]
    pub layerwise: Option<LayerwiseSettings>,

    /// Retrieval evaluation.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_lr() -> f64 {
    1e-4
}

fn default_last_step() -> i64 {
    -1
}

/// Layerwise learning rate decay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerwiseSettings {
    /// Multiplier applied once per layer below the head.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Number of transformer layers.
    pub num_layers: usize,
}

fn default_decay_rate() -> f64 {
    0.8
}

/// Retrieval metric settings.
///
/// # Example
///
/// ```rust
/// use transformers_lightning_rs::config::RetrievalConfig;
/// use transformers_lightning_rs::metrics::{EmptyTargetAction, MetricKind};
///
/// let retrieval = RetrievalConfig {
///     metrics: vec![MetricKind::HitRate { k: 5 }, MetricKind::ReciprocalRank],
///     empty_target_action: EmptyTargetAction::Neg,
///     ..Default::default()
/// };
///
/// assert_eq!(retrieval.exclude, Some(-100));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Metrics to compute.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricKind>,

    /// What to do with queries lacking a positive target.
    #[serde(default)]
    pub empty_target_action: EmptyTargetAction,

    /// Relevance value to ignore (`null` to keep everything).
    #[serde(default = "default_exclude")]
    pub exclude: Option<i64>,
}

fn default_metrics() -> Vec<MetricKind> {
    vec![MetricKind::HitRate { k: 1 }]
}

#[allow(clippy::unnecessary_wraps)]
fn default_exclude() -> Option<i64> {
    Some(DEFAULT_EXCLUDE)
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            empty_target_action: EmptyTargetAction::default(),
            exclude: default_exclude(),
        }
    }
}

impl LightningConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a configuration from a preset.
    ///
    /// Available presets:
    /// - `"cosine-restarts"` - short cosine schedule with two hard restarts
    /// - `"linear-warmup"` - BERT-style linear warmup and decay
    /// - `"electra-layerwise"` - polynomial decay with layerwise base rates
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown preset name.
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "cosine-restarts" => Ok(Self::cosine_restarts_preset()),
            "linear-warmup" => Ok(Self::linear_warmup_preset()),
            "electra-layerwise" => Ok(Self::electra_layerwise_preset()),
            _ => Err(LightningError::Config(format!("Unknown preset: {preset}"))),
        }
    }

    /// Cosine schedule with hard restarts over 20 steps.
    #[must_use]
    pub fn cosine_restarts_preset() -> Self {
        Self {
            learning_rate: 1e-4,
            last_step: -1,
            scheduler: SchedulePolicy::CosineWithHardRestarts {
                num_warmup_steps: 5,
                num_training_steps: 20,
                num_cycles: 2.0,
            },
            layerwise: None,
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Linear warmup then linear decay, answer-selection metrics.
    #[must_use]
    pub fn linear_warmup_preset() -> Self {
        Self {
            learning_rate: 2e-5,
            last_step: -1,
            scheduler: SchedulePolicy::LinearWithWarmup {
                num_warmup_steps: 1_000,
                num_training_steps: 10_000,
            },
            layerwise: None,
            retrieval: RetrievalConfig {
                metrics: vec![
                    MetricKind::HitRate { k: 1 },
                    MetricKind::ReciprocalRank,
                    MetricKind::AveragePrecision,
                ],
                ..Default::default()
            },
        }
    }

    /// ELECTRA-style polynomial decay with layerwise learning rates.
    #[must_use]
    pub fn electra_layerwise_preset() -> Self {
        Self {
            learning_rate: 1e-4,
            last_step: -1,
            scheduler: SchedulePolicy::PolynomialDecayWithWarmup {
                num_warmup_steps: 10_000,
                num_training_steps: 100_000,
                power: 1.0,
            },
            layerwise: Some(LayerwiseSettings {
                decay_rate: default_decay_rate(),
                num_layers: 12,
            }),
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Build the schedule, positioned after `last_step`.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule parameters are invalid.
    pub fn build_schedule(&self) -> Result<LrSchedule> {
        LrSchedule::with_last_step(self.scheduler.clone(), self.last_step)
    }

    /// Build the layerwise decay, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the layerwise settings are invalid.
    pub fn build_layerwise(&self) -> Result<Option<LayerwiseDecay>> {
        self.layerwise
            .as_ref()
            .map(|l| LayerwiseDecay::new(l.decay_rate, l.num_layers))
            .transpose()
    }

    /// Base learning rates per parameter group: one per layer depth when
    /// layerwise decay is configured, otherwise just `learning_rate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layerwise settings are invalid.
    pub fn base_lrs(&self) -> Result<Vec<f64>> {
        Ok(match self.build_layerwise()? {
            Some(decay) => decay.base_lrs(self.learning_rate),
            None => vec![self.learning_rate],
        })
    }

    /// Build every configured retrieval metric.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric has a non-positive `k`.
    pub fn build_metrics(&self) -> Result<Vec<RetrievalMetric>> {
        self.retrieval
            .metrics
            .iter()
            .map(|kind| {
                RetrievalMetric::from_kind(kind).map(|m| {
                    m.with_empty_target_action(self.retrieval.empty_target_action)
                        .with_exclude(self.retrieval.exclude)
                })
            })
            .collect()
    }

    /// Validate the configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use transformers_lightning_rs::LightningConfig;
    ///
    /// let mut config = LightningConfig::from_preset("linear-warmup").unwrap();
    /// assert!(config.validate().is_ok());
    ///
    /// // This will fail validation
    /// config.learning_rate = 0.0;
    /// assert!(config.validate().is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(LightningError::Config(
                "learning_rate must be a positive finite number".into(),
            ));
        }

        self.build_schedule()?;
        self.build_layerwise()?;

        if self.retrieval.metrics.is_empty() {
            return Err(LightningError::Config(
                "retrieval.metrics must list at least one metric".into(),
            ));
        }
        self.build_metrics()?;

        Ok(())
    }
}
