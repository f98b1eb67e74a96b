//! Per-query scoring functions.

use serde::{Deserialize, Serialize};

use crate::error::{LightningError, Result};

/// Scores a single query.
///
/// The group holds `(prediction, relevance)` pairs in input order, with
/// excluded entries already removed. It is guaranteed to contain at least
/// one positive (`relevance > 0`) entry.
///
/// Closures `Fn(&[(f64, i64)]) -> f64` implement this trait, so ad-hoc
/// metrics can be plugged into [`grouped_mean`](super::grouped_mean).
pub trait GroupScorer {
    /// Score for one query.
    fn score(&self, group: &[(f64, i64)]) -> f64;
}

impl<F> GroupScorer for F
where
    F: Fn(&[(f64, i64)]) -> f64,
{
    fn score(&self, group: &[(f64, i64)]) -> f64 {
        self(group)
    }
}

/// Relevance labels sorted by descending prediction.
///
/// The sort is stable, so ties keep their input order.
fn ranked(group: &[(f64, i64)]) -> Vec<i64> {
    let mut sorted = group.to_vec();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));
    sorted.into_iter().map(|(_, rel)| rel).collect()
}

fn hits_in_top(group: &[(f64, i64)], k: usize) -> usize {
    ranked(group).into_iter().take(k).filter(|&r| r > 0).count()
}

fn positives(group: &[(f64, i64)]) -> usize {
    group.iter().filter(|&&(_, r)| r > 0).count()
}

fn check_k(k: usize) -> Result<usize> {
    if k == 0 {
        return Err(LightningError::Config(
            "`k` must be an integer greater than 0".into(),
        ));
    }
    Ok(k)
}

/// `1.0` if a positive appears in the top `k`, else `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRate {
    k: usize,
}

impl HitRate {
    /// # Errors
    ///
    /// Returns an error if `k == 0`.
    pub fn new(k: usize) -> Result<Self> {
        check_k(k).map(|k| Self { k })
    }

    /// Cutoff.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }
}

impl GroupScorer for HitRate {
    fn score(&self, group: &[(f64, i64)]) -> f64 {
        if hits_in_top(group, self.k) > 0 {
            1.0
        } else {
            0.0
        }
    }
}

/// Fraction of the top `k` that is relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionAtK {
    k: usize,
    adaptive_k: bool,
}

impl PrecisionAtK {
    /// With `adaptive_k`, queries with fewer than `k` entries divide by
    /// their size instead of `k`.
    ///
    /// # Errors
    ///
    /// Returns an error if `k == 0`.
    pub fn new(k: usize, adaptive_k: bool) -> Result<Self> {
        check_k(k).map(|k| Self { k, adaptive_k })
    }
}

impl GroupScorer for PrecisionAtK {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, group: &[(f64, i64)]) -> f64 {
        let denom = if self.adaptive_k {
            self.k.min(group.len())
        } else {
            self.k
        };
        hits_in_top(group, self.k) as f64 / denom as f64
    }
}

/// Fraction of all relevant entries found in the top `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallAtK {
    k: usize,
}

impl RecallAtK {
    /// # Errors
    ///
    /// Returns an error if `k == 0`.
    pub fn new(k: usize) -> Result<Self> {
        check_k(k).map(|k| Self { k })
    }
}

impl GroupScorer for RecallAtK {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, group: &[(f64, i64)]) -> f64 {
        let total = positives(group);
        if total == 0 {
            return 0.0;
        }
        hits_in_top(group, self.k) as f64 / total as f64
    }
}

/// Inverse rank of the first relevant entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReciprocalRank;

impl GroupScorer for ReciprocalRank {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, group: &[(f64, i64)]) -> f64 {
        ranked(group)
            .into_iter()
            .position(|r| r > 0)
            .map_or(0.0, |pos| 1.0 / (pos + 1) as f64)
    }
}

/// Mean of the precision at each relevant entry's rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AveragePrecision;

impl GroupScorer for AveragePrecision {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, group: &[(f64, i64)]) -> f64 {
        let mut hits = 0usize;
        let mut total = 0.0;
        for (i, rel) in ranked(group).into_iter().enumerate() {
            if rel > 0 {
                hits += 1;
                total += hits as f64 / (i + 1) as f64;
            }
        }
        if hits == 0 {
            return 0.0;
        }
        total / hits as f64
    }
}

/// A validated built-in scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scorer {
    /// Hit rate at k
    HitRate(HitRate),
    /// Precision at k
    Precision(PrecisionAtK),
    /// Recall at k
    Recall(RecallAtK),
    /// Reciprocal rank
    ReciprocalRank(ReciprocalRank),
    /// Average precision
    AveragePrecision(AveragePrecision),
}

impl Scorer {
    /// Display label, e.g. `precision@5` or `mrr`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::HitRate(s) => format!("hit_rate@{}", s.k),
            Self::Precision(s) => format!("precision@{}", s.k),
            Self::Recall(s) => format!("recall@{}", s.k),
            Self::ReciprocalRank(_) => "mrr".to_string(),
            Self::AveragePrecision(_) => "map".to_string(),
        }
    }
}

impl GroupScorer for Scorer {
    fn score(&self, group: &[(f64, i64)]) -> f64 {
        match self {
            Self::HitRate(s) => s.score(group),
            Self::Precision(s) => s.score(group),
            Self::Recall(s) => s.score(group),
            Self::ReciprocalRank(s) => s.score(group),
            Self::AveragePrecision(s) => s.score(group),
        }
    }
}

/// Metric description as written in config files.
///
/// ```yaml
/// - name: hit_rate
///   k: 1
/// - name: precision
///   k: 5
///   adaptive_k: true
/// - name: reciprocal_rank
/// ```
///
/// `k` is parsed as a signed integer so that non-positive values surface
/// as configuration errors from [`MetricKind::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum MetricKind {
    /// Hit rate at k.
    HitRate {
        /// Cutoff
        k: i64,
    },
    /// Precision at k.
    Precision {
        /// Cutoff
        k: i64,
        /// Divide by the query size when it is smaller than `k`
        #[serde(default)]
        adaptive_k: bool,
    },
    /// Recall at k.
    Recall {
        /// Cutoff
        k: i64,
    },
    /// Mean reciprocal rank.
    ReciprocalRank,
    /// Mean average precision.
    AveragePrecision,
}

impl MetricKind {
    /// Validate and build the scorer.
    ///
    /// # Errors
    ///
    /// Returns [`LightningError::Config`] if `k <= 0`.
    pub fn build(&self) -> Result<Scorer> {
        match *self {
            Self::HitRate { k } => HitRate::new(positive_k(k)?).map(Scorer::HitRate),
            Self::Precision { k, adaptive_k } => {
                PrecisionAtK::new(positive_k(k)?, adaptive_k).map(Scorer::Precision)
            }
            Self::Recall { k } => RecallAtK::new(positive_k(k)?).map(Scorer::Recall),
            Self::ReciprocalRank => Ok(Scorer::ReciprocalRank(ReciprocalRank)),
            Self::AveragePrecision => Ok(Scorer::AveragePrecision(AveragePrecision)),
        }
    }
}

fn positive_k(k: i64) -> Result<usize> {
    usize::try_from(k)
        .ok()
        .filter(|&k| k > 0)
        .ok_or_else(|| LightningError::Config(format!("`k` must be greater than 0, got {k}")))
}
