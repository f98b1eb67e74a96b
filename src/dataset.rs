//! Evaluation input loading.
//!
//! Retrieval predictions are stored as JSONL, one scored candidate per line:
//!
//! ```text
//! {"group": 0, "score": 0.5, "label": true}
//! {"group": "q-17", "score": 0.1, "label": 0}
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LightningError, Result};
use crate::metrics::{GroupedScore, RetrievalMetric};

/// Query identifier: integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupKey {
    /// Numeric id
    Int(i64),
    /// String id
    Str(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => write!(f, "{id}"),
        }
    }
}

/// Relevance label: boolean or integer.
#[derive(Deserialize)]
#[serde(untagged)]
enum Label {
    Bool(bool),
    Int(i64),
}

impl From<Label> for i64 {
    fn from(label: Label) -> Self {
        match label {
            Label::Bool(b) => i64::from(b),
            Label::Int(i) => i,
        }
    }
}

#[derive(Deserialize)]
struct Record {
    group: GroupKey,
    score: f64,
    label: Label,
}

/// Flat retrieval predictions, ready for [`RetrievalMetric`].
///
/// # Example
///
/// ```rust
/// use transformers_lightning_rs::dataset::RetrievalSet;
/// use transformers_lightning_rs::metrics::RetrievalMetric;
///
/// # fn main() -> transformers_lightning_rs::Result<()> {
/// let set = RetrievalSet::parse(
///     r#"{"group": 1, "score": 0.9, "label": false}
/// {"group": 1, "score": 0.4, "label": true}"#,
/// )?;
///
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.evaluate(&RetrievalMetric::hit_rate(2)?)?, 1.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalSet {
    /// Query of each entry.
    pub group_ids: Vec<GroupKey>,
    /// Model score of each entry.
    pub predictions: Vec<f64>,
    /// Relevance label of each entry.
    pub relevance: Vec<i64>,
}

impl RetrievalSet {
    /// Load a JSONL file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or a line cannot be parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LightningError::Data(format!(
                "Evaluation input not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let set = Self::parse(&content)?;
        tracing::info!(entries = set.len(), "Loaded evaluation input from {:?}", path);
        Ok(set)
    }

    /// Parse JSONL content. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LightningError::Data`] naming the first malformed line.
    pub fn parse(content: &str) -> Result<Self> {
        let mut set = Self::default();

        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(line).map_err(|e| {
                LightningError::Data(format!("Failed to parse line {}: {e}", i + 1))
            })?;

            set.push(record.group, record.score, record.label.into());
        }

        Ok(set)
    }

    /// Append one entry.
    pub fn push(&mut self, group: GroupKey, score: f64, label: i64) {
        self.group_ids.push(group);
        self.predictions.push(score);
        self.relevance.push(label);
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.group_ids.len()
    }

    /// Whether the set has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty()
    }

    /// Evaluate a metric over the whole set.
    ///
    /// # Errors
    ///
    /// See [`RetrievalMetric::compute`].
    pub fn evaluate(&self, metric: &RetrievalMetric) -> Result<f64> {
        metric.compute(&self.group_ids, &self.predictions, &self.relevance)
    }

    /// `(sum, count)` for cross-shard reduction.
    ///
    /// # Errors
    ///
    /// See [`RetrievalMetric::compute_partial`].
    pub fn evaluate_partial(&self, metric: &RetrievalMetric) -> Result<GroupedScore> {
        metric.compute_partial(&self.group_ids, &self.predictions, &self.relevance)
    }
}
