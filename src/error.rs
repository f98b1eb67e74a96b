//! Error types for transformers-lightning-rs.
//!
//! Two families of failure exist: configuration errors, raised when a
//! schedule or metric is constructed with invalid static parameters, and
//! data errors, raised at call time when inputs are malformed.
//!
//! # Example - Pattern Matching
//!
//! ```rust
//! use transformers_lightning_rs::{LightningError, RetrievalMetric};
//!
//! match RetrievalMetric::hit_rate(0) {
//!     Ok(_) => unreachable!(),
//!     Err(LightningError::Config(msg)) => assert!(msg.contains("k")),
//!     Err(e) => panic!("unexpected error: {e}"),
//! }
//! ```

use thiserror::Error;

/// Result type alias for transformers-lightning-rs operations.
pub type Result<T> = std::result::Result<T, LightningError>;

/// Errors that can occur in transformers-lightning-rs.
///
/// # Example
///
/// ```rust
/// use transformers_lightning_rs::{LightningError, Result};
///
/// fn check_lengths(a: &[f64], b: &[i64]) -> Result<()> {
///     if a.len() != b.len() {
///         return Err(LightningError::Data("length mismatch".to_string()));
///     }
///     Ok(())
/// }
///
/// assert!(check_lengths(&[0.1], &[]).is_err());
/// assert!(check_lengths(&[0.1], &[1]).is_ok());
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LightningError {
    /// Invalid static parameters (schedule or metric construction).
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid config file.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Malformed call-time input.
    #[error("data error: {0}")]
    Data(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle error.
    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}
