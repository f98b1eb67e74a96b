//! # transformers-lightning-rs
//!
//! Learning-rate schedules and grouped retrieval metrics for transformer
//! fine-tuning, meant to sit next to a training framework rather than
//! replace it.
//!
//! ## Features
//!
//! - **Schedules** - constant, linear, cosine and cosine-with-hard-restarts,
//!   polynomial decay, all with optional linear warmup and resumable cursors
//! - **Layerwise decay** - per-layer base learning rates
//! - **Retrieval metrics** - hit rate, precision, recall, MRR and MAP,
//!   grouped by query with configurable handling of queries without
//!   positive targets
//! - **YAML configuration** and a small CLI for inspecting schedules and
//!   evaluating prediction files
//!
//! ## Quick Start (CLI)
//!
//! ```bash
//! # Write a sample configuration
//! transformers-lightning init config.yaml --preset cosine-restarts
//!
//! # Print the learning rate for every step
//! transformers-lightning schedule config.yaml
//!
//! # Evaluate a JSONL file of {"group", "score", "label"} records
//! transformers-lightning evaluate config.yaml --input preds.jsonl
//! ```
//!
//! ## Quick Start (Library)
//!
//! ```rust
//! use transformers_lightning_rs::scheduler::{LrSchedule, SchedulePolicy};
//! use transformers_lightning_rs::RetrievalMetric;
//!
//! # fn main() -> transformers_lightning_rs::Result<()> {
//! let mut schedule = LrSchedule::new(SchedulePolicy::CosineWithWarmup {
//!     num_warmup_steps: 100,
//!     num_training_steps: 1000,
//!     num_cycles: 0.5,
//! })?;
//! let base_lr = 2e-5;
//! for _ in 0..10 {
//!     let lr = base_lr * schedule.step();
//!     assert!(lr <= base_lr);
//! }
//!
//! let hit_rate = RetrievalMetric::hit_rate(1)?;
//! let score = hit_rate.compute(&[0, 0, 1, 1], &[0.9, 0.1, 0.3, 0.7], &[1, 0, 1, 0])?;
//! assert_eq!(score, 0.5);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
#[cfg(feature = "candle")]
pub mod framework;
pub mod metrics;
pub mod scheduler;

pub use config::LightningConfig;
pub use error::{LightningError, Result};
pub use metrics::{EmptyTargetAction, GroupedScore, RetrievalAccumulator, RetrievalMetric};
pub use scheduler::{LayerwiseDecay, LrSchedule, SchedulePolicy};
