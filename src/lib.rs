//! # Castle Pipeline
//!
//! Bounded-concurrency batch processing with per-item failure isolation and
//! idempotent keyed persistence, plus the castle narrative layer built on top.
//!
//! ## Overview
//!
//! A [`batch::BatchDispatcher`] slices an ordered item list into fixed-size
//! batches. Every item of a batch runs as its own task; the dispatcher waits
//! for the whole batch to settle before moving on, so batches never overlap.
//! Failed items are logged and reported, never retried, and never abort their
//! siblings. Each success is upserted into a [`sink::ResultSink`] keyed by the
//! item's natural key, so re-running the same items overwrites instead of
//! duplicating.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use castle_pipeline::batch::{BatchDispatcher, DispatcherConfig};
//! use castle_pipeline::sink::{MemorySink, OutcomeRecord};
//! use serde_json::json;
//!
//! # async fn example() -> castle_pipeline::Result<()> {
//! let sink = Arc::new(MemorySink::new());
//! let dispatcher = BatchDispatcher::new(DispatcherConfig::default().with_batch_size(2), sink.clone());
//!
//! let items = vec!["X1".to_string(), "X2".to_string(), "X3".to_string()];
//! let summary = dispatcher
//!     .run(items, |key: String| async move {
//!         Ok::<_, String>(OutcomeRecord::new(key, json!({"ok": true}), 1.0))
//!     })
//!     .await?;
//!
//! assert_eq!(summary.total_succeeded, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`batch`]: partitioning, dispatch, observers, run control and retries
//! - [`sink`]: outcome records and keyed persistence (memory, SQLite)
//! - [`metrics`]: prometheus observer computed from real run events
//! - [`config`]: pipeline configuration from JSON files and environment
//! - [`telemetry`]: tracing subscriber setup
//! - [`castle`]: castle data model, translation, quality and narratives

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for pipeline operations
///
/// Per-item failures never show up here; they are absorbed by the dispatcher
/// and reported through [`batch::ProcessingSummary::failures`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid batch size, sink settings or other malformed configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Persistence layer failure that the caller asked to be fatal
    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Batch partitioning, dispatch and progress reporting
pub mod batch;

/// Outcome records and keyed persistence
pub mod sink;

/// Prometheus metrics observer
pub mod metrics;

/// Pipeline configuration
pub mod config;

/// Tracing subscriber setup
pub mod telemetry;

/// Castle data model and narrative generation
pub mod castle;
