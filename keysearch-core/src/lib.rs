// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Keysearch Core Library
//!
//! Recovers a stream-cipher key by exhaustively testing a constrained key space
//! against a ciphertext whose plaintext starts with a known prefix.
//!
//! # Architecture
//!
//! The library is organized into modules representing core concerns:
//! - `keyspace`: Per-byte constraint model and key-space arithmetic
//! - `enumerator`: Ordered, gap-free candidate stream and batching
//! - `dispatcher`: Feeds batches into the bounded work queue
//! - `worker`: Pool members and the first-match result sink
//! - `search`: Engine wiring the pool together and reporting the outcome
//! - `cipher`: Swappable keystream cipher primitive (RC4)
//! - `estimate`: Throughput calibration and duration projection
//! - `config`: Job files and engine settings with validation
//! - `error`: Unified error types
//!
//! # Example
//!
//! ```no_run
//! use keysearch_core::{EngineSettings, JobConfig, SearchEngine};
//! use std::sync::Arc;
//!
//! let job = JobConfig::sample();
//! let cipher = Arc::new(job.cipher());
//! let engine = SearchEngine::new(cipher, job.into_job()?, EngineSettings::default())?;
//! let report = engine.run()?;
//! if let Some(found) = report.first_match() {
//!     println!("{}", found.plaintext_lossy());
//! }
//! # Ok::<(), keysearch_core::Error>(())
//! ```

pub mod cancel;
pub mod cipher;
pub mod config;
pub mod dispatcher;
pub mod enumerator;
pub mod error;
pub mod estimate;
pub mod job;
pub mod keyspace;
pub mod metrics;
pub mod search;
pub mod worker;

pub use cancel::CancelToken;
pub use cipher::{KeystreamCipher, Rc4};
pub use crate::config::{EngineSettings, JobConfig};
pub use error::{Error, Result};
pub use estimate::{Calibration, Estimate, Estimator};
pub use job::SearchJob;
pub use keyspace::{KeyConstraints, Position};
pub use search::{KeyMatch, SearchEngine, SearchOutcome, SearchReport, StopPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default keys per batch
pub const DEFAULT_BATCH_SIZE: usize = 65_536;

/// Default work queue capacity in batches
pub const DEFAULT_QUEUE_DEPTH: usize = 2;

/// Upper bound on the worker pool
pub const MAX_WORKERS: usize = 1024;

/// Upper bound on keys per batch (batches are allocated up front)
pub const MAX_BATCH_SIZE: usize = 1 << 22;

/// Upper bound on the work queue capacity
pub const MAX_QUEUE_DEPTH: usize = 1024;

/// Length of the all-free key used to calibrate the estimator (2^24 keys)
pub const CALIBRATION_KEY_BYTES: usize = 3;

/// Default progress log interval
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 2_000;
