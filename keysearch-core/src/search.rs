// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Parallel search engine
//!
//! Wires one dispatcher and a fixed pool of workers together through a bounded
//! work queue, then waits on the result channel. The channel disconnects once
//! every worker has exited, which is how exhaustion is told apart from a
//! search still in progress.
//!
//! # Ordering
//!
//! Keys are enumerated in a fixed order but batches are tested by whichever
//! worker is free, so under `StopPolicy::First` the reported key is the first
//! one *discovered*, not necessarily the lowest enumeration index. Use
//! `StopPolicy::All` to scan the whole space and get every match sorted by index.

use crate::cancel::CancelToken;
use crate::cipher::KeystreamCipher;
use crate::config::EngineSettings;
use crate::dispatcher::Dispatcher;
use crate::enumerator::{Batch, KeyEnumerator};
use crate::job::SearchJob;
use crate::metrics::SearchMetrics;
use crate::worker::{ResultSink, Worker};
use crate::{Error, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use crate::worker::KeyMatch;

/// When the pool stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// Stop at the first match discovered
    #[default]
    First,
    /// Scan the whole space and report every match
    All,
    /// Scan the whole space and only count matches; used for timing runs
    Count,
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOutcome {
    /// At least one key matched
    Found,
    /// Every candidate was tested without a match
    Exhausted,
    /// Cancelled from outside before completion
    Cancelled,
}

/// Result of a search run
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    pub matches: Vec<KeyMatch>,
    pub key_space_size: u128,
    pub keys_tested: u64,
    pub batches_dispatched: u64,
    pub workers: usize,
    pub elapsed: Duration,
}

impl SearchReport {
    pub fn is_found(&self) -> bool {
        self.outcome == SearchOutcome::Found
    }

    pub fn first_match(&self) -> Option<&KeyMatch> {
        self.matches.first()
    }

    pub fn keys_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.keys_tested as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct SearchEngine<C: KeystreamCipher> {
    cipher: Arc<C>,
    job: SearchJob,
    settings: EngineSettings,
    key_space_size: u128,
    cancel: CancelToken,
    metrics: SearchMetrics,
}

impl<C: KeystreamCipher> SearchEngine<C> {
    /// Validate everything up front; no thread is started on error
    pub fn new(cipher: Arc<C>, job: SearchJob, settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        cipher.check(job.key_len(), job.ciphertext().len())?;

        let plaintext_len = cipher.plaintext_len(job.ciphertext().len());
        if job.pattern().len() > plaintext_len {
            return Err(Error::Cipher(format!(
                "Known plaintext ({} bytes) is longer than the decrypted payload ({} bytes)",
                job.pattern().len(),
                plaintext_len
            )));
        }

        let key_space_size = job.constraints().key_space_size()?;

        Ok(Self {
            cipher,
            job,
            settings,
            key_space_size,
            cancel: CancelToken::new(),
            metrics: SearchMetrics::new(),
        })
    }

    /// Handle for cancelling the run from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> SearchMetrics {
        self.metrics.clone()
    }

    pub fn key_space_size(&self) -> u128 {
        self.key_space_size
    }

    /// Run the search to a match, exhaustion or cancellation
    pub fn run(self) -> Result<SearchReport> {
        let settings = &self.settings;
        self.metrics.mark_started();
        info!(
            "Searching {} candidate keys with {}: {} workers, batch size {}, queue depth {}",
            self.key_space_size,
            self.cipher.name(),
            settings.workers,
            settings.batch_size,
            settings.queue_depth
        );

        let (work_tx, work_rx) = channel::bounded::<Batch>(settings.queue_depth);
        let (match_tx, match_rx) = channel::unbounded::<KeyMatch>();
        let sink = ResultSink::new(match_tx, settings.stop_policy);

        let mut workers = Vec::with_capacity(settings.workers);
        for id in 0..settings.workers {
            let worker = Worker::new(
                id,
                Arc::clone(&self.cipher),
                self.job.clone(),
                sink.clone(),
                self.cancel.clone(),
                self.metrics.clone(),
            );
            workers.push(worker.spawn(work_rx.clone())?);
        }
        drop(work_rx);
        drop(sink);

        let dispatcher = Dispatcher::new(
            KeyEnumerator::new(self.job.shared_constraints()),
            settings.batch_size,
            work_tx,
            self.cancel.clone(),
            self.metrics.clone(),
        )
        .spawn()?;

        let mut matches = Vec::new();
        let mut stopped_on_match = false;
        loop {
            match match_rx.recv_timeout(settings.progress_interval()) {
                Ok(found) => {
                    matches.push(found);
                    if settings.stop_policy == StopPolicy::First {
                        stopped_on_match = true;
                        self.cancel.cancel();
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.log_progress(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let summary = dispatcher
            .join()
            .map_err(|_| Error::Internal("dispatcher thread panicked".to_string()))?;
        for handle in workers {
            handle
                .join()
                .map_err(|_| Error::Internal("worker thread panicked".to_string()))?;
        }

        let outcome = if stopped_on_match {
            SearchOutcome::Found
        } else if self.cancel.is_cancelled() {
            warn!("Search cancelled after {} keys", self.metrics.keys_tested());
            SearchOutcome::Cancelled
        } else if matches.is_empty() && self.metrics.matches() == 0 {
            SearchOutcome::Exhausted
        } else {
            SearchOutcome::Found
        };
        matches.sort_by_key(|m| m.index);

        let report = SearchReport {
            outcome,
            matches,
            key_space_size: self.key_space_size,
            keys_tested: self.metrics.keys_tested(),
            batches_dispatched: summary.batches,
            workers: settings.workers,
            elapsed: self.metrics.elapsed(),
        };

        info!(
            "Search finished ({:?}): {} keys tested in {:.2}s ({:.0} keys/s), {} match(es)",
            report.outcome,
            report.keys_tested,
            report.elapsed.as_secs_f64(),
            report.keys_per_second(),
            report.matches.len()
        );

        Ok(report)
    }

    fn log_progress(&self) {
        info!(
            "Progress: {}/{} keys ({:.2}%) | Rate: {:.0} keys/s | Matches: {}",
            self.metrics.keys_tested(),
            self.key_space_size,
            self.metrics.percent_of(self.key_space_size),
            self.metrics.keys_per_second(),
            self.metrics.matches()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::Rc4;
    use crate::keyspace::KeyConstraints;

    fn settings(workers: usize, stop_policy: StopPolicy) -> EngineSettings {
        EngineSettings {
            workers,
            batch_size: 64,
            queue_depth: 1,
            stop_policy,
            progress_interval_ms: 50,
        }
    }

    fn two_byte_job(key: [u8; 2]) -> SearchJob {
        let ciphertext = Rc4::new().encrypt(&key, b"secret: 42");
        SearchJob::new(ciphertext, b"secret:".to_vec(), KeyConstraints::all_free(2).unwrap())
            .unwrap()
    }

    #[test]
    fn test_finds_key() {
        let engine =
            SearchEngine::new(Arc::new(Rc4::new()), two_byte_job([0x13, 0x37]), settings(4, StopPolicy::First))
                .unwrap();
        let report = engine.run().unwrap();

        assert_eq!(report.outcome, SearchOutcome::Found);
        let found = report.first_match().unwrap();
        assert_eq!(found.plaintext, b"secret: 42");
        assert_eq!(found.key, vec![0x13, 0x37]);
        assert_eq!(found.index, 0x1337);
    }

    #[test]
    fn test_scan_all_tests_every_key() {
        let engine =
            SearchEngine::new(Arc::new(Rc4::new()), two_byte_job([0xfe, 0x01]), settings(3, StopPolicy::All))
                .unwrap();
        let report = engine.run().unwrap();

        assert_eq!(report.outcome, SearchOutcome::Found);
        assert_eq!(report.keys_tested, 65_536);
        assert_eq!(report.batches_dispatched, 1024);
        assert!(report.matches.iter().any(|m| m.key == vec![0xfe, 0x01]));
        assert!(report.matches.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn test_pattern_longer_than_payload_rejected() {
        let job = SearchJob::new(vec![1, 2, 0], b"abc".to_vec(), KeyConstraints::all_free(1).unwrap())
            .unwrap();
        let err = SearchEngine::new(Arc::new(Rc4::with_trailer(1)), job, EngineSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Cipher(_)));
    }

    #[test]
    fn test_count_policy_reports_no_matches() {
        let engine =
            SearchEngine::new(Arc::new(Rc4::new()), two_byte_job([0x00, 0x2a]), settings(2, StopPolicy::Count))
                .unwrap();
        let metrics = engine.metrics();
        let report = engine.run().unwrap();

        assert_eq!(report.outcome, SearchOutcome::Found);
        assert!(report.matches.is_empty());
        assert_eq!(report.keys_tested, 65_536);
        assert!(metrics.matches() >= 1);
    }

    #[test]
    fn test_oversized_settings_rejected_before_start() {
        let mut oversized = settings(2, StopPolicy::First);
        oversized.batch_size = 1 << 60;
        assert!(SearchEngine::new(Arc::new(Rc4::new()), two_byte_job([0, 0]), oversized)
            .err()
            .unwrap()
            .is_config_error());

        let mut oversized = settings(2, StopPolicy::First);
        oversized.queue_depth = 1 << 40;
        assert!(SearchEngine::new(Arc::new(Rc4::new()), two_byte_job([0, 0]), oversized)
            .err()
            .unwrap()
            .is_config_error());
    }

    #[test]
    fn test_elapsed_counts_from_run() {
        let engine =
            SearchEngine::new(Arc::new(Rc4::new()), two_byte_job([0x00, 0x01]), settings(2, StopPolicy::First))
                .unwrap();
        std::thread::sleep(Duration::from_millis(300));
        let report = engine.run().unwrap();
        assert!(report.elapsed < Duration::from_millis(300));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = SearchEngine::new(Arc::new(Rc4::new()), two_byte_job([0, 0]), settings(0, StopPolicy::First))
            .err()
            .unwrap();
        assert!(err.is_config_error());
    }
}
