// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Worker pool members and the result sink they publish to
//!
//! Each worker owns its cipher scratch state and prefix buffer, so the hot
//! loop takes no locks. Shared inputs (ciphertext, pattern, constraints) are
//! read-only for the lifetime of the search.

use crate::cancel::CancelToken;
use crate::cipher::KeystreamCipher;
use crate::enumerator::Batch;
use crate::job::SearchJob;
use crate::metrics::SearchMetrics;
use crate::search::StopPolicy;
use crate::Result;
use crossbeam::channel::{select, Receiver, Sender};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// A candidate key whose decryption starts with the known plaintext
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMatch {
    /// Position of the key in enumeration order
    pub index: u64,
    pub key: Vec<u8>,
    /// Per-position values before offsets were applied
    pub raw: Vec<u8>,
    pub plaintext: Vec<u8>,
    /// Worker that found it
    pub worker: usize,
}

impl KeyMatch {
    pub fn plaintext_lossy(&self) -> String {
        String::from_utf8_lossy(&self.plaintext).into_owned()
    }
}

/// Completion channel shared by all workers.
///
/// Under `StopPolicy::First` only the first publish is delivered; later
/// matches from racing workers are dropped.
#[derive(Clone)]
pub struct ResultSink {
    tx: Sender<KeyMatch>,
    policy: StopPolicy,
    published: Arc<AtomicBool>,
}

impl ResultSink {
    pub fn new(tx: Sender<KeyMatch>, policy: StopPolicy) -> Self {
        Self {
            tx,
            policy,
            published: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn policy(&self) -> StopPolicy {
        self.policy
    }

    /// Returns true if the match was delivered to the consumer
    pub fn publish(&self, found: KeyMatch) -> bool {
        if self.policy == StopPolicy::First && self.published.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.send(found).is_ok()
    }
}

pub struct Worker<C: KeystreamCipher> {
    id: usize,
    cipher: Arc<C>,
    job: SearchJob,
    scratch: C::Scratch,
    prefix: Vec<u8>,
    sink: ResultSink,
    cancel: CancelToken,
    metrics: SearchMetrics,
}

impl<C: KeystreamCipher> Worker<C> {
    pub fn new(
        id: usize,
        cipher: Arc<C>,
        job: SearchJob,
        sink: ResultSink,
        cancel: CancelToken,
        metrics: SearchMetrics,
    ) -> Self {
        let scratch = cipher.new_scratch();
        let prefix = vec![0u8; job.pattern().len()];

        Self {
            id,
            cipher,
            job,
            scratch,
            prefix,
            sink,
            cancel,
            metrics,
        }
    }

    /// Test every key of a batch; returns how many were tested before a cancel
    pub fn test_batch(&mut self, batch: &Batch) -> usize {
        for (i, key) in batch.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return i;
            }

            self.cipher
                .decrypt_into(key, self.job.ciphertext(), &mut self.scratch, &mut self.prefix);

            if self.prefix.as_slice() == self.job.pattern() {
                self.report(batch.start_index() + i as u64, key);
            }
        }
        batch.len()
    }

    fn report(&self, index: u64, key: &[u8]) {
        self.metrics.record_match();
        if self.sink.policy() == StopPolicy::Count {
            return;
        }

        let plaintext = self.cipher.decrypt(key, self.job.ciphertext());
        info!(
            "Worker {} found matching key {} at index {}",
            self.id,
            hex::encode(key),
            index
        );

        let found = KeyMatch {
            index,
            key: key.to_vec(),
            raw: self.job.constraints().raw_values(key),
            plaintext,
            worker: self.id,
        };
        if !self.sink.publish(found) {
            debug!("Worker {}: match not delivered, result already published", self.id);
        }
    }

    /// Drain the work queue until it is closed or the search is cancelled
    pub fn run(mut self, rx: Receiver<Batch>) {
        let cancelled = self.cancel.signal().clone();

        loop {
            select! {
                recv(rx) -> msg => match msg {
                    Ok(batch) => {
                        let tested = self.test_batch(&batch);
                        let complete = tested == batch.len();
                        self.metrics.record_tested(tested, complete);
                        if !complete {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(cancelled) -> _ => break,
            }
        }

        debug!("Worker {} exiting", self.id);
    }

    /// Run on a dedicated thread
    pub fn spawn(self, rx: Receiver<Batch>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name(format!("keysearch-worker-{}", self.id))
            .spawn(move || self.run(rx))?;
        Ok(handle)
    }
}
