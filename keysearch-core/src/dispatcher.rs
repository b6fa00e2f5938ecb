// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Dispatcher: feeds enumerated batches into the bounded work queue
//!
//! The queue's capacity is the backpressure mechanism: `send` blocks while the
//! pool is busy. Dropping the sender when the enumeration ends closes the queue,
//! which is the only end-of-stream signal the workers observe.

use crate::cancel::CancelToken;
use crate::enumerator::{Batch, Batches, KeyEnumerator};
use crate::metrics::SearchMetrics;
use crate::Result;
use crossbeam::channel::{select, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// What the dispatcher handed to the pool before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub batches: u64,
    pub keys: u64,
    /// Stopped early because the search was cancelled
    pub cancelled: bool,
}

pub struct Dispatcher {
    batches: Batches,
    tx: Sender<Batch>,
    cancel: CancelToken,
    metrics: SearchMetrics,
}

impl Dispatcher {
    pub fn new(
        enumerator: KeyEnumerator,
        batch_size: usize,
        tx: Sender<Batch>,
        cancel: CancelToken,
        metrics: SearchMetrics,
    ) -> Self {
        Self {
            batches: enumerator.batches(batch_size),
            tx,
            cancel,
            metrics,
        }
    }

    /// Drive the enumeration to completion or cancellation, then close the queue
    pub fn run(self) -> DispatchSummary {
        let Dispatcher {
            batches,
            tx,
            cancel,
            metrics,
        } = self;
        let cancelled = cancel.signal().clone();
        let mut summary = DispatchSummary::default();

        for batch in batches {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let keys = batch.len();
            select! {
                send(tx, batch) -> res => {
                    if res.is_err() {
                        warn!("All workers exited, stopping dispatch");
                        break;
                    }
                    summary.batches += 1;
                    summary.keys += keys as u64;
                    metrics.record_dispatch(keys);
                }
                recv(cancelled) -> _ => {
                    summary.cancelled = true;
                    break;
                }
            }
        }

        drop(tx);

        if summary.cancelled {
            debug!(
                "Dispatcher cancelled after {} batches ({} keys)",
                summary.batches, summary.keys
            );
        } else {
            info!(
                "Dispatched {} batches ({} keys), closing work queue",
                summary.batches, summary.keys
            );
        }

        summary
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> Result<JoinHandle<DispatchSummary>> {
        let handle = thread::Builder::new()
            .name("keysearch-dispatcher".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }
}
