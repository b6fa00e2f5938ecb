// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Keyspace enumeration
//!
//! Walks the constrained key space as a mixed-radix odometer: the right-most
//! free byte is the fastest digit, carries propagate leftwards, and the walk
//! ends when no free byte left of the carry can still be incremented. Every
//! point of the product space is visited exactly once, in a fixed order.

use crate::keyspace::{KeyConstraints, Position};
use std::slice::ChunksExact;
use std::sync::Arc;

/// Odometer over the raw values of a `KeyConstraints` model
#[derive(Debug, Clone)]
pub struct KeyEnumerator {
    constraints: Arc<KeyConstraints>,
    free: Vec<usize>,
    raw: Vec<u8>,
    done: bool,
    emitted: u64,
}

impl KeyEnumerator {
    pub fn new(constraints: Arc<KeyConstraints>) -> Self {
        let free = constraints.free_positions();
        let raw = constraints.positions().iter().map(Position::first_raw).collect();

        Self {
            constraints,
            free,
            raw,
            done: false,
            emitted: 0,
        }
    }

    pub fn constraints(&self) -> &KeyConstraints {
        &self.constraints
    }

    /// Number of keys produced so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Write the next key into `out`; returns false once the space is exhausted.
    ///
    /// `out` must be exactly one key long.
    #[inline]
    pub fn next_into(&mut self, out: &mut [u8]) -> bool {
        if self.done {
            return false;
        }

        self.constraints.apply_offsets(&self.raw, out);
        self.emitted += 1;
        self.advance();
        true
    }

    /// Group the remaining keys into batches of `batch_size`
    pub fn batches(self, batch_size: usize) -> Batches {
        let key_len = self.constraints.len();
        let total = self.constraints.key_space_size().unwrap_or(u128::MAX);
        Batches {
            keys: self,
            batch_size: batch_size.max(1),
            total,
            scratch: vec![0u8; key_len],
            finished: false,
        }
    }

    /// Odometer step. Carrying resets every free byte it passes back to its minimum.
    fn advance(&mut self) {
        let positions = self.constraints.positions();

        for &idx in self.free.iter().rev() {
            if let Position::Free { min, max, .. } = positions[idx] {
                if self.raw[idx] < max {
                    self.raw[idx] += 1;
                    return;
                }
                self.raw[idx] = min;
            }
        }

        self.done = true;
    }
}

impl Iterator for KeyEnumerator {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let mut key = vec![0u8; self.constraints.len()];
        self.next_into(&mut key).then_some(key)
    }
}

/// Batch-producing adapter over a `KeyEnumerator`.
///
/// Every batch is full except possibly the last; no empty batch is produced.
#[derive(Debug)]
pub struct Batches {
    keys: KeyEnumerator,
    batch_size: usize,
    total: u128,
    scratch: Vec<u8>,
    finished: bool,
}

impl Batches {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Keys emitted into batches so far
    pub fn emitted(&self) -> u64 {
        self.keys.emitted()
    }
}

impl Iterator for Batches {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.finished {
            return None;
        }

        // Never reserve more than the keys still left
        let remaining = self.total.saturating_sub(u128::from(self.keys.emitted()));
        let capacity = remaining.min(self.batch_size as u128) as usize;
        let mut batch = Batch::with_capacity(self.keys.emitted(), self.scratch.len(), capacity);

        while batch.len() < self.batch_size {
            if !self.keys.next_into(&mut self.scratch) {
                self.finished = true;
                break;
            }
            batch.push(&self.scratch);
        }

        (!batch.is_empty()).then_some(batch)
    }
}

/// Contiguous run of candidate keys, the unit of work handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    start_index: u64,
    key_len: usize,
    count: usize,
    keys: Vec<u8>,
}

impl Batch {
    /// Empty batch whose first key has enumeration index `start_index`
    pub fn with_capacity(start_index: u64, key_len: usize, capacity: usize) -> Self {
        Self {
            start_index,
            key_len,
            count: 0,
            keys: Vec::with_capacity(key_len * capacity),
        }
    }

    pub fn push(&mut self, key: &[u8]) {
        debug_assert_eq!(key.len(), self.key_len);
        self.keys.extend_from_slice(key);
        self.count += 1;
    }

    /// Enumeration index of the first key
    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, i: usize) -> Option<&[u8]> {
        (i < self.count).then(|| &self.keys[i * self.key_len..(i + 1) * self.key_len])
    }

    pub fn iter(&self) -> ChunksExact<'_, u8> {
        self.keys.chunks_exact(self.key_len.max(1))
    }
}
