// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Immutable description of one search: what to decrypt, what to look for, where

use crate::keyspace::KeyConstraints;
use crate::{Error, Result};
use std::sync::Arc;

/// Ciphertext, known-plaintext prefix and key space, fixed for a whole run.
///
/// Shared read-only between the dispatcher and every worker.
#[derive(Debug, Clone)]
pub struct SearchJob {
    ciphertext: Arc<[u8]>,
    pattern: Arc<[u8]>,
    constraints: Arc<KeyConstraints>,
}

impl SearchJob {
    pub fn new(
        ciphertext: impl Into<Vec<u8>>,
        pattern: impl Into<Vec<u8>>,
        constraints: KeyConstraints,
    ) -> Result<Self> {
        let ciphertext = ciphertext.into();
        let pattern = pattern.into();

        if ciphertext.is_empty() {
            return Err(Error::Config("Ciphertext cannot be empty".to_string()));
        }

        if pattern.is_empty() {
            return Err(Error::Config("Known plaintext pattern cannot be empty".to_string()));
        }

        Ok(Self {
            ciphertext: ciphertext.into(),
            pattern: pattern.into(),
            constraints: Arc::new(constraints),
        })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn constraints(&self) -> &KeyConstraints {
        &self.constraints
    }

    pub(crate) fn shared_constraints(&self) -> Arc<KeyConstraints> {
        Arc::clone(&self.constraints)
    }

    pub fn key_len(&self) -> usize {
        self.constraints.len()
    }
}
