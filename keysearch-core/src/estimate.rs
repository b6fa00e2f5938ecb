// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Search duration estimator
//!
//! Times a full scan of a small all-free key space through the real worker
//! pool, then scales the elapsed time linearly to the job's key space. Per-key
//! cost depends only on key and ciphertext lengths, so the calibration uses the
//! job's own ciphertext and pattern.

use crate::cipher::KeystreamCipher;
use crate::config::EngineSettings;
use crate::job::SearchJob;
use crate::keyspace::KeyConstraints;
use crate::search::{SearchEngine, StopPolicy};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Measured throughput over the calibration space
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Calibration {
    pub key_bytes: usize,
    pub keys: u64,
    pub elapsed: Duration,
}

impl Calibration {
    pub fn keys_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.keys as f64 / secs
        } else {
            0.0
        }
    }
}

/// Projected cost of a full search
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Estimate {
    pub key_space_size: u128,
    pub calibration: Calibration,
    projected_secs: f64,
}

impl Estimate {
    /// Scale the calibration run to `key_space_size` keys
    pub fn project(key_space_size: u128, calibration: Calibration) -> Self {
        let projected_secs = if calibration.keys == 0 {
            0.0
        } else {
            calibration.elapsed.as_secs_f64() * (key_space_size as f64 / calibration.keys as f64)
        };

        Self {
            key_space_size,
            calibration,
            projected_secs,
        }
    }

    pub fn projected_secs(&self) -> f64 {
        self.projected_secs
    }

    /// `None` when the projection does not fit a `Duration`
    pub fn projected_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.projected_secs).ok()
    }

    pub fn keys_per_second(&self) -> f64 {
        self.calibration.keys_per_second()
    }
}

pub struct Estimator<C: KeystreamCipher> {
    cipher: Arc<C>,
    settings: EngineSettings,
    calibration_bytes: usize,
}

impl<C: KeystreamCipher> Estimator<C> {
    pub fn new(cipher: Arc<C>, settings: EngineSettings) -> Self {
        Self {
            cipher,
            settings,
            calibration_bytes: crate::CALIBRATION_KEY_BYTES,
        }
    }

    /// Use an all-free calibration key of `bytes` bytes (1 to 4)
    pub fn with_calibration_bytes(mut self, bytes: usize) -> Result<Self> {
        if !(1..=4).contains(&bytes) {
            return Err(Error::Config(format!(
                "calibration key length must be between 1 and 4 bytes, got {}",
                bytes
            )));
        }
        self.calibration_bytes = bytes;
        Ok(self)
    }

    /// Scan the whole calibration space and time it
    pub fn calibrate(&self, job: &SearchJob) -> Result<Calibration> {
        let calibration_job = SearchJob::new(
            job.ciphertext().to_vec(),
            job.pattern().to_vec(),
            KeyConstraints::all_free(self.calibration_bytes)?,
        )?;

        let mut settings = self.settings.clone();
        settings.stop_policy = StopPolicy::Count;

        let engine = SearchEngine::new(Arc::clone(&self.cipher), calibration_job, settings)?;
        info!(
            "Calibrating on a {}-byte key space ({} keys)",
            self.calibration_bytes,
            engine.key_space_size()
        );
        let report = engine.run()?;

        Ok(Calibration {
            key_bytes: self.calibration_bytes,
            keys: report.keys_tested,
            elapsed: report.elapsed,
        })
    }

    pub fn estimate(&self, job: &SearchJob) -> Result<Estimate> {
        let key_space_size = job.constraints().key_space_size()?;
        let calibration = self.calibrate(job)?;
        let estimate = Estimate::project(key_space_size, calibration);

        info!(
            "Key space {} keys, {:.0} keys/s, projected {:.2}s",
            key_space_size,
            estimate.keys_per_second(),
            estimate.projected_secs()
        );

        Ok(estimate)
    }
}
