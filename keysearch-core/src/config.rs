// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Configuration management for search jobs and the engine
//!
//! A job (what to search) is read from a YAML file with environment overrides.
//! Engine settings (how to search) come from `KEYSEARCH_*` environment
//! variables and may be overridden on the command line.

use crate::cipher::Rc4;
use crate::job::SearchJob;
use crate::keyspace::KeyConstraints;
use crate::search::StopPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const SAMPLE_CIPHERTEXT: &str =
    "a6cb8dc97096d1716f9766a79da62461d6ea5e82ebdb1e22a54ff60286971c6c01b800";

/// Per-byte key constraints as five parallel sequences
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyConfig {
    pub known: Vec<u8>,
    pub is_known: Vec<bool>,
    pub offset: Vec<u8>,
    pub min: Vec<u8>,
    pub max: Vec<u8>,
}

impl KeyConfig {
    pub fn to_constraints(&self) -> Result<KeyConstraints> {
        KeyConstraints::new(&self.known, &self.is_known, &self.offset, &self.min, &self.max)
    }
}

/// Search job description
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct JobConfig {
    /// Hex-encoded ciphertext; whitespace is ignored
    pub ciphertext: String,

    /// Known plaintext prefix as text
    #[serde(default)]
    pub pattern: Option<String>,

    /// Known plaintext prefix as hex
    #[serde(default)]
    pub pattern_hex: Option<String>,

    /// Trailing framing bytes that are not part of the encrypted payload
    #[serde(default = "default_trailer_len")]
    pub trailer_len: usize,

    pub key: KeyConfig,
}

fn default_trailer_len() -> usize {
    1
}

impl JobConfig {
    /// Load a YAML job file; `KEYSEARCH_JOB_*` variables override scalar fields
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(config::Environment::with_prefix("KEYSEARCH_JOB"))
            .build()?;

        let job: Self = settings.try_deserialize()?;
        job.validate()?;
        Ok(job)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let job: Self = serde_yaml::from_str(yaml)?;
        job.validate()?;
        Ok(job)
    }

    /// Built-in job: an 11-byte key with a 4-byte known prefix and seven
    /// offset-shifted free bytes, protecting a null-terminated payload.
    pub fn sample() -> Self {
        Self {
            ciphertext: SAMPLE_CIPHERTEXT.to_string(),
            pattern: Some("Key:".to_string()),
            pattern_hex: None,
            trailer_len: 1,
            key: KeyConfig {
                known: vec![0x62, 0x30, 0x30, 0x21, 0, 0, 0, 0, 0, 0, 0],
                is_known: vec![true, true, true, true, false, false, false, false, false, false, false],
                offset: vec![0, 0, 0, 0, 0x35, 0x29, 0x40, 0x73, 0x5d, 0x3f, 0x6b],
                min: vec![0, 0, 0, 0, 1, 1, 0, 5, 0, 0, 0],
                max: vec![0, 0, 0, 0, 12, 31, 23, 12, 4, 2, 147],
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ciphertext = self.ciphertext_bytes()?;
        if ciphertext.len() <= self.trailer_len {
            return Err(Error::Config(format!(
                "Ciphertext has {} bytes, need more than trailer_len ({})",
                ciphertext.len(),
                self.trailer_len
            )));
        }

        let pattern = self.pattern_bytes()?;
        if pattern.is_empty() {
            return Err(Error::Config("Known plaintext pattern cannot be empty".to_string()));
        }

        self.key.to_constraints()?;
        Ok(())
    }

    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>> {
        let compact: String = self.ciphertext.split_whitespace().collect();
        Ok(hex::decode(compact)?)
    }

    /// Exactly one of `pattern` or `pattern_hex` must be set
    pub fn pattern_bytes(&self) -> Result<Vec<u8>> {
        match (&self.pattern, &self.pattern_hex) {
            (Some(text), None) => Ok(text.as_bytes().to_vec()),
            (None, Some(encoded)) => Ok(hex::decode(encoded.trim())?),
            (Some(_), Some(_)) => Err(Error::Config(
                "Set either pattern or pattern_hex, not both".to_string(),
            )),
            (None, None) => Err(Error::Config(
                "A known plaintext pattern (pattern or pattern_hex) is required".to_string(),
            )),
        }
    }

    pub fn cipher(&self) -> Rc4 {
        Rc4::with_trailer(self.trailer_len)
    }

    pub fn into_job(self) -> Result<SearchJob> {
        let ciphertext = self.ciphertext_bytes()?;
        let pattern = self.pattern_bytes()?;
        let constraints = self.key.to_constraints()?;
        SearchJob::new(ciphertext, pattern, constraints)
    }
}

/// Engine tuning knobs
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EngineSettings {
    /// Worker threads in the pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Keys per batch handed to a worker
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Work queue capacity in batches (0 = rendezvous handoff)
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    #[serde(default)]
    pub stop_policy: StopPolicy,

    /// Progress log interval in milliseconds
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_workers() -> usize {
    (num_cpus::get() * 2).clamp(1, crate::MAX_WORKERS)
}

fn default_batch_size() -> usize {
    crate::DEFAULT_BATCH_SIZE
}

fn default_queue_depth() -> usize {
    crate::DEFAULT_QUEUE_DEPTH
}

fn default_progress_interval_ms() -> u64 {
    crate::DEFAULT_PROGRESS_INTERVAL_MS
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: default_batch_size(),
            queue_depth: default_queue_depth(),
            stop_policy: StopPolicy::default(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl EngineSettings {
    /// Load from `KEYSEARCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let settings = Self::read_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read `KEYSEARCH_*` variables without validating, for callers that
    /// apply their own overrides first
    pub fn read_env() -> Result<Self> {
        Ok(envy::prefixed("KEYSEARCH_").from_env()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.workers > crate::MAX_WORKERS {
            return Err(Error::Config(format!(
                "workers must be between 1 and {}",
                crate::MAX_WORKERS
            )));
        }

        if self.batch_size == 0 || self.batch_size > crate::MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "batch_size must be between 1 and {}",
                crate::MAX_BATCH_SIZE
            )));
        }

        if self.queue_depth > crate::MAX_QUEUE_DEPTH {
            return Err(Error::Config(format!(
                "queue_depth must be at most {}",
                crate::MAX_QUEUE_DEPTH
            )));
        }

        if self.progress_interval_ms == 0 {
            return Err(Error::Config(
                "progress_interval_ms must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
