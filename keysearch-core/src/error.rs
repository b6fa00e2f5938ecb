// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Error types for the key search engine
//!
//! Provides a unified error taxonomy using `thiserror`. Configuration and cipher
//! errors are detected before any worker starts and are fatal; running out of
//! candidates is not an error and is reported through `SearchOutcome`.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for key search operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Constraint model, job file or engine settings are invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cipher primitive rejects the key length or ciphertext
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pool thread died unexpectedly
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error belongs to the startup-fatal class
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Cipher(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<envy::Error> for Error {
    fn from(e: envy::Error) -> Self {
        Error::Config(format!("Failed to parse environment variables: {}", e))
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Serialization(format!("Invalid hex: {}", e))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_class() {
        assert!(Error::Config("bad".into()).is_config_error());
        assert!(Error::Cipher("empty".into()).is_config_error());
        assert!(!Error::Internal("panic".into()).is_config_error());
    }

    #[test]
    fn test_hex_conversion() {
        let err: Error = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
