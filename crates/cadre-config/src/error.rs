//! Error types for configuration operations.

use std::io;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API base URL was supplied by any source.
    #[error("missing API base URL")]
    MissingBaseUrl,
    /// Base URL was present but unusable.
    #[error("invalid API base URL")]
    InvalidBaseUrl {
        /// Offending value as provided.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Profile file could not be read.
    #[error("failed to read profile file")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// Profile file was not valid JSON.
    #[error("failed to parse profile file")]
    Parse {
        /// Source parse error.
        source: serde_json::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
