//! Error taxonomy surfaced to callers of the session layer.
//!
//! Every expected failure mode crosses the public boundary as an
//! [`ApiError`] variant so UI callers can render the difference between
//! "wrong password", "server unreachable", and "server said no" without
//! string matching.

use thiserror::Error;

/// Primary error type for client operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input rejected before any network call was made.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Login was rejected by the server.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The session could not be recovered after an authorization failure.
    #[error("unauthorized: session could not be recovered")]
    Unauthorized,
    /// Transport failure: no response was received.
    #[error("network failure: {detail}")]
    Network {
        /// Human-readable description of the transport failure.
        detail: String,
        /// Originating transport error, when this end observed it directly.
        #[source]
        source: Option<reqwest::Error>,
    },
    /// The server responded with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Best-effort message extracted from the error body.
        message: String,
    },
}

/// Convenience alias for client results.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Wrap a transport error, preserving it as the source.
    pub(crate) fn network(source: reqwest::Error) -> Self {
        Self::Network {
            detail: source.to_string(),
            source: Some(source),
        }
    }

    /// HTTP status associated with the error, when the server responded.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::InvalidCredentials | Self::Unauthorized => Some(401),
            Self::Validation(_) | Self::Network { .. } => None,
        }
    }
}
