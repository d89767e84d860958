//! LLM error types

use crate::wire::ErrorKind;
use thiserror::Error;

/// LLM error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unconfigured(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unconfigured, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Generation, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unknown, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// No credential available, no request was made
    Unconfigured,
    /// Network issues, timeouts, dropped connections
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403)
    Auth,
    /// Bad request (400)
    InvalidRequest,
    /// Provider accepted the request but reported a failed generation
    Generation,
    /// Unknown error
    Unknown,
}

impl LlmErrorKind {
    /// Transient failures a user may simply resubmit after
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }

    /// Collapse provider-specific classes into the wire taxonomy
    pub fn to_wire(self) -> ErrorKind {
        match self {
            Self::Unconfigured => ErrorKind::Unconfigured,
            Self::Network | Self::RateLimit | Self::ServerError | Self::Auth => {
                ErrorKind::UpstreamUnavailable
            }
            Self::InvalidRequest | Self::Generation | Self::Unknown => ErrorKind::GenerationFailed,
        }
    }
}
