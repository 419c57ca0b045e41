//! Error handling and custom error types
//!
//! Every failure a generation call can report, grouped into the buckets a
//! caller acts on: fix the request, try again later, or the backend refused.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Backend connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Backend call timed out")]
    Timeout,

    #[error("Backend call cancelled")]
    Cancelled,

    #[error("Backend rejected request{}: {message}", status_suffix(.status))]
    BackendRejected {
        status: Option<u16>,
        message: String,
    },

    /// Absorbed by the output contract; a call never fails with this.
    #[error("Structured output parse failed: {0}")]
    StructuredParseFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Caller-visible grouping of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request itself must be fixed.
    Caller,
    /// The backend could not be reached in time; retrying may help.
    Transient,
    /// The backend understood the request and declined it.
    Backend,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Caller => "caller",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Backend => "backend",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidRequest(_) | Error::MediaUnavailable(_) | Error::PayloadTooLarge(_) => {
                ErrorCategory::Caller
            }
            Error::ConnectionFailed(_) | Error::Timeout | Error::Cancelled => {
                ErrorCategory::Transient
            }
            Error::BackendRejected { .. } => ErrorCategory::Backend,
            Error::StructuredParseFailed(_) | Error::Config(_) => ErrorCategory::Internal,
        }
    }

    /// Stable snake_case identifier used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::MediaUnavailable(_) => "media_unavailable",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::ConnectionFailed(_) => "connection_failed",
            Error::Timeout => "timeout",
            Error::Cancelled => "cancelled",
            Error::BackendRejected { .. } => "backend_rejected",
            Error::StructuredParseFailed(_) => "structured_parse_failed",
            Error::Config(_) => "config_error",
        }
    }

    pub(crate) fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::BackendRejected {
            status,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" (status {})", s))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
