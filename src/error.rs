//! Error types for the limiter and the document client
use std::time::Duration;

/// Failures raised by a [`RateLimiter`](crate::rate_limit::RateLimiter).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Limiter parameters were rejected at construction.
    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfiguration(String),
    /// The caller waited longer than the configured maximum for a permit.
    #[error("timed out after {waited:?} waiting for a permit (limit: {max_wait:?})")]
    Timeout { waited: Duration, max_wait: Duration },
    /// The caller's cancel token fired while it was waiting.
    #[error("permit wait interrupted after {waited:?}")]
    Interrupted { waited: Duration },
}

impl RateLimitError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Check if this error is due to an exceeded wait bound
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error is due to cancellation
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Check if this error is due to bad limiter parameters
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}

/// Unified error type for document submission.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The permit could not be obtained (or the limiter was misconfigured).
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    /// The endpoint answered with a non-success status.
    #[error("remote error {status}: {body}")]
    Remote { status: u16, body: String },
    /// The endpoint answered with a success status but no body.
    #[error("empty response body (status {status})")]
    EmptyResponse { status: u16 },
    /// JSON could not be produced or parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The HTTP exchange itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The configured endpoint is not a valid URL.
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl ApiError {
    /// Check if this error wraps a permit wait timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RateLimit(e) if e.is_timeout())
    }

    /// Check if this error wraps an interrupted permit wait
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::RateLimit(e) if e.is_interrupted())
    }

    /// Check if this error wraps a limiter configuration error
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::RateLimit(e) if e.is_invalid_configuration())
    }

    /// Check if this error is a non-success HTTP status
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Check if this error is an empty success body
    pub fn is_empty_response(&self) -> bool {
        matches!(self, Self::EmptyResponse { .. })
    }

    /// Check if this error is a JSON failure
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }

    /// Access the status and body of a remote error.
    pub fn remote_details(&self) -> Option<(u16, &str)> {
        match self {
            Self::Remote { status, body } => Some((*status, body.as_str())),
            _ => None,
        }
    }

    /// Borrow the limiter error if present.
    pub fn as_rate_limit(&self) -> Option<&RateLimitError> {
        match self {
            Self::RateLimit(e) => Some(e),
            _ => None,
        }
    }
}
