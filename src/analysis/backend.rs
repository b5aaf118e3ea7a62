//! Analysis backend contract
//!
//! The backend is an opaque collaborator that turns text into a raw payload.
//! Parsing and validation of that payload happen on our side of the boundary
//! (see [`super::parser`]), so implementations only deal with transport.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::types::AnalysisRequest;

/// Errors that can occur while talking to the analysis backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The call did not finish within the configured timeout
    #[error("Analysis request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Transport failure before a response arrived
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials missing or rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Backend rejected the request as malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Backend-side rate limiting
    #[error("Analysis backend is rate limiting requests")]
    RateLimited { retry_after_secs: Option<u64> },

    /// 5xx or equivalent upstream failure
    #[error("Analysis backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// No backend endpoint configured
    #[error("Analysis backend not configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout { .. } | BackendError::Network(_) | BackendError::Server { .. }
        )
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            BackendError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    /// Classify an HTTP status with its body message.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => BackendError::Auth(message),
            408 | 504 => BackendError::Timeout { timeout_ms: 0 },
            429 => BackendError::RateLimited {
                retry_after_secs: None,
            },
            400..=499 => BackendError::BadRequest(message),
            _ => BackendError::Server { status, message },
        }
    }

    /// Classify a structured failure body, falling back to the HTTP status.
    pub fn from_failure(status: u16, failure: FailureResponse) -> Self {
        match failure.code {
            FailureCode::Timeout => BackendError::Timeout { timeout_ms: 0 },
            FailureCode::Network => BackendError::Network(failure.message),
            FailureCode::Auth => BackendError::Auth(failure.message),
            FailureCode::BadRequest => BackendError::BadRequest(failure.message),
            FailureCode::RateLimited => BackendError::RateLimited {
                retry_after_secs: failure.retry_after_seconds,
            },
            FailureCode::Server => BackendError::Server {
                status,
                message: failure.message,
            },
            FailureCode::Unknown => Self::from_status(status, failure.message),
        }
    }
}

/// Failure codes carried by a backend failure body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    Timeout,
    Network,
    Auth,
    BadRequest,
    RateLimited,
    Server,
    #[serde(other)]
    Unknown,
}

/// Failure body: `{ code, message, retryAfterSeconds? }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub code: FailureCode,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub retry_after_seconds: Option<u64>,
}

/// Transport to the external analysis service.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Submit `request` and return the raw success payload.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, BackendError>;
}
