//! Bounded retry for backend calls
//!
//! Each attempt is bounded by a timeout. Transient failures (timeout,
//! network, 5xx) are retried with exponential backoff; everything else is
//! returned immediately. A failure body delivered as a success payload counts
//! as a failure.

use std::time::Duration;

use super::backend::{AnalysisBackend, BackendError};
use super::parser::failure_in_payload;
use super::types::AnalysisRequest;
use crate::config::AnalysisConfig;

/// Status reported for failure bodies that arrived as a success payload
const SUCCESS_STATUS: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (0-based): base * 2^retry, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Call the backend under `policy`.
pub async fn call_with_retry(
    backend: &dyn AnalysisBackend,
    request: &AnalysisRequest,
    policy: &RetryPolicy,
) -> Result<String, BackendError> {
    let mut retry = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, backend.analyze(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Timeout {
                timeout_ms: u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        let outcome = outcome.and_then(|payload| match failure_in_payload(&payload) {
            Some(failure) => Err(BackendError::from_failure(SUCCESS_STATUS, failure)),
            None => Ok(payload),
        });

        match outcome {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                let delay = policy.backoff(retry);
                log::debug!(
                    "Backend {} failed for request {} ({}), retrying in {:?}",
                    backend.name(),
                    request.request_id,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
