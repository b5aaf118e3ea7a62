//! HTTP analysis backend
//!
//! POSTs the request as JSON to a configured endpoint and hands the raw
//! response body to the parser. Uses reqwest with rustls.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;

use super::backend::{AnalysisBackend, BackendError, FailureResponse};
use super::types::AnalysisRequest;
use crate::config::BackendConfig;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
        }
    }

    /// Create a backend from configuration
    ///
    /// Returns an error if no endpoint is configured.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let endpoint = config
            .endpoint
            .as_ref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                BackendError::NotConfigured(
                    "Missing endpoint. Add 'endpoint' in the [backend] section of the config file."
                        .to_string(),
                )
            })?;

        let api_key = config
            .api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .cloned();

        Ok(Self::new(endpoint.clone(), api_key))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, BackendError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout { timeout_ms: 0 }
            } else {
                BackendError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        log::debug!(
            "Backend {} answered {} for request {}",
            self.endpoint,
            status,
            request.request_id
        );

        let error = match serde_json::from_str::<FailureResponse>(&body) {
            Ok(failure) => BackendError::from_failure(status.as_u16(), failure),
            Err(_) => BackendError::from_status(status.as_u16(), body),
        };

        Err(match error {
            BackendError::RateLimited {
                retry_after_secs: None,
            } => BackendError::RateLimited {
                retry_after_secs: retry_after,
            },
            other => other,
        })
    }
}
