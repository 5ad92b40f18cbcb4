//! Outbound port for applying queued actions to the backend.
//!
//! The adapter is supplied by the host application; this module defines the
//! contract plus a reference HTTP implementation. Replay of the same action
//! id must be safe to apply more than once: a success acknowledgement can be
//! lost after the call succeeded, and the coordinator will replay. The
//! reference implementation forwards the action id as an idempotency key so
//! the backend can deduplicate.

use std::time::Duration;

use async_trait::async_trait;
use courier_domain::PendingAction;
use reqwest::Method;
use tracing::debug;

use super::errors::{classify_status, SyncError};
use crate::http::HttpClient;

/// Interface for replaying a queued action against the backend.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Apply one action. Implementations must be idempotent keyed by
    /// `action.id`.
    async fn apply(&self, action: &PendingAction) -> Result<(), SyncError>;
}

/// Configuration for the reference HTTP adapter.
#[derive(Debug, Clone)]
pub struct HttpBackendAdapterConfig {
    /// Base URL of the backend apply endpoint (e.g. "https://api.example.com").
    pub base_url: String,
    /// Timeout for a single apply request.
    pub timeout: Duration,
}

impl Default for HttpBackendAdapterConfig {
    fn default() -> Self {
        Self { base_url: "http://127.0.0.1:8080".to_string(), timeout: Duration::from_secs(30) }
    }
}

/// Reference adapter that POSTs actions to `{base_url}/actions`.
pub struct HttpBackendAdapter {
    http_client: HttpClient,
    config: HttpBackendAdapterConfig,
}

impl HttpBackendAdapter {
    /// Build an adapter with the given configuration.
    pub fn new(config: HttpBackendAdapterConfig) -> Result<Self, SyncError> {
        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Client(format!("failed to build HttpClient: {e}")))?;

        Ok(Self { http_client, config })
    }
}

#[async_trait]
impl BackendAdapter for HttpBackendAdapter {
    async fn apply(&self, action: &PendingAction) -> Result<(), SyncError> {
        let payload: serde_json::Value = serde_json::from_str(&action.payload_json)
            .map_err(|e| SyncError::Validation(format!("payload is not valid JSON: {e}")))?;

        let url = format!("{}/actions", self.config.base_url);
        let body = serde_json::json!({
            "id": action.id,
            "operation": action.operation,
            "payload": payload,
        });

        debug!(action_id = %action.id, operation = %action.operation, url = %url, "applying action");

        let request = self
            .http_client
            .request(Method::POST, &url)
            .header("X-Idempotency-Key", &action.id)
            .json(&body);

        let response = self.http_client.send(request).await.map_err(SyncError::from)?;

        let status = response.status();
        if status.is_success() {
            debug!(action_id = %action.id, %status, "action applied");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }
}
