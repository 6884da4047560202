//! LLM invocation: one HTTP round-trip per chunk.
//!
//! This module only moves bytes. Payloads are built by
//! [`crate::pipeline::adapter`] and the reply text is pulled out there too;
//! here a [`ProviderRequest`] is POSTed and the raw reply body comes back.
//!
//! Nothing is retried at this level. A retry policy, when configured, is
//! applied by the orchestrator on top of [`LlmClient::invoke`].
//!
//! The [`LlmClient`] trait is the seam used by tests: any implementation can
//! stand in for the real provider via [`crate::split::split_with_client`].

use crate::error::SlidesError;
use crate::pipeline::adapter::{Auth, ProviderRequest};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Longest provider error body kept in a [`SlidesError::Provider`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Sends a provider request and returns the raw reply body.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Perform one call.
    ///
    /// Fails with [`SlidesError::Transport`] or [`SlidesError::Timeout`]
    /// when the endpoint cannot be reached in time, and with
    /// [`SlidesError::Provider`] for any non-success HTTP status.
    async fn invoke(&self, request: &ProviderRequest) -> Result<String, SlidesError>;
}

/// [`LlmClient`] backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpLlmClient {
    /// Build a client whose every call is bounded by `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, SlidesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SlidesError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn invoke(&self, request: &ProviderRequest) -> Result<String, SlidesError> {
        let mut builder = self.client.post(&request.endpoint).json(&request.body);
        builder = match &request.auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Header { name, value } => builder.header(*name, value),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SlidesError::Timeout {
                    endpoint: request.endpoint.clone(),
                    secs: self.timeout_secs,
                }
            } else {
                SlidesError::Transport {
                    endpoint: request.endpoint.clone(),
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SlidesError::Timeout {
                    endpoint: request.endpoint.clone(),
                    secs: self.timeout_secs,
                }
            } else {
                SlidesError::Transport {
                    endpoint: request.endpoint.clone(),
                    detail: format!("failed to read response body: {e}"),
                }
            }
        })?;

        if !status.is_success() {
            return Err(SlidesError::Provider {
                model: request.model.clone(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        debug!(
            "{}: HTTP {} with {} bytes",
            request.model,
            status.as_u16(),
            body.len()
        );
        Ok(body)
    }
}
