//! HTTP Backend Implementation
//!
//! Query backend reached over HTTP with reqwest.
//!
//! # API
//!
//! - `POST /api/ask` - submit a query with conversation history
//! - `GET /api/insights/{request_id}` - poll a background insights job
//! - `GET /` - liveness probe
//!
//! Every request carries the environment-selector header when an
//! environment is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use super::traits::{AskRequest, AskResponse, BackendError, InsightsStatus, QueryBackend};
use crate::config::AskflowConfig;

/// Default environment-selector header
pub const DEFAULT_ENVIRONMENT_HEADER: &str = "X-OpsFlo-Env";

/// HTTP query backend client
#[derive(Clone)]
pub struct HttpQueryBackend {
    /// Base URL without trailing slash
    base_url: String,
    /// Environment header name and value
    environment: Option<(HeaderName, HeaderValue)>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpQueryBackend {
    /// Create a new backend for `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            environment: None,
            http_client,
        })
    }

    /// Create from loaded configuration
    pub fn from_config(config: &AskflowConfig) -> Result<Self, BackendError> {
        let backend = Self::new(config.base_url.clone(), config.request_timeout)?;
        match config.environment {
            Some(ref env) => backend.with_environment(&config.environment_header, env),
            None => Ok(backend),
        }
    }

    /// Send `value` in the `header` environment selector on every request
    pub fn with_environment(mut self, header: &str, value: &str) -> Result<Self, BackendError> {
        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| BackendError::Transport(format!("invalid header name {header:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BackendError::Transport(format!("invalid header value {value:?}: {e}")))?;
        self.environment = Some((name, value));
        Ok(self)
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get ask endpoint URL
    fn ask_url(&self) -> String {
        format!("{}/api/ask", self.base_url)
    }

    /// Get insights status endpoint URL
    fn insights_url(&self, request_id: &str) -> String {
        format!("{}/api/insights/{}", self.base_url, request_id)
    }

    /// Attach the environment header, if configured
    fn with_env_header(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.environment {
            Some((ref name, ref value)) => builder.header(name.clone(), value.clone()),
            None => builder,
        }
    }

    /// Turn a non-success response into [`BackendError::Status`]
    async fn status_error(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        BackendError::Status {
            status,
            detail: extract_error_detail(status, &body),
        }
    }
}

/// Map a reqwest error onto the backend taxonomy
fn map_reqwest_error(err: &reqwest::Error) -> BackendError {
    if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else {
        BackendError::Transport(err.to_string())
    }
}

/// Pull a human-readable message out of an error body
///
/// Looks at `detail` (string or validation-error list), then `error`, then
/// `message`; falls back to the raw body or a generic status line.
pub(crate) fn extract_error_detail(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        match json.get("detail") {
            Some(serde_json::Value::String(detail)) if !detail.is_empty() => {
                return detail.clone();
            }
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return messages.join("; ");
                }
            }
            _ => {}
        }

        for key in ["error", "message"] {
            if let Some(msg) = json.get(key).and_then(serde_json::Value::as_str) {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 512 && !trimmed.starts_with('<') {
        return trimmed.to_string();
    }

    format!("Request failed with status {status}")
}

#[async_trait]
impl QueryBackend for HttpQueryBackend {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn health_check(&self) -> bool {
        self.with_env_header(self.http_client.get(format!("{}/", self.base_url)))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, BackendError> {
        tracing::debug!(
            url = %self.ask_url(),
            history_len = request.conversation_history.len(),
            show_charts = request.show_charts,
            "Dispatching ask request"
        );

        let response = self
            .with_env_header(self.http_client.post(self.ask_url()))
            .json(request)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        response
            .json::<AskResponse>()
            .await
            .map_err(|e| map_reqwest_error(&e))
    }

    async fn insights_status(&self, request_id: &str) -> Result<InsightsStatus, BackendError> {
        let response = self
            .with_env_header(self.http_client.get(self.insights_url(request_id)))
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        response
            .json::<InsightsStatus>()
            .await
            .map_err(|e| map_reqwest_error(&e))
    }
}
