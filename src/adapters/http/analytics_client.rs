//! HTTP implementation of the `AnalyticsTrigger` port.
//!
//! # Configuration
//!
//! ```ignore
//! let config = AnalyticsClientConfig::new("https://api.example.com")
//!     .with_bearer_token(token)
//!     .with_timeout(Duration::from_secs(30));
//!
//! let trigger = HttpAnalyticsTrigger::new(config)?;
//! let body = trigger.trigger_update().await?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use std::time::Duration;

use crate::ports::{AnalyticsTrigger, MaintenanceError};

const TRIGGER_UPDATE_PATH: &str = "/analytics/trigger-update";

/// Configuration for the maintenance client.
#[derive(Debug, Clone)]
pub struct AnalyticsClientConfig {
    /// API root, without the trailing path.
    pub base_url: String,
    /// Admin credential sent as a bearer token.
    bearer_token: Option<Secret<String>>,
    /// Request timeout.
    pub timeout: Duration,
}

impl AnalyticsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the bearer token.
    pub fn with_bearer_token(mut self, token: Secret<String>) -> Self {
        self.bearer_token = Some(token);
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn trigger_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            TRIGGER_UPDATE_PATH
        )
    }
}

/// Maintenance client over reqwest.
pub struct HttpAnalyticsTrigger {
    config: AnalyticsClientConfig,
    client: Client,
}

impl HttpAnalyticsTrigger {
    /// Creates a client; fails only if the TLS backend cannot initialize.
    pub fn new(config: AnalyticsClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn handle_response(response: Response) -> Result<Value, MaintenanceError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MaintenanceError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => MaintenanceError::Unauthorized,
                code => MaintenanceError::Status { status: code, body },
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| MaintenanceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AnalyticsTrigger for HttpAnalyticsTrigger {
    async fn trigger_update(&self) -> Result<Value, MaintenanceError> {
        let url = self.config.trigger_url();
        let mut request = self.client.post(&url);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token.expose_secret());
        }

        tracing::debug!(url = %url, "Requesting analytics update");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MaintenanceError::network(format!("request timed out: {}", e))
            } else {
                MaintenanceError::network(e.to_string())
            }
        })?;

        let result = Self::handle_response(response).await;
        if let Err(err) = &result {
            tracing::warn!(url = %url, error = %err, "Analytics update request failed");
        }
        result
    }
}

impl std::fmt::Debug for HttpAnalyticsTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAnalyticsTrigger")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
