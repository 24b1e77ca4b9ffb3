//! RealtimeContext - Composition root for the realtime core.
//!
//! Builds the dispatcher, the connection manager and the maintenance
//! client once, then hands clones to every consumer. There is no global
//! instance; tests build as many isolated contexts as they like.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::adapters::events::EventDispatcher;
use crate::adapters::http::{AnalyticsClientConfig, HttpAnalyticsTrigger};
use crate::adapters::websocket::WebSocketTransport;
use crate::config::{AppConfig, ValidationError};
use crate::domain::realtime::Topic;
use crate::ports::{AnalyticsTrigger, Transport};

use super::connection::{ConnectionManager, ReconnectPolicy};
use super::consumer::{AlertFeed, ConsumerAdapter};

const DEFAULT_NUDGE_INTERVAL: Duration = Duration::from_secs(5);

/// Errors building a context from configuration.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Shared wiring handed to every consumer.
#[derive(Clone)]
pub struct RealtimeContext {
    dispatcher: EventDispatcher,
    connection: ConnectionManager,
    analytics: Arc<dyn AnalyticsTrigger>,
    nudge_interval: Duration,
}

impl RealtimeContext {
    /// Wire a context around the given transport and maintenance client,
    /// with the default reconnect policy.
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
        analytics: Arc<dyn AnalyticsTrigger>,
    ) -> Self {
        Self::with_policy(endpoint, transport, analytics, ReconnectPolicy::default())
    }

    pub fn with_policy(
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
        analytics: Arc<dyn AnalyticsTrigger>,
        policy: ReconnectPolicy,
    ) -> Self {
        let dispatcher = EventDispatcher::new();
        let connection = ConnectionManager::new(endpoint, transport, dispatcher.clone(), policy);
        Self {
            dispatcher,
            connection,
            analytics,
            nudge_interval: DEFAULT_NUDGE_INTERVAL,
        }
    }

    /// Build the production wiring: WebSocket transport and HTTP client.
    pub fn from_config(config: &AppConfig) -> Result<Self, BootstrapError> {
        config.validate()?;

        let transport =
            WebSocketTransport::new().with_inbound_buffer(config.channel.inbound_buffer);

        let mut client_config = AnalyticsClientConfig::new(config.api.base_url.clone())
            .with_timeout(config.api.request_timeout());
        if let Some(token) = &config.api.bearer_token {
            client_config = client_config.with_bearer_token(token.clone());
        }
        let analytics = HttpAnalyticsTrigger::new(client_config)?;

        let context = Self::with_policy(
            config.channel.url.clone(),
            Arc::new(transport),
            Arc::new(analytics),
            ReconnectPolicy::from(&config.channel),
        )
        .with_nudge_interval(config.channel.nudge_interval());

        Ok(context)
    }

    /// Sets the consumer nudge cadence.
    pub fn with_nudge_interval(mut self, interval: Duration) -> Self {
        self.nudge_interval = interval;
        self
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn analytics(&self) -> Arc<dyn AnalyticsTrigger> {
        Arc::clone(&self.analytics)
    }

    pub fn nudge_interval(&self) -> Duration {
        self.nudge_interval
    }

    /// Mount a consumer for `topics`. Requires a tokio runtime.
    pub fn mount(&self, topics: &[Topic]) -> ConsumerAdapter {
        ConsumerAdapter::mount(self, topics)
    }

    /// Mount an alert feed. Requires a tokio runtime.
    pub fn mount_alerts(&self) -> AlertFeed {
        AlertFeed::mount(self)
    }
}

impl std::fmt::Debug for RealtimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeContext")
            .field("connection", &self.connection)
            .field("dispatcher", &self.dispatcher)
            .field("nudge_interval", &self.nudge_interval)
            .finish()
    }
}
