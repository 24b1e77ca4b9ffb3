//! Connection lifecycle states and the status snapshot consumers observe.
//!
//! ## Transitions
//!
//! ```text
//! Disconnected --[connect]--> Connecting
//! Connecting --[open]--> Connected                      (attempt := 0)
//! Connecting --[failure, attempt < max]--> Reconnecting (attempt += 1)
//! Connecting --[failure, attempt == max]--> Failed
//! Connected --[unexpected close]--> Reconnecting        (attempt := 1)
//! Connected --[server-initiated close]--> Failed
//! Reconnecting --[base_delay × attempt elapsed]--> Connecting
//! Failed --[explicit connect]--> Connecting
//! any --[disconnect]--> Disconnected
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ConnectionId;

/// Lifecycle state of the single shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport and nothing scheduled.
    #[default]
    Disconnected,

    /// A transport open is in flight.
    Connecting,

    /// Transport open, server assigned an identifier.
    Connected,

    /// Waiting out the backoff delay before the next automatic attempt.
    Reconnecting,

    /// No further automatic attempts; only an explicit connect resumes.
    Failed,
}

impl ConnectionState {
    /// Check if the transport is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Check if the manager is actively working towards a connection.
    pub fn is_recovering(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        )
    }
}

/// What a consumer should tell the user about the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    /// Connected and receiving events.
    Live,
    /// First attempt in flight, nothing has failed yet.
    Connecting,
    /// Temporarily degraded, retry in progress.
    Degraded,
    /// Automatic retries are over; a manual reconnect is required.
    RequiresManualReconnect,
    /// Deliberately disconnected.
    Offline,
}

impl ConnectionHealth {
    /// Short user-facing description.
    pub fn describe(&self) -> &'static str {
        match self {
            ConnectionHealth::Live => "Live",
            ConnectionHealth::Connecting => "Connecting",
            ConnectionHealth::Degraded => "Temporarily degraded, retry in progress",
            ConnectionHealth::RequiresManualReconnect => "Connection lost, reconnect required",
            ConnectionHealth::Offline => "Offline",
        }
    }
}

/// Snapshot of the shared connection, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,

    /// Present only while connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,

    /// Consecutive automatic retries since the last successful open.
    pub reconnect_attempt: u32,

    pub max_attempts: u32,

    /// Delay before the scheduled retry, while reconnecting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Increases with every transition so late deliveries can be discarded.
    pub revision: u64,
}

impl ConnectionStatus {
    /// Check if the transport is open.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Derive the user-visible health from the state and the last error.
    pub fn health(&self) -> ConnectionHealth {
        match self.state {
            ConnectionState::Connected => ConnectionHealth::Live,
            ConnectionState::Failed => ConnectionHealth::RequiresManualReconnect,
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                if self.last_error.is_some() {
                    ConnectionHealth::Degraded
                } else {
                    ConnectionHealth::Connecting
                }
            }
            ConnectionState::Disconnected => ConnectionHealth::Offline,
        }
    }
}
