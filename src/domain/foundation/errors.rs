//! Error types for the realtime core.
//!
//! Connection failures are recoverable and drive the reconnection policy.
//! Protocol and listener failures are contained where they happen and only
//! logged, so one bad frame or one bad subscriber cannot destabilize the
//! shared connection.

use std::time::Duration;
use thiserror::Error;

/// Failure to establish or keep the push-channel connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Connection attempt timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Connection attempt cancelled by disconnect")]
    Cancelled,

    #[error("Server terminated the session: {0}")]
    ServerTerminated(String),
}

impl ConnectionError {
    /// Creates a transport error from any displayable cause.
    pub fn transport(cause: impl Into<String>) -> Self {
        ConnectionError::Transport(cause.into())
    }

    /// Whether the server explicitly asked the client to stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionError::ServerTerminated(_))
    }
}

/// An inbound frame that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Frame is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Frame is missing a message type")]
    MissingType,

    #[error("Handshake frame is missing the client id")]
    MissingClientId,

    #[error("Frame type '{0}' is reserved for local use")]
    ReservedType(String),

    #[error("Unsupported frame: {0}")]
    Unsupported(String),
}

/// A listener failed while handling a published payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    /// Creates a listener error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for ListenerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("payload decode failed: {}", err))
    }
}
