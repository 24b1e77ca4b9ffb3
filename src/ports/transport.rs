//! Transport port - Interface for the persistent push channel.
//!
//! The connection manager owns at most one live session at a time and
//! never touches sockets directly. Adapters decide the framing; the
//! manager only sees text frames and a close reason.
//!
//! ## Session Contract
//!
//! - `open` resolves once the server has accepted the socket and assigned
//!   a connection id
//! - Dropping `outbound` closes the transport (client-initiated close)
//! - `inbound` yields text frames in arrival order and ends with exactly
//!   one `Closed` event unless the client closed first

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::foundation::{ConnectionId, ProtocolError};

/// Why a transport session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server deliberately ended the session. Never auto-retried.
    ServerInitiated(String),

    /// The socket was lost (network blip, server restart, protocol error).
    Unexpected(String),
}

impl CloseReason {
    /// Whether the server asked the client to stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CloseReason::ServerInitiated(_))
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ServerInitiated(reason) => write!(f, "closed by server: {}", reason),
            CloseReason::Unexpected(reason) => write!(f, "connection lost: {}", reason),
        }
    }
}

/// Events delivered from an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame, undecoded.
    Message(String),

    /// The session ended.
    Closed(CloseReason),
}

/// An open session handed to the connection manager.
#[derive(Debug)]
pub struct TransportSession {
    /// Identifier the server assigned during the handshake.
    pub connection_id: ConnectionId,

    /// Text frames to send. Dropping the sender closes the session.
    pub outbound: mpsc::Sender<String>,

    /// Frames and the terminal close event.
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// Errors opening a transport session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Connection closed before the server assigned an id")]
    ClosedDuringHandshake,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Port for opening the push channel.
///
/// # Example
///
/// ```ignore
/// let session = transport.open("wss://api.example.com/realtime").await?;
/// session.outbound.send(ClientMessage::JoinAdmin.encode()?).await?;
/// while let Some(event) = session.inbound.recv().await { /* ... */ }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new session to `endpoint`.
    ///
    /// Callers bound this with their own timeout; implementations may
    /// wait indefinitely for the server handshake.
    async fn open(&self, endpoint: &str) -> Result<TransportSession, TransportError>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
