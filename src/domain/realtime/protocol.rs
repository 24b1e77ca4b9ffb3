//! Frame vocabulary shared with the push server.
//!
//! - Server → Client: `{"type":"connected","clientId":"..."}` once after the
//!   handshake, then `{"type":"<topic>","payload":<json>}` per event
//! - Client → Server: `{"type":"join-admin"}` after every successful open
//!
//! Payloads are opaque and forwarded verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{ConnectionId, ProtocolError};

use super::Topic;

/// Frame type of the handshake the server sends after accepting a socket.
pub const CONNECTED_FRAME_TYPE: &str = "connected";

// ============================================
// Server → Client
// ============================================

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Server accepted the socket and assigned an identifier.
    Connected { client_id: ConnectionId },

    /// Event to fan out on `topic`.
    Event { topic: Topic, payload: Value },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
    client_id: Option<String>,
}

/// Decode a text frame from the server.
pub fn decode_frame(text: &str) -> Result<InboundFrame, ProtocolError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    let kind = raw
        .kind
        .filter(|k| !k.trim().is_empty())
        .ok_or(ProtocolError::MissingType)?;

    if kind == CONNECTED_FRAME_TYPE {
        let client_id = raw
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or(ProtocolError::MissingClientId)?;
        return Ok(InboundFrame::Connected {
            client_id: ConnectionId::new(client_id),
        });
    }

    let topic = Topic::new(kind);
    if topic.is_reserved() {
        return Err(ProtocolError::ReservedType(topic.to_string()));
    }

    Ok(InboundFrame::Event {
        topic,
        payload: raw.payload,
    })
}

// ============================================
// Client → Server
// ============================================

/// Frames the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Register interest in admin events. Idempotent on the server.
    JoinAdmin,
}

impl ClientMessage {
    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
