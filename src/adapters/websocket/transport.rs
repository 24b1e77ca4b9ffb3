//! WebSocket implementation of the `Transport` port.
//!
//! Opens the socket with tokio-tungstenite, waits for the server's
//! `connected` handshake, then splits the stream into two tasks:
//!
//! - writer: forwards outbound text frames; sends a close frame once the
//!   manager drops its sender
//! - reader: forwards text frames and ends with exactly one `Closed` event,
//!   or stops silently once the manager drops its receiver
//!
//! Close codes 1000 (normal) and 1008 (policy) mean the server wants the
//! client gone; any other loss is treated as unexpected.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::domain::realtime::{decode_frame, InboundFrame};
use crate::ports::{CloseReason, Transport, TransportError, TransportEvent, TransportSession};

const DEFAULT_INBOUND_BUFFER: usize = 256;
const OUTBOUND_BUFFER: usize = 16;

/// Push-channel transport over a real WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    inbound_buffer: usize,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            inbound_buffer: DEFAULT_INBOUND_BUFFER,
        }
    }

    /// Sets how many undelivered inbound frames may queue before the
    /// socket reader applies backpressure.
    pub fn with_inbound_buffer(mut self, frames: usize) -> Self {
        self.inbound_buffer = frames.max(1);
        self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, endpoint: &str) -> Result<TransportSession, TransportError> {
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
        }

        let (stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let connection_id = loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => match decode_frame(text.as_str())? {
                    InboundFrame::Connected { client_id } => break client_id,
                    InboundFrame::Event { topic, .. } => {
                        tracing::debug!(topic = %topic, "Event before handshake, dropped");
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::ClosedDuringHandshake)
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
            }
        };

        tracing::debug!(
            connection_id = %connection_id,
            endpoint = endpoint,
            "WebSocket handshake complete"
        );

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel::<TransportEvent>(self.inbound_buffer);

        let writer_id = connection_id.clone();
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(connection_id = %writer_id, error = %e, "WebSocket write failed");
                    return;
                }
            }
            // Sender dropped: client-initiated close
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        });

        let reader_id = connection_id.clone();
        tokio::spawn(async move {
            let reason = loop {
                tokio::select! {
                    _ = inbound_tx.closed() => return,
                    frame = source.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let event = TransportEvent::Message(text.as_str().to_owned());
                            if inbound_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            tracing::warn!(
                                connection_id = %reader_id,
                                len = bytes.len(),
                                "Binary frame ignored"
                            );
                        }
                        Some(Ok(Message::Close(frame))) => break close_reason(frame),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break CloseReason::Unexpected(e.to_string()),
                        None => break CloseReason::Unexpected("stream ended".to_string()),
                    },
                }
            };

            tracing::debug!(connection_id = %reader_id, reason = %reason, "WebSocket closed");
            let _ = inbound_tx.send(TransportEvent::Closed(reason)).await;
        });

        Ok(TransportSession {
            connection_id,
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

fn close_reason(frame: Option<CloseFrame>) -> CloseReason {
    match frame {
        Some(frame) => {
            let code = u16::from(frame.code);
            let reason = format!("code {}: {}", code, frame.reason.as_str());
            if matches!(frame.code, CloseCode::Normal | CloseCode::Policy) {
                CloseReason::ServerInitiated(reason)
            } else {
                CloseReason::Unexpected(reason)
            }
        }
        None => CloseReason::Unexpected("closed without status".to_string()),
    }
}
