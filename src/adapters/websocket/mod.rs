//! WebSocket adapters for the push channel.
//!
//! # Components
//!
//! - [`transport`] - `Transport` over tokio-tungstenite
//! - [`mock_transport`] - Scriptable in-process transport for tests

pub mod mock_transport;
pub mod transport;

pub use mock_transport::{MockConnection, MockMode, MockOutcome, MockTransport, PendingAttempt};
pub use transport::WebSocketTransport;
