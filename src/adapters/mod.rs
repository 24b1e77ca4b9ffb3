//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the realtime core to external systems:
//! - `events` - In-process topic dispatcher
//! - `websocket` - Push-channel transport (tokio-tungstenite, mock)
//! - `http` - Analytics maintenance client (reqwest, mock)

pub mod events;
pub mod http;
pub mod websocket;

pub use events::{DispatchReport, EventDispatcher, ListenerResult, Subscription};
pub use http::{AnalyticsClientConfig, HttpAnalyticsTrigger, MockAnalyticsTrigger};
pub use websocket::{MockConnection, MockMode, MockOutcome, MockTransport, WebSocketTransport};
