//! Realtime domain types.
//!
//! - [`topic`] - Event category keys
//! - [`connection`] - Connection states, status snapshot and health
//! - [`alert_buffer`] - Bounded newest-first alert retention
//! - [`protocol`] - Frame vocabulary shared with the push server

pub mod alert_buffer;
pub mod connection;
pub mod protocol;
pub mod topic;

pub use alert_buffer::{Alert, AlertBuffer, ALERT_BUFFER_CAPACITY};
pub use connection::{ConnectionHealth, ConnectionState, ConnectionStatus};
pub use protocol::{decode_frame, ClientMessage, InboundFrame, CONNECTED_FRAME_TYPE};
pub use topic::Topic;
