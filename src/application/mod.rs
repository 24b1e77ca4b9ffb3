//! Application layer - Orchestrates the connection and its consumers.
//!
//! - `connection` - The shared connection, its policy and leases
//! - `consumer` - Per-consumer adapters and the alert feed
//! - `context` - Composition root handing shared pieces to consumers

pub mod connection;
pub mod consumer;
mod context;

pub use connection::{ConnectionLease, ConnectionManager, ReconnectPolicy};
pub use consumer::{AlertFeed, ConsumerAdapter, ConsumerView};
pub use context::{BootstrapError, RealtimeContext};
