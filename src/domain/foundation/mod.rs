//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the realtime core.

mod errors;
mod ids;
mod timestamp;

pub use errors::{ConnectionError, ListenerError, ProtocolError};
pub use ids::{ConnectionId, ConsumerId, SubscriptionId};
pub use timestamp::Timestamp;
