//! The single shared push-channel connection.
//!
//! - [`ConnectionManager`] - lifecycle, reconnection and inbound fan-out
//! - [`ConnectionLease`] - per-consumer reference count
//! - [`ReconnectPolicy`] - timeouts and linear backoff

mod lease;
mod manager;
mod policy;

pub use lease::ConnectionLease;
pub use manager::ConnectionManager;
pub use policy::ReconnectPolicy;
