//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the realtime core and the outside world. Adapters implement these ports.
//!
//! - `Transport` - Opens the persistent push channel
//! - `AnalyticsTrigger` - Outbound analytics maintenance request

mod analytics_trigger;
mod transport;

pub use analytics_trigger::{AnalyticsTrigger, MaintenanceError};
pub use transport::{CloseReason, Transport, TransportError, TransportEvent, TransportSession};
