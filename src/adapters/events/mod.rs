//! Event fan-out adapters.
//!
//! - `EventDispatcher` - Synchronous, in-process topic registry shared by
//!   the connection manager and every consumer

mod dispatcher;

pub use dispatcher::{DispatchReport, EventDispatcher, ListenerResult, Subscription};
