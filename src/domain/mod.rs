//! Domain layer containing the realtime vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (identifiers, timestamps, errors)
//! - `realtime` - Topics, connection status, alert buffer and wire frames

pub mod foundation;
pub mod realtime;
