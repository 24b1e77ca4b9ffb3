//! Realtime Core - Shared push-channel client for admin dashboards
//!
//! One persistent connection per process, fanned out by topic to any number
//! of consumers. Consumers mount and unmount freely; the connection opens
//! with the first and closes with the last.
//!
//! # Example
//!
//! ```ignore
//! let config = AppConfig::load_validated()?;
//! let context = RealtimeContext::from_config(&config)?;
//!
//! let feed = context.mount_alerts();
//! let mut changes = feed.changes();
//! while changes.changed().await.is_ok() {
//!     println!("{} unseen alerts", feed.unseen_count());
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

pub use application::{AlertFeed, ConsumerAdapter, ConsumerView, RealtimeContext};
