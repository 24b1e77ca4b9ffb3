//! HTTP adapters.
//!
//! - `HttpAnalyticsTrigger` - reqwest client for the analytics maintenance
//!   request
//! - `MockAnalyticsTrigger` - queued responses for tests

mod analytics_client;
mod mock_analytics;

pub use analytics_client::{AnalyticsClientConfig, HttpAnalyticsTrigger};
pub use mock_analytics::MockAnalyticsTrigger;
