//! Consumers of the realtime channel.
//!
//! - [`ConsumerAdapter`] - generic per-consumer bridge with teardown
//! - [`AlertFeed`] - bounded alert buffer on top of an adapter
//! - [`ConsumerView`] - observable state a consumer renders

mod adapter;
mod alert_feed;
mod view;

pub use adapter::ConsumerAdapter;
pub use alert_feed::AlertFeed;
pub use view::ConsumerView;
