//! Topic names for the push channel.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Opaque key naming an event category.
///
/// Topics are never declared up front; one exists as soon as something
/// subscribes or publishes to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    /// Recomputed portfolio and platform analytics.
    pub const ANALYTICS_UPDATE: Topic = Topic::from_static("analytics-update");

    /// Investor activity feed entries.
    pub const USER_ACTIVITY: Topic = Topic::from_static("user-activity");

    /// Operational alerts for the admin console.
    pub const ALERT: Topic = Topic::from_static("alert");

    /// Local topic carrying `ConnectionStatus` transitions.
    ///
    /// Never accepted from the server.
    pub const CONNECTION_STATE: Topic = Topic::from_static("connection-state");

    /// Creates a topic from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a topic from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the topic is one the server pushes.
    pub fn is_server_topic(&self) -> bool {
        matches!(
            self.as_str(),
            "analytics-update" | "user-activity" | "alert"
        )
    }

    /// Whether the topic is produced locally and must not come off the wire.
    pub fn is_reserved(&self) -> bool {
        self.as_str() == Self::CONNECTION_STATE.as_str()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&'static str> for Topic {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&Topic> for Topic {
    fn from(topic: &Topic) -> Self {
        topic.clone()
    }
}
