//! Observable state of one mounted consumer.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::Timestamp;
use crate::domain::realtime::{ConnectionHealth, ConnectionState, ConnectionStatus, Topic};

/// What a consumer renders: connection health plus the latest payload per
/// subscribed topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerView {
    pub connected: bool,
    pub connection_state: ConnectionState,
    pub health: ConnectionHealth,
    pub latest: HashMap<Topic, Value>,
    pub last_update: Option<Timestamp>,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub(crate) status_revision: u64,
}

impl Default for ConsumerView {
    fn default() -> Self {
        Self {
            connected: false,
            connection_state: ConnectionState::Disconnected,
            health: ConnectionHealth::Offline,
            latest: HashMap::new(),
            last_update: None,
            last_error: None,
            status_revision: 0,
        }
    }
}

impl ConsumerView {
    pub(crate) fn from_status(status: &ConnectionStatus) -> Self {
        let mut view = Self::default();
        view.apply_status(status);
        view
    }

    /// Latest payload received on `topic`.
    pub fn latest(&self, topic: &Topic) -> Option<&Value> {
        self.latest.get(topic)
    }

    /// Fold a status transition into the view.
    ///
    /// Returns `false` for a revision older than one already applied.
    pub(crate) fn apply_status(&mut self, status: &ConnectionStatus) -> bool {
        if status.revision < self.status_revision {
            return false;
        }
        self.status_revision = status.revision;
        self.connected = status.is_connected();
        self.connection_state = status.state;
        self.health = status.health();
        self.last_error = status.last_error.clone();
        true
    }

    pub(crate) fn record_event(&mut self, topic: &Topic, payload: &Value) {
        self.latest.insert(topic.clone(), payload.clone());
        self.last_update = Some(Timestamp::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(state: ConnectionState, revision: u64) -> ConnectionStatus {
        ConnectionStatus {
            state,
            revision,
            max_attempts: 5,
            ..Default::default()
        }
    }

    #[test]
    fn older_status_revisions_are_ignored() {
        let mut view = ConsumerView::default();

        assert!(view.apply_status(&status(ConnectionState::Connected, 4)));
        assert!(!view.apply_status(&status(ConnectionState::Connecting, 3)));

        assert!(view.connected);
        assert_eq!(view.health, ConnectionHealth::Live);
    }

    #[test]
    fn events_update_latest_and_timestamp() {
        let mut view = ConsumerView::default();
        view.record_event(&Topic::ALERT, &json!({"id": 1}));
        view.record_event(&Topic::ALERT, &json!({"id": 2}));

        assert_eq!(view.latest(&Topic::ALERT), Some(&json!({"id": 2})));
        assert!(view.last_update.is_some());
    }

    #[test]
    fn serializes_camel_case_without_revision() {
        let view = ConsumerView::from_status(&status(ConnectionState::Reconnecting, 2));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["connectionState"], "reconnecting");
        assert_eq!(json["connected"], false);
        assert!(json.get("statusRevision").is_none());
    }
}
