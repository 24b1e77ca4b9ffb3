//! Bounded, newest-first buffer of recent alerts with an unseen counter.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::Timestamp;

/// Maximum number of alerts retained.
pub const ALERT_BUFFER_CAPACITY: usize = 10;

/// One alert as received from the push channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Opaque payload, forwarded verbatim.
    pub payload: Value,
    pub received_at: Timestamp,
}

impl Alert {
    /// Wrap a payload received now.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            received_at: Timestamp::now(),
        }
    }
}

/// Ordered sequence of at most [`ALERT_BUFFER_CAPACITY`] alerts, newest first.
///
/// `unseen` counts arrivals since the last acknowledgement. Removing an
/// entry does not touch the counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBuffer {
    alerts: VecDeque<Alert>,
    unseen: usize,
}

impl AlertBuffer {
    pub fn new() -> Self {
        Self {
            alerts: VecDeque::with_capacity(ALERT_BUFFER_CAPACITY),
            unseen: 0,
        }
    }

    /// Prepend an alert, evicting the oldest when full.
    ///
    /// Returns the evicted alert, if any.
    pub fn push(&mut self, alert: Alert) -> Option<Alert> {
        self.alerts.push_front(alert);
        self.unseen = self.unseen.saturating_add(1);
        if self.alerts.len() > ALERT_BUFFER_CAPACITY {
            self.alerts.pop_back()
        } else {
            None
        }
    }

    /// Reset the unseen counter. The alerts themselves are untouched.
    pub fn acknowledge(&mut self) {
        self.unseen = 0;
    }

    /// Remove the alert at `index` (0 is newest), keeping the rest in order.
    pub fn remove(&mut self, index: usize) -> Option<Alert> {
        self.alerts.remove(index)
    }

    pub fn unseen_count(&self) -> usize {
        self.unseen
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Most recent alert.
    pub fn newest(&self) -> Option<&Alert> {
        self.alerts.front()
    }

    pub fn get(&self, index: usize) -> Option<&Alert> {
        self.alerts.get(index)
    }

    /// Alerts, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    /// Owned copy of the alerts, newest first.
    pub fn to_vec(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }
}

impl Default for AlertBuffer {
    fn default() -> Self {
        Self::new()
    }
}
