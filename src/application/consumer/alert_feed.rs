//! AlertFeed - Consumer keeping the ten most recent alerts.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::domain::realtime::{Alert, AlertBuffer, Topic};

use super::{ConsumerAdapter, ConsumerView};
use crate::application::RealtimeContext;

/// Consumer subscribed to `alert` that keeps a bounded, newest-first
/// buffer with an unseen counter.
pub struct AlertFeed {
    adapter: ConsumerAdapter,
    buffer: Arc<watch::Sender<AlertBuffer>>,
}

impl AlertFeed {
    pub fn mount(context: &RealtimeContext) -> Self {
        let (buffer_tx, _) = watch::channel(AlertBuffer::new());
        let buffer = Arc::new(buffer_tx);

        let adapter = {
            let buffer = Arc::clone(&buffer);
            ConsumerAdapter::mount_with(context, &[Topic::ALERT], move |adapter| {
                let consumer_id = adapter.id();
                adapter.on(Topic::ALERT, move |payload: &Value| {
                    buffer.send_modify(|alerts| {
                        if alerts.push(Alert::new(payload.clone())).is_some() {
                            tracing::trace!(consumer_id = %consumer_id, "Oldest alert evicted");
                        }
                    });
                    Ok(())
                });
            })
        };

        Self { adapter, buffer }
    }

    /// Buffered alerts, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.buffer.borrow().to_vec()
    }

    pub fn unseen_count(&self) -> usize {
        self.buffer.borrow().unseen_count()
    }

    /// Mark everything seen. The buffer is untouched.
    pub fn acknowledge(&self) {
        self.buffer.send_if_modified(|alerts| {
            let had_unseen = alerts.unseen_count() > 0;
            alerts.acknowledge();
            had_unseen
        });
    }

    /// Remove the alert at `index` (0 = newest).
    pub fn remove(&self, index: usize) -> Option<Alert> {
        let mut removed = None;
        self.buffer.send_if_modified(|alerts| {
            removed = alerts.remove(index);
            removed.is_some()
        });
        removed
    }

    /// Observe buffer changes.
    pub fn changes(&self) -> watch::Receiver<AlertBuffer> {
        self.buffer.subscribe()
    }

    /// Connection state and latest raw alert payload.
    pub fn view(&self) -> ConsumerView {
        self.adapter.snapshot()
    }

    pub fn adapter(&self) -> &ConsumerAdapter {
        &self.adapter
    }

    pub fn unmount(&self) {
        self.adapter.unmount();
    }
}

impl std::fmt::Debug for AlertFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertFeed")
            .field("adapter", &self.adapter)
            .field("alerts", &self.buffer.borrow().len())
            .finish()
    }
}
