//! ConsumerAdapter - Per-consumer bridge to the shared connection.
//!
//! Mounting an adapter:
//!
//! 1. takes a lease on the shared connection
//! 2. subscribes to the consumer's topics, recording the latest payload
//! 3. subscribes to `connection-state` to follow the connection
//! 4. spawns the connector, which calls `connect()` once and, if that
//!    fails, nudges on a fixed cadence until the connection is up
//!
//! Unmounting reverses this in a fixed order (see [`ConsumerAdapter::unmount`]).
//! The adapter owns every subscription it made, so nothing outlives it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::adapters::events::{ListenerResult, Subscription};
use crate::application::connection::{ConnectionLease, ConnectionManager};
use crate::application::RealtimeContext;
use crate::domain::foundation::{ConsumerId, SubscriptionId};
use crate::domain::realtime::{ConnectionState, ConnectionStatus, Topic};
use crate::ports::{AnalyticsTrigger, MaintenanceError};

use super::ConsumerView;

#[derive(Default)]
struct Mounted {
    connector: Option<JoinHandle<()>>,
    topic_subscriptions: Vec<Subscription>,
    status_subscription: Option<Subscription>,
    lease: Option<ConnectionLease>,
}

/// One mounted consumer of the realtime channel.
///
/// Must be mounted from within a tokio runtime.
pub struct ConsumerAdapter {
    id: ConsumerId,
    topics: Vec<Topic>,
    context: RealtimeContext,
    view: Arc<watch::Sender<ConsumerView>>,
    mounted: Mutex<Option<Mounted>>,
}

impl ConsumerAdapter {
    /// Activate a consumer for `topics`.
    pub fn mount(context: &RealtimeContext, topics: &[Topic]) -> Self {
        Self::mount_with(context, topics, |_| {})
    }

    /// Like [`mount`](Self::mount), but runs `setup` on the adapter before
    /// the connector starts, so listeners attached there see every event
    /// from the first open on.
    pub fn mount_with(
        context: &RealtimeContext,
        topics: &[Topic],
        setup: impl FnOnce(&ConsumerAdapter),
    ) -> Self {
        let id = ConsumerId::new();
        let connection = context.connection().clone();
        let dispatcher = context.dispatcher();

        let lease = connection.acquire();
        let (view_tx, _) = watch::channel(ConsumerView::from_status(&connection.status()));
        let view = Arc::new(view_tx);

        let topic_subscriptions = topics
            .iter()
            .map(|topic| {
                let view = Arc::clone(&view);
                let key = topic.clone();
                dispatcher.subscribe(topic.clone(), move |payload: &Value| {
                    view.send_modify(|v| v.record_event(&key, payload));
                    Ok(())
                })
            })
            .collect();

        let status_subscription = {
            let view = Arc::clone(&view);
            dispatcher.subscribe(Topic::CONNECTION_STATE, move |payload: &Value| {
                let status: ConnectionStatus = serde_json::from_value(payload.clone())?;
                view.send_if_modified(|v| v.apply_status(&status));
                Ok(())
            })
        };
        // A transition may have landed between the first snapshot and the
        // subscription above.
        let current = connection.status();
        view.send_if_modified(|v| v.apply_status(&current));

        let adapter = Self {
            id,
            topics: topics.to_vec(),
            context: context.clone(),
            view,
            mounted: Mutex::new(Some(Mounted {
                connector: None,
                topic_subscriptions,
                status_subscription: Some(status_subscription),
                lease: Some(lease),
            })),
        };
        setup(&adapter);

        let connector = tokio::spawn(connect_and_nudge(
            connection,
            context.nudge_interval(),
            id,
        ));
        match adapter.lock().as_mut() {
            Some(mounted) => mounted.connector = Some(connector),
            // Unmounted from inside `setup`
            None => connector.abort(),
        }

        tracing::debug!(
            consumer_id = %id,
            topics = ?topics.iter().map(Topic::as_str).collect::<Vec<_>>(),
            "Consumer mounted"
        );
        adapter
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn connection(&self) -> &ConnectionManager {
        self.context.connection()
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().is_some()
    }

    /// Current view.
    pub fn snapshot(&self) -> ConsumerView {
        self.view.borrow().clone()
    }

    /// Observe view changes.
    pub fn changes(&self) -> watch::Receiver<ConsumerView> {
        self.view.subscribe()
    }

    /// Attach an extra listener owned by this adapter.
    ///
    /// Removed on unmount together with the topic listeners. Returns `None`
    /// once the adapter has been unmounted.
    pub fn on<F>(&self, topic: impl Into<Topic>, callback: F) -> Option<SubscriptionId>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        let mut mounted = self.lock();
        let mounted = mounted.as_mut()?;
        let subscription = self.context.dispatcher().subscribe(topic, callback);
        let id = subscription.id();
        mounted.topic_subscriptions.push(subscription);
        Some(id)
    }

    /// Ask the server to recompute and re-publish analytics.
    ///
    /// Failures go to the caller only; connection state is untouched.
    pub async fn trigger_update(&self) -> Result<Value, MaintenanceError> {
        let analytics: Arc<dyn AnalyticsTrigger> = self.context.analytics();
        let result = analytics.trigger_update().await;
        match &result {
            Ok(_) => tracing::info!(consumer_id = %self.id, "Analytics update triggered"),
            Err(e) => tracing::warn!(consumer_id = %self.id, error = %e, "Analytics update failed"),
        }
        result
    }

    /// Tear the consumer down. Idempotent; also runs on drop.
    ///
    /// Order:
    /// 1. cancel the connector
    /// 2. unsubscribe every topic listener, including ones added with `on`
    /// 3. stop following connection state
    /// 4. release the lease (closes the connection if it was the last one)
    pub fn unmount(&self) {
        let Some(mut mounted) = self.lock().take() else {
            return;
        };

        if let Some(connector) = mounted.connector.take() {
            connector.abort();
        }
        for subscription in mounted.topic_subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if let Some(subscription) = mounted.status_subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(lease) = mounted.lease.take() {
            lease.release();
        }

        tracing::debug!(consumer_id = %self.id, "Consumer unmounted");
    }

    fn lock(&self) -> MutexGuard<'_, Option<Mounted>> {
        self.mounted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConsumerAdapter {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl std::fmt::Debug for ConsumerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerAdapter")
            .field("id", &self.id)
            .field("topics", &self.topics)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// Connect once; on failure nudge every `interval` until connected.
///
/// A nudge only calls `connect()` when the manager is idle (`Disconnected`
/// or `Failed`). While it is `Connecting` or `Reconnecting` its own backoff
/// is in charge and the nudge stays out of the way.
async fn connect_and_nudge(connection: ConnectionManager, interval: Duration, consumer_id: ConsumerId) {
    match connection.connect().await {
        Ok(()) => return,
        Err(e) => {
            tracing::debug!(consumer_id = %consumer_id, error = %e, "Initial connect failed, nudging");
        }
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match connection.status().state {
            ConnectionState::Connected => return,
            ConnectionState::Connecting | ConnectionState::Reconnecting => {}
            ConnectionState::Disconnected | ConnectionState::Failed => {
                tracing::debug!(consumer_id = %consumer_id, "Nudging connection");
                if connection.connect().await.is_ok() {
                    return;
                }
            }
        }
    }
}
