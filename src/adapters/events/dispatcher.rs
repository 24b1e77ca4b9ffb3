//! In-memory topic dispatcher shared by every consumer.
//!
//! Synchronous publish/subscribe over a `Topic → listeners` registry.
//!
//! # Delivery Rules
//!
//! - Listeners of a topic run in registration order
//! - Each publish iterates a snapshot taken before the first callback, so a
//!   callback may subscribe or unsubscribe (itself or siblings) without
//!   skipping or duplicating anyone
//! - A listener unsubscribed mid-dispatch is skipped if its turn has not
//!   come yet; a listener added mid-dispatch sees only later publishes
//! - A failing or panicking listener is logged and dispatch moves on
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = EventDispatcher::new();
//! let sub = dispatcher.subscribe(Topic::ALERT, |payload| {
//!     println!("alert: {}", payload);
//!     Ok(())
//! });
//!
//! dispatcher.publish(&Topic::ALERT, &json!({"level": "warn"}));
//! sub.unsubscribe();
//! ```

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::Value;

use crate::domain::foundation::{ListenerError, SubscriptionId};
use crate::domain::realtime::Topic;

/// Result a listener returns for one delivery.
pub type ListenerResult = Result<(), ListenerError>;

type Callback = dyn Fn(&Value) -> ListenerResult + Send + Sync;

struct ListenerEntry {
    id: SubscriptionId,
    callback: Arc<Callback>,
    active: AtomicBool,
}

type Listeners = HashMap<Topic, Vec<Arc<ListenerEntry>>>;

#[derive(Default)]
struct Registry {
    topics: RwLock<Listeners>,
    next_id: AtomicU64,
}

impl Registry {
    // Callbacks never run under the lock, so a poisoned lock only means a
    // panic elsewhere mid-update of a Vec; the map itself stays usable.
    fn read(&self) -> RwLockReadGuard<'_, Listeners> {
        self.topics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Listeners> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, topic: Topic, callback: Arc<Callback>) -> SubscriptionId {
        let id = SubscriptionId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(ListenerEntry {
            id,
            callback,
            active: AtomicBool::new(true),
        });
        self.write().entry(topic).or_default().push(entry);
        id
    }

    fn remove(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let mut topics = self.write();
        let Some(listeners) = topics.get_mut(topic) else {
            return false;
        };
        let Some(position) = listeners.iter().position(|entry| entry.id == id) else {
            return false;
        };

        let entry = listeners.remove(position);
        entry.active.store(false, Ordering::SeqCst);
        if listeners.is_empty() {
            topics.remove(topic);
        }
        true
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
///
/// Dropping the handle does not unsubscribe; consumers keep their handles
/// and release them explicitly on teardown.
#[derive(Debug, Clone)]
#[must_use = "keep the Subscription to unsubscribe later"]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Remove the listener. Idempotent.
    ///
    /// Returns `true` only for the call that actually removed it. Once this
    /// returns, the listener is never invoked again.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(&self.topic, self.id),
            None => false,
        }
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
    /// Listeners unsubscribed after the snapshot but before their turn.
    pub skipped: usize,
}

/// Topic-based fan-out shared by the connection manager and all consumers.
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl EventDispatcher {
    /// Creates a dispatcher with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `topic`.
    ///
    /// Registering the same callback twice yields two independent listeners.
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, callback: F) -> Subscription
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.registry.insert(topic.clone(), Arc::new(callback));
        tracing::trace!(topic = %topic, subscription_id = %id, "Listener subscribed");
        Subscription {
            id,
            topic,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register one callback on several topics.
    ///
    /// Returns one handle per topic, in the order given.
    pub fn subscribe_all<F>(&self, topics: &[Topic], callback: F) -> Vec<Subscription>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        let callback: Arc<Callback> = Arc::new(callback);
        topics
            .iter()
            .map(|topic| {
                let id = self.registry.insert(topic.clone(), Arc::clone(&callback));
                Subscription {
                    id,
                    topic: topic.clone(),
                    registry: Arc::downgrade(&self.registry),
                }
            })
            .collect()
    }

    /// Remove the listener behind `subscription`. Idempotent.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.registry.remove(&subscription.topic, subscription.id)
    }

    /// Deliver `payload` to every listener of `topic`, in registration order.
    pub fn publish(&self, topic: &Topic, payload: &Value) -> DispatchReport {
        let snapshot: Vec<Arc<ListenerEntry>> =
            self.registry.read().get(topic).cloned().unwrap_or_default();

        let mut report = DispatchReport::default();
        for entry in snapshot {
            if !entry.active.load(Ordering::SeqCst) {
                report.skipped += 1;
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)(payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    tracing::warn!(
                        topic = %topic,
                        subscription_id = %entry.id,
                        error = %err,
                        "Listener failed, continuing dispatch"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::warn!(
                        topic = %topic,
                        subscription_id = %entry.id,
                        panic = panic_message(panic.as_ref()),
                        "Listener panicked, continuing dispatch"
                    );
                }
            }
        }

        tracing::trace!(
            topic = %topic,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "Published"
        );
        report
    }

    /// Number of listeners registered on `topic`.
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.registry.read().get(topic).map(Vec::len).unwrap_or(0)
    }

    /// Number of listeners across all topics.
    pub fn total_listeners(&self) -> usize {
        self.registry.read().values().map(Vec::len).sum()
    }

    /// Topics that currently have at least one listener.
    pub fn topics(&self) -> Vec<Topic> {
        self.registry.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.total_listeners())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<Callback>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_factory = Arc::clone(&log);
        let factory = move |name: &str| -> Box<Callback> {
            let log = Arc::clone(&log_for_factory);
            let name = name.to_string();
            Box::new(move |_: &Value| {
                log.lock().unwrap().push(name.clone());
                Ok(())
            })
        };
        (log, factory)
    }

    #[test]
    fn publish_invokes_listeners_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();

        let _a = dispatcher.subscribe(Topic::ALERT, listener("a"));
        let _b = dispatcher.subscribe(Topic::ALERT, listener("b"));
        let _c = dispatcher.subscribe(Topic::ALERT, listener("c"));

        let report = dispatcher.publish(&Topic::ALERT, &json!({}));

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.delivered, 3);
    }

    #[test]
    fn publish_only_reaches_matching_topic() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();

        let _alert = dispatcher.subscribe(Topic::ALERT, listener("alert"));
        let _activity = dispatcher.subscribe(Topic::USER_ACTIVITY, listener("activity"));

        dispatcher.publish(&Topic::USER_ACTIVITY, &json!({}));

        assert_eq!(*log.lock().unwrap(), vec!["activity"]);
    }

    #[test]
    fn publish_without_listeners_is_noop() {
        let dispatcher = EventDispatcher::new();
        let report = dispatcher.publish(&Topic::new("nobody-home"), &json!(1));
        assert_eq!(report, DispatchReport::default());
    }

    #[test]
    fn same_callback_registered_twice_is_delivered_twice() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = {
            let count = Arc::clone(&count);
            move |_: &Value| -> ListenerResult {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        let _first = dispatcher.subscribe(Topic::ALERT, counter.clone());
        let _second = dispatcher.subscribe(Topic::ALERT, counter);
        dispatcher.publish(&Topic::ALERT, &json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.listener_count(&Topic::ALERT), 2);
    }

    #[test]
    fn unsubscribed_listener_is_not_invoked() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();

        let l1 = dispatcher.subscribe(Topic::ALERT, listener("l1"));
        let _l2 = dispatcher.subscribe(Topic::ALERT, listener("l2"));

        assert!(l1.unsubscribe());
        dispatcher.publish(&Topic::ALERT, &json!({"level": "high"}));

        assert_eq!(*log.lock().unwrap(), vec!["l2"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let dispatcher = EventDispatcher::new();
        let sub = dispatcher.subscribe(Topic::ALERT, |_: &Value| Ok(()));

        assert!(dispatcher.unsubscribe(&sub));
        assert!(!dispatcher.unsubscribe(&sub));
        assert!(!sub.unsubscribe());
        assert_eq!(dispatcher.total_listeners(), 0);
    }

    #[test]
    fn empty_topics_are_dropped_from_registry() {
        let dispatcher = EventDispatcher::new();
        let sub = dispatcher.subscribe(Topic::ALERT, |_: &Value| Ok(()));
        assert_eq!(dispatcher.topics(), vec![Topic::ALERT]);

        sub.unsubscribe();

        assert!(dispatcher.topics().is_empty());
    }

    #[test]
    fn handle_outliving_dispatcher_is_harmless() {
        let dispatcher = EventDispatcher::new();
        let sub = dispatcher.subscribe(Topic::ALERT, |_: &Value| Ok(()));
        drop(dispatcher);

        assert!(!sub.unsubscribe());
    }

    #[test]
    fn failing_listener_does_not_starve_siblings() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();

        let _l1 = dispatcher.subscribe(Topic::ALERT, |_: &Value| {
            Err(ListenerError::new("boom"))
        });
        let _l2 = dispatcher.subscribe(Topic::ALERT, listener("l2"));

        let report = dispatcher.publish(&Topic::ALERT, &json!({}));

        assert_eq!(*log.lock().unwrap(), vec!["l2"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
    }

    #[test]
    fn panicking_listener_does_not_starve_siblings() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();

        let _l1 = dispatcher.subscribe(Topic::ALERT, |_: &Value| -> ListenerResult {
            panic!("listener bug")
        });
        let _l2 = dispatcher.subscribe(Topic::ALERT, listener("l2"));

        let report = dispatcher.publish(&Topic::ALERT, &json!({}));

        assert_eq!(*log.lock().unwrap(), vec!["l2"]);
        assert_eq!(report.failed, 1);

        // Registry still usable afterwards
        dispatcher.publish(&Topic::ALERT, &json!({}));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_publish() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();
        let late: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let _adder = {
            let dispatcher = dispatcher.clone();
            let late = Arc::clone(&late);
            let log = Arc::clone(&log);
            dispatcher.clone().subscribe(Topic::ALERT, move |_: &Value| {
                log.lock().unwrap().push("adder".to_string());
                let log = Arc::clone(&log);
                let sub = dispatcher.subscribe(Topic::ALERT, move |_: &Value| {
                    log.lock().unwrap().push("late".to_string());
                    Ok(())
                });
                late.lock().unwrap().push(sub);
                Ok(())
            })
        };
        let _tail = dispatcher.subscribe(Topic::ALERT, listener("tail"));

        dispatcher.publish(&Topic::ALERT, &json!({}));
        assert_eq!(*log.lock().unwrap(), vec!["adder", "tail"]);

        log.lock().unwrap().clear();
        dispatcher.publish(&Topic::ALERT, &json!({}));
        assert_eq!(*log.lock().unwrap(), vec!["adder", "tail", "late"]);
    }

    #[test]
    fn sibling_unsubscribed_during_dispatch_is_skipped() {
        let dispatcher = EventDispatcher::new();
        let (log, listener) = recorder();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let _killer = {
            let victim = Arc::clone(&victim);
            dispatcher.subscribe(Topic::ALERT, move |_: &Value| {
                if let Some(sub) = victim.lock().unwrap().take() {
                    sub.unsubscribe();
                }
                Ok(())
            })
        };
        *victim.lock().unwrap() = Some(dispatcher.subscribe(Topic::ALERT, listener("victim")));
        let _survivor = dispatcher.subscribe(Topic::ALERT, listener("survivor"));

        let report = dispatcher.publish(&Topic::ALERT, &json!({}));

        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
        assert_eq!(report.skipped, 1);
        assert_eq!(dispatcher.listener_count(&Topic::ALERT), 2);
    }

    #[test]
    fn listener_can_unsubscribe_itself_during_dispatch() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let own: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sub = {
            let own = Arc::clone(&own);
            let count = Arc::clone(&count);
            dispatcher.subscribe(Topic::ALERT, move |_: &Value| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = own.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
                Ok(())
            })
        };
        *own.lock().unwrap() = Some(sub);

        dispatcher.publish(&Topic::ALERT, &json!({}));
        dispatcher.publish(&Topic::ALERT, &json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.total_listeners(), 0);
    }

    #[test]
    fn subscribe_all_registers_on_each_topic() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let subs = {
            let count = Arc::clone(&count);
            dispatcher.subscribe_all(
                &[Topic::ANALYTICS_UPDATE, Topic::USER_ACTIVITY],
                move |_: &Value| {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
        };

        dispatcher.publish(&Topic::ANALYTICS_UPDATE, &json!({}));
        dispatcher.publish(&Topic::USER_ACTIVITY, &json!({}));
        dispatcher.publish(&Topic::ALERT, &json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1].topic(), &Topic::USER_ACTIVITY);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Subscribe,
        Unsubscribe(usize),
        Publish,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Subscribe),
            (0usize..8).prop_map(Op::Unsubscribe),
            Just(Op::Publish),
        ]
    }

    proptest! {
        #[test]
        fn listener_sees_exactly_the_publishes_while_subscribed(ops in prop::collection::vec(op(), 1..60)) {
            let dispatcher = EventDispatcher::new();
            let mut subs: Vec<(Subscription, Arc<AtomicUsize>)> = Vec::new();
            let mut expected: Vec<usize> = Vec::new();
            let mut live: Vec<bool> = Vec::new();

            for op in ops {
                match op {
                    Op::Subscribe => {
                        let count = Arc::new(AtomicUsize::new(0));
                        let sub = {
                            let count = Arc::clone(&count);
                            dispatcher.subscribe(Topic::ALERT, move |_: &Value| {
                                count.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            })
                        };
                        subs.push((sub, count));
                        expected.push(0);
                        live.push(true);
                    }
                    Op::Unsubscribe(i) => {
                        if let Some((sub, _)) = subs.get(i) {
                            let removed = sub.unsubscribe();
                            prop_assert_eq!(removed, live[i]);
                            live[i] = false;
                        }
                    }
                    Op::Publish => {
                        dispatcher.publish(&Topic::ALERT, &json!({}));
                        for (i, alive) in live.iter().enumerate() {
                            if *alive {
                                expected[i] += 1;
                            }
                        }
                    }
                }
            }

            for (i, (_, count)) in subs.iter().enumerate() {
                prop_assert_eq!(count.load(Ordering::SeqCst), expected[i]);
            }
            prop_assert_eq!(dispatcher.total_listeners(), live.iter().filter(|l| **l).count());
        }
    }
}
