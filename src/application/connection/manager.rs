//! ConnectionManager - Owns the single shared push-channel connection.
//!
//! One manager exists per `RealtimeContext`. It keeps at most one live
//! transport session, reconnects with linear backoff after unexpected
//! loss, and feeds every decoded inbound event into the shared
//! `EventDispatcher`.
//!
//! ## Concurrency
//!
//! - `connect()` is idempotent: while an attempt is in flight every caller
//!   joins the same shared future, so any number of concurrent callers
//!   produce exactly one transport open
//! - Every attempt, retry timer and reader carries the generation it was
//!   started under; `disconnect()` bumps the generation so stale work
//!   notices and backs out
//! - State lives behind a `std::sync::Mutex` that is never held across an
//!   `.await` nor while listeners run
//!
//! ## Status
//!
//! Each transition bumps `revision`, replaces the value in a `watch`
//! channel and is published as JSON on [`Topic::CONNECTION_STATE`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};

use crate::adapters::events::EventDispatcher;
use crate::domain::foundation::{ConnectionError, ConnectionId};
use crate::domain::realtime::{
    decode_frame, ClientMessage, ConnectionState, ConnectionStatus, InboundFrame, Topic,
};
use crate::ports::{CloseReason, Transport, TransportEvent, TransportSession};

use super::{ConnectionLease, ReconnectPolicy};

type AttemptFuture = Shared<BoxFuture<'static, Result<(), ConnectionError>>>;

struct InFlight {
    future: AttemptFuture,
    abort: AbortHandle,
}

struct Session {
    outbound: mpsc::Sender<String>,
    reader: JoinHandle<()>,
}

impl Session {
    /// Client-initiated close: stop reading, drop the sender.
    fn close(self) {
        self.reader.abort();
        drop(self.outbound);
    }
}

#[derive(Default)]
struct ManagerState {
    state: ConnectionState,
    connection_id: Option<ConnectionId>,
    reconnect_attempt: u32,
    last_error: Option<String>,
    next_retry: Option<Duration>,
    generation: u64,
    revision: u64,
    attempt: Option<InFlight>,
    retry: Option<JoinHandle<()>>,
    session: Option<Session>,
    leases: usize,
}

struct Inner {
    endpoint: String,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    dispatcher: EventDispatcher,
    state: Mutex<ManagerState>,
    status_tx: watch::Sender<ConnectionStatus>,
}

/// Shared connection handle. Cloning is cheap; clones share one connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Creates a manager in `Disconnected` state. Nothing is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
        dispatcher: EventDispatcher,
        policy: ReconnectPolicy,
    ) -> Self {
        let initial = ConnectionStatus {
            max_attempts: policy.max_attempts,
            ..Default::default()
        };
        let (status_tx, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                policy,
                transport,
                dispatcher,
                state: Mutex::new(ManagerState::default()),
                status_tx,
            }),
        }
    }

    /// Ensure the shared connection is open.
    ///
    /// Resolves immediately when already connected. Otherwise joins the
    /// in-flight attempt or starts one, pre-empting a pending retry timer.
    /// The retry counter is left alone; only a successful open resets it.
    ///
    /// # Errors
    ///
    /// - `Timeout` - no handshake within the connect timeout
    /// - `Transport` - the open failed
    /// - `Cancelled` - `disconnect()` ran before the attempt finished
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let (future, status) = {
            let mut st = self.inner.lock();
            if st.state.is_connected() {
                return Ok(());
            }
            if let Some(in_flight) = st.attempt.as_ref() {
                (in_flight.future.clone(), None)
            } else {
                let future = self.inner.start_attempt(&mut st);
                (future, Some(self.inner.record(&mut st)))
            }
        };

        if let Some(status) = status {
            self.inner.publish_status(&status);
        }
        future.await
    }

    /// Close the connection and cancel everything pending.
    ///
    /// Stops the retry timer, invalidates any in-flight attempt (its
    /// joiners resolve with `Cancelled`), closes the transport and resets
    /// the retry counter. Listeners are left registered.
    pub fn disconnect(&self) {
        let status = {
            let mut st = self.inner.lock();
            self.inner.shutdown(&mut st)
        };
        if let Some(status) = status {
            tracing::info!(endpoint = %self.inner.endpoint, "Disconnected");
            self.inner.publish_status(&status);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().state.is_connected()
    }

    /// Identifier the server assigned, while connected.
    pub fn id(&self) -> Option<ConnectionId> {
        self.inner.lock().connection_id.clone()
    }

    /// Latest status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// Observe every status transition.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Take a lease on the connection for one consumer.
    pub fn acquire(&self) -> ConnectionLease {
        let active = {
            let mut st = self.inner.lock();
            st.leases += 1;
            st.leases
        };
        tracing::debug!(active_consumers = active, "Connection lease acquired");
        ConnectionLease::new(self.clone())
    }

    /// Number of leases currently held.
    pub fn active_consumers(&self) -> usize {
        self.inner.lock().leases
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    pub(super) fn release_lease(&self) {
        let status = {
            let mut st = self.inner.lock();
            st.leases = st.leases.saturating_sub(1);
            if st.leases > 0 {
                tracing::debug!(active_consumers = st.leases, "Connection lease released");
                None
            } else {
                tracing::info!("Last consumer released, closing connection");
                self.inner.shutdown(&mut st)
            }
        };
        if let Some(status) = status {
            self.inner.publish_status(&status);
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint)
            .field("transport", &self.inner.transport.name())
            .field("status", &self.status())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot the state as a new status revision.
    fn record(&self, st: &mut ManagerState) -> ConnectionStatus {
        st.revision += 1;
        let status = ConnectionStatus {
            state: st.state,
            connection_id: st.connection_id.clone(),
            reconnect_attempt: st.reconnect_attempt,
            max_attempts: self.policy.max_attempts,
            next_retry_ms: st.next_retry.map(|d| d.as_millis() as u64),
            last_error: st.last_error.clone(),
            revision: st.revision,
        };
        self.status_tx.send_replace(status.clone());
        status
    }

    // Must be called without the state lock held.
    fn publish_status(&self, status: &ConnectionStatus) {
        match serde_json::to_value(status) {
            Ok(payload) => {
                self.dispatcher.publish(&Topic::CONNECTION_STATE, &payload);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode connection status"),
        }
    }

    fn start_attempt(self: &Arc<Self>, st: &mut ManagerState) -> AttemptFuture {
        if let Some(retry) = st.retry.take() {
            retry.abort();
        }
        st.generation += 1;
        st.state = ConnectionState::Connecting;
        st.connection_id = None;
        st.next_retry = None;

        let generation = st.generation;
        tracing::debug!(
            endpoint = %self.endpoint,
            transport = self.transport.name(),
            attempt = st.reconnect_attempt,
            "Opening connection"
        );

        let handle = tokio::spawn(run_attempt(
            Arc::downgrade(self),
            Arc::clone(&self.transport),
            self.endpoint.clone(),
            self.policy.connect_timeout,
            generation,
        ));
        let abort = handle.abort_handle();
        let future = async move { handle.await.unwrap_or(Err(ConnectionError::Cancelled)) }
            .boxed()
            .shared();

        st.attempt = Some(InFlight {
            future: future.clone(),
            abort,
        });
        future
    }

    fn on_open(
        self: &Arc<Self>,
        generation: u64,
        session: TransportSession,
    ) -> Result<(), ConnectionError> {
        let TransportSession {
            connection_id,
            outbound,
            inbound,
        } = session;

        let status = {
            let mut st = self.lock();
            if st.generation != generation {
                tracing::debug!(connection_id = %connection_id, "Late open discarded");
                return Err(ConnectionError::Cancelled);
            }

            match ClientMessage::JoinAdmin.encode() {
                Ok(frame) => {
                    if let Err(e) = outbound.try_send(frame) {
                        tracing::warn!(connection_id = %connection_id, error = %e, "Failed to send join-admin");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode join-admin"),
            }

            let reader = tokio::spawn(read_loop(
                Arc::downgrade(self),
                inbound,
                generation,
                connection_id.clone(),
            ));
            st.session = Some(Session { outbound, reader });
            st.attempt = None;
            st.state = ConnectionState::Connected;
            st.connection_id = Some(connection_id.clone());
            st.reconnect_attempt = 0;
            st.last_error = None;
            st.next_retry = None;
            self.record(&mut st)
        };

        tracing::info!(
            connection_id = %connection_id,
            endpoint = %self.endpoint,
            "Connected"
        );
        self.publish_status(&status);
        Ok(())
    }

    fn on_attempt_failed(self: &Arc<Self>, generation: u64, error: &ConnectionError) {
        let status = {
            let mut st = self.lock();
            if st.generation != generation {
                return;
            }
            st.attempt = None;
            st.last_error = Some(error.to_string());
            tracing::warn!(
                endpoint = %self.endpoint,
                attempt = st.reconnect_attempt,
                error = %error,
                "Connection attempt failed"
            );
            self.schedule_retry(&mut st)
        };
        self.publish_status(&status);
    }

    fn schedule_retry(self: &Arc<Self>, st: &mut ManagerState) -> ConnectionStatus {
        st.connection_id = None;
        if let Some(retry) = st.retry.take() {
            retry.abort();
        }

        if !self.policy.allows_retry(st.reconnect_attempt) {
            st.state = ConnectionState::Failed;
            st.next_retry = None;
            tracing::warn!(
                attempts = st.reconnect_attempt,
                "Reconnection attempts exhausted, waiting for manual reconnect"
            );
            return self.record(st);
        }

        st.reconnect_attempt += 1;
        let attempt = st.reconnect_attempt;
        let delay = self.policy.delay_for(attempt);
        let generation = st.generation;
        st.state = ConnectionState::Reconnecting;
        st.next_retry = Some(delay);

        let weak = Arc::downgrade(self);
        st.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_retry(generation);
            }
        }));

        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
        self.record(st)
    }

    fn fire_retry(self: &Arc<Self>, generation: u64) {
        let status = {
            let mut st = self.lock();
            if st.generation != generation || st.state != ConnectionState::Reconnecting {
                return;
            }
            // Running inside the timer task; detach instead of aborting it.
            st.retry = None;
            let _attempt = self.start_attempt(&mut st);
            self.record(&mut st)
        };
        self.publish_status(&status);
    }

    fn handle_frame(&self, generation: u64, connection_id: &ConnectionId, text: &str) {
        match decode_frame(text) {
            Ok(InboundFrame::Event { topic, payload }) => {
                if self.lock().generation != generation {
                    return;
                }
                self.dispatcher.publish(&topic, &payload);
            }
            Ok(InboundFrame::Connected { client_id }) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    client_id = %client_id,
                    "Repeated handshake frame ignored"
                );
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "Malformed frame dropped"
                );
            }
        }
    }

    fn on_closed(self: &Arc<Self>, generation: u64, reason: CloseReason) {
        let status = {
            let mut st = self.lock();
            if st.generation != generation {
                return;
            }
            // Running inside the reader task; release without aborting it.
            st.session = None;

            tracing::warn!(
                connection_id = ?st.connection_id.as_ref().map(ConnectionId::as_str),
                reason = %reason,
                "Connection closed"
            );

            match reason {
                CloseReason::ServerInitiated(message) => {
                    st.state = ConnectionState::Failed;
                    st.connection_id = None;
                    st.next_retry = None;
                    st.last_error = Some(ConnectionError::ServerTerminated(message).to_string());
                    self.record(&mut st)
                }
                CloseReason::Unexpected(message) => {
                    st.reconnect_attempt = 0;
                    st.last_error = Some(ConnectionError::Transport(message).to_string());
                    self.schedule_retry(&mut st)
                }
            }
        };
        self.publish_status(&status);
    }

    /// Cancel all pending work and close the session.
    ///
    /// Returns `None` when already disconnected with nothing to cancel.
    fn shutdown(&self, st: &mut ManagerState) -> Option<ConnectionStatus> {
        st.generation += 1;
        if let Some(retry) = st.retry.take() {
            retry.abort();
        }
        if let Some(attempt) = st.attempt.take() {
            attempt.abort.abort();
        }
        if let Some(session) = st.session.take() {
            session.close();
        }

        let was = st.state;
        st.state = ConnectionState::Disconnected;
        st.connection_id = None;
        st.reconnect_attempt = 0;
        st.last_error = None;
        st.next_retry = None;

        if was == ConnectionState::Disconnected {
            None
        } else {
            Some(self.record(st))
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let st = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(retry) = st.retry.take() {
            retry.abort();
        }
        if let Some(attempt) = st.attempt.take() {
            attempt.abort.abort();
        }
        if let Some(session) = st.session.take() {
            session.close();
        }
    }
}

async fn run_attempt(
    inner: Weak<Inner>,
    transport: Arc<dyn Transport>,
    endpoint: String,
    connect_timeout: Duration,
    generation: u64,
) -> Result<(), ConnectionError> {
    let outcome = match tokio::time::timeout(connect_timeout, transport.open(&endpoint)).await {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err(ConnectionError::transport(e.to_string())),
        Err(_) => Err(ConnectionError::Timeout(connect_timeout)),
    };

    let Some(inner) = inner.upgrade() else {
        return Err(ConnectionError::Cancelled);
    };

    match outcome {
        Ok(session) => inner.on_open(generation, session),
        Err(error) => {
            inner.on_attempt_failed(generation, &error);
            Err(error)
        }
    }
}

async fn read_loop(
    inner: Weak<Inner>,
    mut inbound: mpsc::Receiver<TransportEvent>,
    generation: u64,
    connection_id: ConnectionId,
) {
    let reason = loop {
        match inbound.recv().await {
            Some(TransportEvent::Message(text)) => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                inner.handle_frame(generation, &connection_id, &text);
            }
            Some(TransportEvent::Closed(reason)) => break reason,
            None => break CloseReason::Unexpected("transport ended without close".to_string()),
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.on_closed(generation, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::{MockMode, MockOutcome, MockTransport};
    use crate::ports::TransportError;
    use serde_json::{json, Value};
    use std::sync::Mutex as StdMutex;

    const JOIN_ADMIN: &str = r#"{"type":"join-admin"}"#;

    fn manager_with(transport: &MockTransport) -> ConnectionManager {
        ConnectionManager::new(
            "ws://realtime.test/ws",
            Arc::new(transport.clone()),
            EventDispatcher::new(),
            ReconnectPolicy::default(),
        )
    }

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) -> ConnectionStatus {
        let mut rx = manager.watch_status();
        let status = rx.wait_for(|s| s.state == state).await.unwrap().clone();
        status
    }

    #[tokio::test]
    async fn connect_opens_transport_and_joins_admin() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);

        manager.connect().await.unwrap();

        assert!(manager.is_connected());
        assert_eq!(manager.id(), Some(ConnectionId::new("mock-1")));
        assert_eq!(manager.status().reconnect_attempt, 0);
        let conn = transport.last_connection().unwrap();
        assert_eq!(conn.sent(), vec![JOIN_ADMIN.to_string()]);
        assert_eq!(transport.endpoints(), vec!["ws://realtime.test/ws".to_string()]);
    }

    #[tokio::test]
    async fn connect_when_connected_is_noop() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();

        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_transport() {
        let transport = MockTransport::manual();
        let manager = manager_with(&transport);

        let (first, second, _) = tokio::join!(manager.connect(), manager.connect(), async {
            transport.next_attempt().await.unwrap().accept("shared")
        });

        assert_eq!(first, Ok(()));
        assert_eq!(second, Ok(()));
        assert_eq!(transport.open_count(), 1);
        assert_eq!(manager.id(), Some(ConnectionId::new("shared")));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_close_schedules_retry_after_base_delay() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);
        manager.connect().await.unwrap();

        let closed_at = tokio::time::Instant::now();
        transport
            .last_connection()
            .unwrap()
            .close(CloseReason::Unexpected("reset by peer".into()));

        let status = wait_for_state(&manager, ConnectionState::Reconnecting).await;
        assert!(!manager.is_connected());
        assert_eq!(status.reconnect_attempt, 1);
        assert_eq!(status.next_retry_ms, Some(1000));
        assert!(status.last_error.unwrap().contains("reset by peer"));

        wait_for_state(&manager, ConnectionState::Connected).await;
        assert!(closed_at.elapsed() >= Duration::from_secs(1));
        assert_eq!(transport.open_count(), 2);
        assert_eq!(manager.status().reconnect_attempt, 0);

        // join-admin is repeated on every open
        let reconnected = transport.last_connection().unwrap();
        assert_eq!(reconnected.sent(), vec![JOIN_ADMIN.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts_until_explicit_connect() {
        let transport = MockTransport::failing("connection refused");
        let manager = manager_with(&transport);

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Transport(_)));

        let status = wait_for_state(&manager, ConnectionState::Failed).await;
        assert_eq!(status.reconnect_attempt, 5);
        assert_eq!(transport.open_count(), 6);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.open_count(), 6);
        assert_eq!(manager.status().state, ConnectionState::Failed);

        transport.set_mode(MockMode::AutoAccept);
        manager.connect().await.unwrap();
        assert_eq!(manager.status().reconnect_attempt, 0);
        assert_eq!(transport.open_count(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_linearly() {
        let transport = MockTransport::failing("refused");
        let manager = manager_with(&transport);
        let mut rx = manager.watch_status();
        let mut delays = Vec::new();

        let _ = manager.connect().await;
        loop {
            let status = rx.borrow_and_update().clone();
            if status.state == ConnectionState::Reconnecting {
                if let Some(ms) = status.next_retry_ms {
                    if delays.last() != Some(&ms) {
                        delays.push(ms);
                    }
                }
            }
            if status.state == ConnectionState::Failed {
                break;
            }
            rx.changed().await.unwrap();
        }

        assert_eq!(delays, vec![1000, 2000, 3000, 4000, 5000]);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_open_times_out() {
        let transport = MockTransport::failing("refused").with_outcome(MockOutcome::Hang);
        let manager = manager_with(&transport);

        let started = tokio::time::Instant::now();
        let err = manager.connect().await.unwrap_err();

        assert_eq!(err, ConnectionError::Timeout(Duration::from_secs(10)));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(manager.status().state, ConnectionState::Reconnecting);
    }

    #[tokio::test]
    async fn disconnect_cancels_in_flight_attempt() {
        let transport = MockTransport::manual();
        let manager = manager_with(&transport);

        let (result, late) = tokio::join!(manager.connect(), async {
            let attempt = transport.next_attempt().await.unwrap();
            manager.disconnect();
            attempt.accept("too-late")
        });

        assert_eq!(result, Err(ConnectionError::Cancelled));
        assert!(late.client_closed());
        assert!(!manager.is_connected());
        assert_eq!(manager.status().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_closes_session_and_resets() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);
        manager.connect().await.unwrap();

        manager.disconnect();

        let conn = transport.last_connection().unwrap();
        assert!(conn.client_closed());
        assert_eq!(manager.id(), None);
        let status = manager.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_retry() {
        let transport = MockTransport::failing("refused");
        let manager = manager_with(&transport);
        let _ = manager.connect().await;
        assert_eq!(manager.status().state, ConnectionState::Reconnecting);
        assert_eq!(manager.status().reconnect_attempt, 1);

        manager.disconnect();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.open_count(), 1);
        let status = manager.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.reconnect_attempt, 0);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn server_initiated_close_is_not_retried() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);
        manager.connect().await.unwrap();

        transport
            .last_connection()
            .unwrap()
            .close(CloseReason::ServerInitiated("code 1008: revoked".into()));

        let status = wait_for_state(&manager, ConnectionState::Failed).await;
        assert!(status.last_error.unwrap().contains("revoked"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn inbound_events_reach_dispatcher_and_malformed_are_dropped() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let _sub = manager.dispatcher().subscribe(Topic::ANALYTICS_UPDATE, move |payload: &Value| {
            let _ = tx.send(payload.clone());
            Ok(())
        });

        manager.connect().await.unwrap();
        let conn = transport.last_connection().unwrap();
        conn.push("{not json");
        conn.push(r#"{"payload":{}}"#);
        conn.push_event(&Topic::ANALYTICS_UPDATE, json!({"totalUsers": 42}));

        assert_eq!(rx.recv().await.unwrap(), json!({"totalUsers": 42}));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn transitions_are_published_on_connection_state_topic() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);
        let seen: Arc<StdMutex<Vec<ConnectionStatus>>> = Arc::new(StdMutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            manager.dispatcher().subscribe(Topic::CONNECTION_STATE, move |payload: &Value| {
                seen.lock().unwrap().push(serde_json::from_value(payload.clone())?);
                Ok(())
            })
        };

        manager.connect().await.unwrap();
        manager.disconnect();

        let states: Vec<ConnectionState> = seen.lock().unwrap().iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected
            ]
        );
        let revisions: Vec<u64> = seen.lock().unwrap().iter().map(|s| s.revision).collect();
        assert!(revisions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn last_lease_closes_connection() {
        let transport = MockTransport::new();
        let manager = manager_with(&transport);

        let first = manager.acquire();
        let second = manager.acquire();
        manager.connect().await.unwrap();
        assert_eq!(manager.active_consumers(), 2);

        drop(first);
        assert!(manager.is_connected());

        second.release();
        assert_eq!(manager.active_consumers(), 0);
        assert!(!manager.is_connected());
        assert!(transport.last_connection().unwrap().client_closed());
    }

    #[tokio::test]
    async fn failed_open_reports_transport_error() {
        let transport = MockTransport::with_mode(MockMode::AutoFail(TransportError::Handshake(
            "401 Unauthorized".into(),
        )));
        let manager = manager_with(&transport);

        let err = manager.connect().await.unwrap_err();

        assert!(err.to_string().contains("401 Unauthorized"));
        assert_eq!(
            manager.status().last_error.as_deref(),
            Some(err.to_string().as_str())
        );
    }
}
