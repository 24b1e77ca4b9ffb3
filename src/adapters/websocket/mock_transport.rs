//! Mock Transport for testing.
//!
//! Stands in for the WebSocket so the connection manager and consumers can
//! be exercised without a server.
//!
//! # Features
//!
//! - Scripted outcomes per open (accept, fail, hang)
//! - Manual mode: tests take each attempt and decide its fate
//! - Server-side handles to push frames and close sessions
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new()
//!     .with_outcome(MockOutcome::Fail(TransportError::Handshake("refused".into())))
//!     .with_outcome(MockOutcome::Accept);
//!
//! // first open fails, second succeeds
//! let conn = transport.last_connection().unwrap();
//! conn.push_event(&Topic::ALERT, json!({"level": "warn"}));
//! assert_eq!(conn.sent(), vec![r#"{"type":"join-admin"}"#]);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

use crate::domain::foundation::ConnectionId;
use crate::domain::realtime::Topic;
use crate::ports::{CloseReason, Transport, TransportError, TransportEvent, TransportSession};

const MOCK_BUFFER: usize = 256;

/// What happens to an open once the script is exhausted.
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Accept every open with a generated id.
    AutoAccept,
    /// Fail every open with this error.
    AutoFail(TransportError),
    /// Queue every open for [`MockTransport::next_attempt`].
    Manual,
}

/// Scripted outcome for one open, consumed in order.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Accept,
    Fail(TransportError),
    /// Never resolves; the caller's timeout decides.
    Hang,
}

struct MockInner {
    mode: Mutex<MockMode>,
    script: Mutex<VecDeque<MockOutcome>>,
    attempts_tx: mpsc::UnboundedSender<PendingAttempt>,
    attempts_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PendingAttempt>>,
    connections: Mutex<Vec<MockConnection>>,
    endpoints: Mutex<Vec<String>>,
    opens: AtomicUsize,
    next_id: AtomicU64,
}

/// Mock transport for testing.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a mock that accepts every open.
    pub fn new() -> Self {
        Self::with_mode(MockMode::AutoAccept)
    }

    /// Creates a mock with the given fallback mode.
    pub fn with_mode(mode: MockMode) -> Self {
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockInner {
                mode: Mutex::new(mode),
                script: Mutex::new(VecDeque::new()),
                attempts_tx,
                attempts_rx: tokio::sync::Mutex::new(attempts_rx),
                connections: Mutex::new(Vec::new()),
                endpoints: Mutex::new(Vec::new()),
                opens: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Creates a mock that fails every open with a handshake error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_mode(MockMode::AutoFail(TransportError::Handshake(message.into())))
    }

    /// Creates a mock whose opens wait for the test to resolve them.
    pub fn manual() -> Self {
        Self::with_mode(MockMode::Manual)
    }

    /// Appends a scripted outcome.
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.push_outcome(outcome);
        self
    }

    /// Appends a scripted outcome to a shared mock.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        lock(&self.inner.script).push_back(outcome);
    }

    /// Replaces the fallback mode.
    pub fn set_mode(&self, mode: MockMode) {
        *lock(&self.inner.mode) = mode;
    }

    /// Number of times `open` was called.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Endpoints passed to `open`, in call order.
    pub fn endpoints(&self) -> Vec<String> {
        lock(&self.inner.endpoints).clone()
    }

    /// Every session accepted so far.
    pub fn connections(&self) -> Vec<MockConnection> {
        lock(&self.inner.connections).clone()
    }

    /// Most recently accepted session.
    pub fn last_connection(&self) -> Option<MockConnection> {
        lock(&self.inner.connections).last().cloned()
    }

    /// Waits for the next open queued in manual mode.
    pub async fn next_attempt(&self) -> Option<PendingAttempt> {
        self.inner.attempts_rx.lock().await.recv().await
    }

    fn accept(&self, connection_id: ConnectionId) -> (TransportSession, MockConnection) {
        accept_session(&self.inner, connection_id)
    }

    fn generated_id(&self) -> ConnectionId {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        ConnectionId::new(format!("mock-{}", n))
    }
}

fn accept_session(inner: &MockInner, connection_id: ConnectionId) -> (TransportSession, MockConnection) {
    let (outbound_tx, outbound_rx) = mpsc::channel(MOCK_BUFFER);
    let (inbound_tx, inbound_rx) = mpsc::channel(MOCK_BUFFER);

    let connection = MockConnection {
        connection_id: connection_id.clone(),
        inbound: inbound_tx,
        outbound: Arc::new(Mutex::new(outbound_rx)),
        sent: Arc::new(Mutex::new(Vec::new())),
    };
    lock(&inner.connections).push(connection.clone());

    let session = TransportSession {
        connection_id,
        outbound: outbound_tx,
        inbound: inbound_rx,
    };
    (session, connection)
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, endpoint: &str) -> Result<TransportSession, TransportError> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.endpoints).push(endpoint.to_string());

        let scripted = lock(&self.inner.script).pop_front();
        let mode = lock(&self.inner.mode).clone();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => match mode {
                MockMode::AutoAccept => MockOutcome::Accept,
                MockMode::AutoFail(err) => MockOutcome::Fail(err),
                MockMode::Manual => {
                    let (reply, response) = oneshot::channel();
                    let attempt = PendingAttempt {
                        endpoint: endpoint.to_string(),
                        reply,
                        inner: Arc::clone(&self.inner),
                    };
                    if self.inner.attempts_tx.send(attempt).is_err() {
                        return Err(TransportError::Handshake("mock closed".into()));
                    }
                    return response.await.unwrap_or_else(|_| {
                        Err(TransportError::Handshake("attempt abandoned".into()))
                    });
                }
            },
        };

        match outcome {
            MockOutcome::Accept => {
                let id = self.generated_id();
                Ok(self.accept(id).0)
            }
            MockOutcome::Fail(err) => Err(err),
            MockOutcome::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// An open waiting for the test to resolve it.
pub struct PendingAttempt {
    endpoint: String,
    reply: oneshot::Sender<Result<TransportSession, TransportError>>,
    inner: Arc<MockInner>,
}

impl PendingAttempt {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Complete the open with `connection_id`.
    ///
    /// If the caller already gave up, the returned connection reports
    /// `client_closed() == true`.
    pub fn accept(self, connection_id: impl Into<ConnectionId>) -> MockConnection {
        let (session, connection) = accept_session(&self.inner, connection_id.into());
        let _ = self.reply.send(Ok(session));
        connection
    }

    /// Fail the open.
    pub fn fail(self, err: TransportError) {
        let _ = self.reply.send(Err(err));
    }
}

/// Server side of one accepted mock session.
#[derive(Clone)]
pub struct MockConnection {
    connection_id: ConnectionId,
    inbound: mpsc::Sender<TransportEvent>,
    outbound: Arc<Mutex<mpsc::Receiver<String>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockConnection {
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Deliver a raw text frame. Returns `false` if the client is gone.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound
            .try_send(TransportEvent::Message(text.into()))
            .is_ok()
    }

    /// Deliver `{"type": topic, "payload": payload}`.
    pub fn push_event(&self, topic: &Topic, payload: Value) -> bool {
        self.push(json!({ "type": topic.as_str(), "payload": payload }).to_string())
    }

    /// End the session from the server side.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.inbound.try_send(TransportEvent::Closed(reason)).is_ok()
    }

    /// Frames the client has sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.drain();
        lock(&self.sent).clone()
    }

    /// Whether the client closed its side of the session.
    pub fn client_closed(&self) -> bool {
        self.drain() || self.inbound.is_closed()
    }

    // Returns true once the client dropped its sender.
    fn drain(&self) -> bool {
        let mut outbound = lock(&self.outbound);
        let mut sent = lock(&self.sent);
        loop {
            match outbound.try_recv() {
                Ok(text) => sent.push(text),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
