/*
[INPUT]:  Test-driven event injection (open, error, close, message)
[OUTPUT]: Scriptable transport with open-handle accounting and emit log
[POS]:    Transport seam - test double for consumers of `Transport`
[UPDATE]: When the transport traits change
*/

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{ConnectOptions, EventEmitter, Transport, TransportHandle, TransportListener};
use crate::error::{FeedError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory transport for tests.
///
/// Every `open` records a [`MockConnection`]; tests drive it by firing the
/// events a real transport would deliver. Events can still be fired after
/// the handle was closed, to simulate callbacks that arrive late.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

#[derive(Debug, Default)]
struct MockTransportState {
    connections: Vec<MockConnection>,
    options: Vec<ConnectOptions>,
    fail_next_open: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` fail synchronously with `reason`.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        lock(&self.state).fail_next_open = Some(reason.into());
    }

    /// Number of successful `open` calls so far.
    pub fn opened_count(&self) -> usize {
        lock(&self.state).connections.len()
    }

    /// Number of handles that have been opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        lock(&self.state)
            .connections
            .iter()
            .filter(|conn| !conn.is_closed())
            .count()
    }

    pub fn connection(&self, index: usize) -> Option<MockConnection> {
        lock(&self.state).connections.get(index).cloned()
    }

    pub fn last_connection(&self) -> Option<MockConnection> {
        lock(&self.state).connections.last().cloned()
    }

    /// Options passed to each `open`, in order.
    pub fn options(&self) -> Vec<ConnectOptions> {
        lock(&self.state).options.clone()
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(
        &self,
        options: &ConnectOptions,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportHandle>> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_next_open.take() {
            return Err(FeedError::WebSocket(reason));
        }

        let connection = MockConnection {
            inner: Arc::new(MockConnectionInner {
                listener,
                state: Mutex::new(MockConnectionState::default()),
            }),
        };
        state.connections.push(connection.clone());
        state.options.push(options.clone());

        Ok(Box::new(connection))
    }
}

/// One connection opened through [`MockTransport`].
#[derive(Clone)]
pub struct MockConnection {
    inner: Arc<MockConnectionInner>,
}

struct MockConnectionInner {
    listener: Arc<dyn TransportListener>,
    state: Mutex<MockConnectionState>,
}

#[derive(Debug, Default)]
struct MockConnectionState {
    id: Option<String>,
    connected: bool,
    closed: bool,
    emitted: Vec<(String, Value)>,
}

impl MockConnection {
    /// Deliver a successful connect with the given session id.
    pub fn fire_open(&self, socket_id: &str) {
        {
            let mut state = lock(&self.inner.state);
            state.id = Some(socket_id.to_string());
            state.connected = !state.closed;
        }
        self.inner.listener.on_open(socket_id, self);
    }

    /// Deliver a connect failure.
    pub fn fire_error(&self, reason: &str) {
        {
            let mut state = lock(&self.inner.state);
            state.connected = false;
        }
        self.inner.listener.on_error(reason);
    }

    /// Deliver a disconnect.
    pub fn fire_close(&self, reason: &str) {
        {
            let mut state = lock(&self.inner.state);
            state.id = None;
            state.connected = false;
        }
        self.inner.listener.on_close(reason);
    }

    /// Deliver an inbound event.
    pub fn fire_message(&self, event: &str, data: Value) {
        self.inner.listener.on_message(event, &data);
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.state).closed
    }

    /// Events emitted through this connection, in order.
    pub fn emitted(&self) -> Vec<(String, Value)> {
        lock(&self.inner.state).emitted.clone()
    }
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("MockConnection")
            .field("id", &state.id)
            .field("connected", &state.connected)
            .field("closed", &state.closed)
            .field("emitted", &state.emitted.len())
            .finish()
    }
}

impl EventEmitter for MockConnection {
    fn emit(&self, event: &str, data: Value) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if state.closed || !state.connected {
            return Err(FeedError::NotConnected);
        }
        state.emitted.push((event.to_string(), data));
        Ok(())
    }
}

impl TransportHandle for MockConnection {
    fn id(&self) -> Option<String> {
        lock(&self.inner.state).id.clone()
    }

    fn is_connected(&self) -> bool {
        lock(&self.inner.state).connected
    }

    fn close(&self) {
        let mut state = lock(&self.inner.state);
        state.closed = true;
        state.connected = false;
        state.id = None;
    }
}
