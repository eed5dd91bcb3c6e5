/*
[INPUT]:  Feed configuration + a `Transport` implementation
[OUTPUT]: One managed connection, its status via `watch`, diagnostic logs of price events
[POS]:    Connection layer - lifecycle of the single live price connection
[UPDATE]: When changing activation rules, status wording, or join semantics
*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use coindcx_feed_adapter::{EventEmitter, Transport, TransportHandle, TransportListener, WebSocketTransport};

use crate::config::FeedConfig;
use crate::status::{ConnectionState, ConnectionStatus};

pub const JOIN_EVENT: &str = "join";
const PAYLOAD_LOG_MAX_BYTES: usize = 1024;

/// Result of [`ConnectionManager::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// A new connection attempt was started.
    Opened,
    /// A connection is already connecting or connected; it was reused.
    AlreadyActive,
    /// The transport could not start an attempt; see the status.
    Failed,
}

/// Snapshot of the live connection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleSnapshot {
    pub id: Option<String>,
    pub connected: bool,
}

/// What the display layer shows next to the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub socket_id: Option<String>,
    pub connected: bool,
    pub endpoint: String,
    pub transport: &'static str,
}

/// Owns the single connection to the live price feed.
///
/// Status only changes in response to transport events. Events from a
/// connection that has since been deactivated or replaced are ignored.
pub struct ConnectionManager {
    config: FeedConfig,
    transport: Arc<dyn Transport>,
    shared: Arc<ManagerShared>,
}

struct ManagerShared {
    core: Mutex<ManagerCore>,
    status: watch::Sender<ConnectionStatus>,
    join_payload: Value,
    channel: String,
    price_event: String,
}

#[derive(Default)]
struct ManagerCore {
    generation: u64,
    state: ConnectionState,
    handle: Option<Box<dyn TransportHandle>>,
}

impl ManagerShared {
    fn lock(&self) -> MutexGuard<'_, ManagerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }
}

impl ConnectionManager {
    pub fn new(config: FeedConfig, transport: Arc<dyn Transport>) -> Self {
        let (status, _rx) = watch::channel(ConnectionStatus::Disconnected);
        let channel = config.channel.name();
        let shared = Arc::new(ManagerShared {
            core: Mutex::new(ManagerCore::default()),
            status,
            join_payload: json!({ "channelName": channel }),
            channel,
            price_event: config.price_event.clone(),
        });

        Self {
            config,
            transport,
            shared,
        }
    }

    /// Manager backed by the real Socket.IO WebSocket transport.
    pub fn with_websocket(config: FeedConfig) -> Self {
        Self::new(config, Arc::new(WebSocketTransport::new()))
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Open the connection, unless one is already connecting or connected.
    ///
    /// A handle left in `Disconnected` or `Failed` is closed and replaced.
    /// Failures are reported through the status, never returned.
    pub fn activate(&self) -> Activation {
        let mut core = self.shared.lock();

        if core.state.is_live() && core.handle.is_some() {
            debug!(state = ?core.state, "activate ignored; connection already active");
            return Activation::AlreadyActive;
        }

        if let Some(stale) = core.handle.take() {
            if core.state.is_terminal() {
                debug!(state = ?core.state, "closing previous connection before reactivating");
            } else {
                warn!(state = ?core.state, "replacing connection handle left in a non-terminal state");
            }
            stale.close();
        }

        core.generation = core.generation.wrapping_add(1);
        core.state = ConnectionState::Connecting;
        let listener = Arc::new(SessionListener {
            generation: core.generation,
            shared: Arc::downgrade(&self.shared),
        });

        info!(
            endpoint = %self.config.endpoint,
            transport = self.transport.name(),
            channel = %self.shared.channel,
            "initializing price stream connection"
        );

        match self.transport.open(&self.config.connect_options(), listener) {
            Ok(handle) => {
                core.handle = Some(handle);
                Activation::Opened
            }
            Err(err) => {
                warn!(error = %err, remote = err.is_remote(), "price stream connection could not be started");
                core.state = ConnectionState::Failed;
                self.shared.set_status(ConnectionStatus::Error(err.to_string()));
                Activation::Failed
            }
        }
    }

    /// Close the connection in whatever state it is in. Always ends `Idle`.
    pub fn deactivate(&self) {
        let mut core = self.shared.lock();
        core.generation = core.generation.wrapping_add(1);
        if let Some(handle) = core.handle.take() {
            info!(state = ?core.state, "cleaning up price stream connection");
            handle.close();
        }
        core.state = ConnectionState::Idle;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn handle(&self) -> Option<HandleSnapshot> {
        let core = self.shared.lock();
        core.handle.as_ref().map(|handle| HandleSnapshot {
            id: handle.id(),
            connected: handle.is_connected(),
        })
    }

    pub fn details(&self) -> ConnectionDetails {
        let snapshot = self.handle();
        ConnectionDetails {
            socket_id: snapshot.as_ref().and_then(|s| s.id.clone()),
            connected: snapshot.is_some_and(|s| s.connected),
            endpoint: self.config.endpoint.clone(),
            transport: self.transport.name(),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Listener registered for one activation.
struct SessionListener {
    generation: u64,
    shared: Weak<ManagerShared>,
}

impl SessionListener {
    /// Run `f` only while this activation is still the current one.
    fn with_current<F>(&self, f: F)
    where
        F: FnOnce(&ManagerShared, &mut ManagerCore),
    {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut core = shared.lock();
        if core.generation != self.generation || core.handle.is_none() {
            debug!(generation = self.generation, "ignoring event from inactive connection");
            return;
        }
        f(shared.as_ref(), &mut *core);
    }
}

impl TransportListener for SessionListener {
    fn on_open(&self, socket_id: &str, emitter: &dyn EventEmitter) {
        self.with_current(|shared, core| {
            core.state = ConnectionState::Connected;
            shared.set_status(ConnectionStatus::Connected);
            info!(socket_id, "connected to price stream");

            match emitter.emit(JOIN_EVENT, shared.join_payload.clone()) {
                Ok(()) => info!(channel = %shared.channel, "joined channel"),
                Err(err) => warn!(channel = %shared.channel, error = %err, "join request failed"),
            }
        });
    }

    fn on_error(&self, reason: &str) {
        self.with_current(|shared, core| {
            core.state = ConnectionState::Failed;
            shared.set_status(ConnectionStatus::Error(reason.to_string()));
            warn!(reason, "price stream connection failed");
        });
    }

    fn on_close(&self, reason: &str) {
        self.with_current(|shared, core| {
            core.state = ConnectionState::Disconnected;
            shared.set_status(ConnectionStatus::Closed(reason.to_string()));
            info!(reason, "price stream disconnected");
        });
    }

    fn on_message(&self, event: &str, data: &Value) {
        self.with_current(|shared, _core| {
            let preview = truncate_for_log(&data.to_string(), PAYLOAD_LOG_MAX_BYTES);
            if event == shared.price_event {
                info!(channel = %shared.channel, payload = %preview, "price update received");
            } else {
                debug!(event, payload = %preview, "unhandled feed event");
            }
        });
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
