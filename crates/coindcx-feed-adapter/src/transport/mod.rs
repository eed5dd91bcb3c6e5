/*
[INPUT]:  Endpoint, transport mode and a listener with four callback slots
[OUTPUT]: A live connection handle that can emit events and be closed
[POS]:    Transport seam - the capability consumers depend on
[UPDATE]: When adding transport modes or callback slots
*/

pub mod mock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Socket.IO client default for `timeout`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Wire transport used to reach the feed.
///
/// Only WebSocket is negotiated; there is no long-polling fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Websocket,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Websocket => "websocket",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static parameters of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub endpoint: String,
    pub mode: TransportMode,
    pub connect_timeout: Duration,
}

impl ConnectOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            mode: TransportMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Sends named events to the remote side of an open connection.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: &str, data: Value) -> Result<()>;
}

/// Receiver of connection events.
///
/// Callbacks for one connection are delivered in transport order from a
/// single task and never concurrently.
pub trait TransportListener: Send + Sync {
    /// The namespace handshake completed. `emitter` is usable immediately.
    fn on_open(&self, socket_id: &str, emitter: &dyn EventEmitter);

    /// The connection could not be established.
    fn on_error(&self, reason: &str);

    /// An established connection went away.
    fn on_close(&self, reason: &str);

    /// A named event arrived. `data` is opaque to the transport.
    fn on_message(&self, event: &str, data: &Value);
}

/// One connection produced by [`Transport::open`].
pub trait TransportHandle: EventEmitter {
    /// Session id assigned by the server, once connected.
    fn id(&self) -> Option<String>;

    fn is_connected(&self) -> bool;

    /// Release the connection. Safe to call in any state and more than once.
    fn close(&self);
}

/// Factory for connections to a real-time feed.
pub trait Transport: Send + Sync {
    /// Human-readable name for this transport
    fn name(&self) -> &'static str;

    /// Start connecting and return immediately; progress is reported to
    /// `listener`. An error here means no attempt was started.
    ///
    /// Implementations must not invoke `listener` before returning.
    fn open(
        &self,
        options: &ConnectOptions,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportHandle>>;
}
