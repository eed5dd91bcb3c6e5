/*
[INPUT]:  Socket.IO endpoint URL, connect timeout, transport listener
[OUTPUT]: Listener callbacks for connect, connect_error, disconnect and events
[POS]:    WebSocket layer - real transport over tokio-tungstenite
[UPDATE]: When changing handshake, heartbeat or close handling
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FeedError, Result};
use crate::socketio::{DEFAULT_NAMESPACE, ENGINE_IO_VERSION, EnginePacket, Handshake, SocketPacket};
use crate::transport::{
    ConnectOptions, EventEmitter, Transport, TransportHandle, TransportListener, TransportMode,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const REASON_TIMEOUT: &str = "timeout";
pub const REASON_SERVER_DISCONNECT: &str = "io server disconnect";
pub const REASON_CLIENT_DISCONNECT: &str = "io client disconnect";
pub const REASON_PING_TIMEOUT: &str = "ping timeout";
pub const REASON_TRANSPORT_CLOSE: &str = "transport close";
pub const REASON_TRANSPORT_ERROR: &str = "transport error";

/// Build the Engine.IO WebSocket URL for a Socket.IO endpoint.
///
/// `wss://stream.coindcx.com` becomes
/// `wss://stream.coindcx.com/socket.io/?EIO=4&transport=websocket`.
pub fn socket_io_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(FeedError::Config(format!(
                "unsupported endpoint scheme '{other}'"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| FeedError::Config(format!("cannot use scheme '{scheme}' for {endpoint}")))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.query_pairs_mut()
        .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
        .append_pair("transport", TransportMode::Websocket.as_str());

    Ok(url)
}

/// Socket.IO client transport over a single WebSocket.
///
/// No reconnection is attempted: once a connection fails or closes the
/// handle stays down until the caller opens a new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn name(&self) -> &'static str {
        TransportMode::Websocket.as_str()
    }

    fn open(
        &self,
        options: &ConnectOptions,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportHandle>> {
        let url = socket_io_url(&options.endpoint)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| FeedError::Runtime(err.to_string()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(ConnectionShared {
            id: Mutex::new(None),
            connected: AtomicBool::new(false),
            commands: command_tx,
        });

        let worker = ConnectionWorker {
            url,
            connect_timeout: options.connect_timeout,
            listener,
            shared: shared.clone(),
            commands: command_rx,
        };
        runtime.spawn(worker.run());

        Ok(Box::new(WebSocketHandle { shared }))
    }
}

#[derive(Debug)]
enum Command {
    Frame(String),
    Close,
}

#[derive(Debug)]
struct ConnectionShared {
    id: Mutex<Option<String>>,
    connected: AtomicBool,
    commands: mpsc::UnboundedSender<Command>,
}

impl ConnectionShared {
    fn set_id(&self, id: Option<String>) {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }
}

impl EventEmitter for ConnectionShared {
    fn emit(&self, event: &str, data: Value) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(FeedError::NotConnected);
        }
        let frame = EnginePacket::Message(SocketPacket::event(event, data)).encode()?;
        self.commands
            .send(Command::Frame(frame))
            .map_err(|_| FeedError::NotConnected)
    }
}

/// Handle returned by [`WebSocketTransport::open`]. Dropping it closes the connection.
#[derive(Debug)]
pub struct WebSocketHandle {
    shared: Arc<ConnectionShared>,
}

impl EventEmitter for WebSocketHandle {
    fn emit(&self, event: &str, data: Value) -> Result<()> {
        self.shared.emit(event, data)
    }
}

impl TransportHandle for WebSocketHandle {
    fn id(&self) -> Option<String> {
        self.shared
            .id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn close(&self) {
        let _ = self.shared.commands.send(Command::Close);
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.close();
    }
}

enum HandshakeOutcome {
    Connected {
        stream: WsStream,
        handshake: Handshake,
        sid: String,
    },
    Refused(String),
}

struct ConnectionWorker {
    url: Url,
    connect_timeout: Duration,
    listener: Arc<dyn TransportListener>,
    shared: Arc<ConnectionShared>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl ConnectionWorker {
    async fn run(mut self) {
        info!(url = %self.url, "connecting to socket.io endpoint");

        let attempt = tokio::time::timeout(self.connect_timeout, handshake(&self.url));
        let outcome = tokio::select! {
            result = attempt => result,
            _ = wait_for_close(&mut self.commands) => {
                debug!(url = %self.url, "connection closed before handshake completed");
                return;
            }
        };

        let (stream, handshake, sid) = match outcome {
            Ok(Ok(HandshakeOutcome::Connected { stream, handshake, sid })) => {
                (stream, handshake, sid)
            }
            Ok(Ok(HandshakeOutcome::Refused(message))) => {
                warn!(url = %self.url, reason = %message, "socket.io connect refused");
                self.listener.on_error(&message);
                return;
            }
            Ok(Err(err)) => {
                warn!(url = %self.url, error = %err, "socket.io connect failed");
                self.listener.on_error(&err.to_string());
                return;
            }
            Err(_) => {
                warn!(url = %self.url, timeout = ?self.connect_timeout, "socket.io connect timed out");
                self.listener.on_error(REASON_TIMEOUT);
                return;
            }
        };

        self.shared.set_id(Some(sid.clone()));
        self.shared.connected.store(true, Ordering::Release);
        info!(socket_id = %sid, "socket.io connected");
        self.listener.on_open(&sid, self.shared.as_ref());

        let reason = self.stream_loop(stream, &handshake).await;

        self.shared.connected.store(false, Ordering::Release);
        self.shared.set_id(None);
        info!(socket_id = %sid, reason, "socket.io disconnected");
        self.listener.on_close(reason);
    }

    async fn stream_loop(&mut self, stream: WsStream, handshake: &Handshake) -> &'static str {
        let (mut write, mut read) = stream.split();
        let heartbeat =
            Duration::from_millis(handshake.ping_interval.saturating_add(handshake.ping_timeout));
        let mut deadline = Instant::now() + heartbeat;

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Frame(frame)) => {
                            debug!(bytes = frame.len(), "socket.io frame sent");
                            if write.send(WsMessage::Text(frame.into())).await.is_err() {
                                return REASON_TRANSPORT_ERROR;
                            }
                        }
                        Some(Command::Close) | None => {
                            if let Ok(frame) = EnginePacket::Message(SocketPacket::disconnect()).encode() {
                                let _ = write.send(WsMessage::Text(frame.into())).await;
                            }
                            let _ = write.send(WsMessage::Close(None)).await;
                            return REASON_CLIENT_DISCONNECT;
                        }
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            match EnginePacket::decode(text.as_str()) {
                                Ok(EnginePacket::Ping(data)) => {
                                    deadline = Instant::now() + heartbeat;
                                    let Ok(pong) = EnginePacket::Pong(data).encode() else {
                                        return REASON_TRANSPORT_ERROR;
                                    };
                                    if write.send(WsMessage::Text(pong.into())).await.is_err() {
                                        return REASON_TRANSPORT_ERROR;
                                    }
                                }
                                Ok(EnginePacket::Close) => return REASON_TRANSPORT_CLOSE,
                                Ok(EnginePacket::Message(packet)) if packet.namespace() != DEFAULT_NAMESPACE => {
                                    debug!(namespace = packet.namespace(), "ignoring packet for other namespace");
                                }
                                Ok(EnginePacket::Message(SocketPacket::Event { name, args, .. })) => {
                                    let data = args.into_iter().next().unwrap_or(Value::Null);
                                    self.listener.on_message(&name, &data);
                                }
                                Ok(EnginePacket::Message(SocketPacket::Disconnect { .. })) => {
                                    return REASON_SERVER_DISCONNECT;
                                }
                                Ok(other) => {
                                    debug!(packet = ?other, "ignoring socket.io packet");
                                }
                                Err(err) => {
                                    debug!(error = %err, bytes = text.len(), "dropping malformed socket.io packet");
                                }
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => return REASON_TRANSPORT_CLOSE,
                        Some(Ok(WsMessage::Binary(bytes))) => {
                            debug!(bytes = bytes.len(), "ignoring binary frame");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            debug!(error = %err, "websocket read failed");
                            return REASON_TRANSPORT_ERROR;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return REASON_PING_TIMEOUT;
                }
            }
        }
    }
}

async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match commands.recv().await {
            Some(Command::Close) | None => return,
            Some(Command::Frame(_)) => {}
        }
    }
}

async fn handshake(url: &Url) -> Result<HandshakeOutcome> {
    let (mut stream, _response) = connect_async(url.as_str()).await?;

    let handshake = match next_packet(&mut stream).await? {
        EnginePacket::Open(handshake) => handshake,
        other => {
            return Err(FeedError::Protocol(format!(
                "expected engine.io open packet, got {other:?}"
            )));
        }
    };
    debug!(
        sid = %handshake.sid,
        ping_interval = handshake.ping_interval,
        ping_timeout = handshake.ping_timeout,
        "engine.io session opened"
    );

    send_packet(&mut stream, EnginePacket::Message(SocketPacket::connect())).await?;

    loop {
        match next_packet(&mut stream).await? {
            EnginePacket::Message(packet) if packet.namespace() != DEFAULT_NAMESPACE => {
                debug!(namespace = packet.namespace(), "ignoring packet for other namespace during handshake");
            }
            EnginePacket::Message(SocketPacket::Connect { sid, .. }) => {
                let sid = sid.unwrap_or_else(|| handshake.sid.clone());
                return Ok(HandshakeOutcome::Connected {
                    stream,
                    handshake,
                    sid,
                });
            }
            EnginePacket::Message(SocketPacket::ConnectError { message, .. }) => {
                return Ok(HandshakeOutcome::Refused(message));
            }
            EnginePacket::Ping(data) => {
                send_packet(&mut stream, EnginePacket::Pong(data)).await?;
            }
            EnginePacket::Close => {
                return Err(FeedError::Protocol(
                    "engine.io session closed during handshake".to_string(),
                ));
            }
            other => {
                debug!(packet = ?other, "ignoring packet during handshake");
            }
        }
    }
}

async fn next_packet(stream: &mut WsStream) -> Result<EnginePacket> {
    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => return EnginePacket::decode(text.as_str()),
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(FeedError::WebSocket(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(WsMessage::Binary(_))) => {
                return Err(FeedError::Protocol(
                    "unexpected binary frame during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

async fn send_packet(stream: &mut WsStream, packet: EnginePacket) -> Result<()> {
    let frame = packet.encode()?;
    stream.send(WsMessage::Text(frame.into())).await?;
    Ok(())
}
