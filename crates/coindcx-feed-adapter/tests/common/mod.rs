/*
[INPUT]:  Test scenarios needing a Socket.IO peer
[OUTPUT]: Scripted local Socket.IO server and a recording listener
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for coindcx-feed-adapter tests

use std::time::Duration;

use coindcx_feed_adapter::socketio::{EnginePacket, Handshake, SocketPacket};
use coindcx_feed_adapter::{EventEmitter, TransportListener};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TEST_CHANNEL: &str = "B-BTC_USDT@prices";

/// How the server answers the client's namespace connect.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    Accept(String),
    Refuse(String),
    /// Accept the WebSocket but never send the Engine.IO open packet
    Silent,
}

/// One-shot Socket.IO peer on an ephemeral local port.
pub struct ScriptedServer {
    pub endpoint: String,
    /// Text frames received from the client, in order
    pub frames: mpsc::UnboundedReceiver<String>,
    /// Text frames to send to the client once the session is open
    pub push: mpsc::UnboundedSender<String>,
}

pub async fn spawn_server(reply: Reply) -> ScriptedServer {
    spawn_server_with_heartbeat(reply, 25_000, 20_000).await
}

/// Like [`spawn_server`], advertising the given heartbeat in the open packet.
pub async fn spawn_server_with_heartbeat(
    reply: Reply,
    ping_interval: u64,
    ping_timeout: u64,
) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let Ok((tcp, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = accept_async(tcp).await else {
            return;
        };

        if matches!(reply, Reply::Silent) {
            while let Some(Ok(_)) = ws.next().await {}
            return;
        }

        let open = EnginePacket::Open(Handshake {
            sid: "engine-sid".to_string(),
            upgrades: Vec::new(),
            ping_interval,
            ping_timeout,
            max_payload: Some(1_000_000),
        })
        .encode()
        .unwrap();
        if ws.send(Message::Text(open.into())).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                pushed = push_rx.recv() => {
                    let Some(frame) = pushed else {
                        let _ = ws.close(None).await;
                        return;
                    };
                    if ws.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                incoming = ws.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let text = text.to_string();
                            let _ = frames_tx.send(text.clone());
                            if text == "40" {
                                let answer = match &reply {
                                    Reply::Accept(sid) => SocketPacket::Connect {
                                        namespace: "/".to_string(),
                                        sid: Some(sid.clone()),
                                    },
                                    Reply::Refuse(message) => SocketPacket::ConnectError {
                                        namespace: "/".to_string(),
                                        message: message.clone(),
                                    },
                                    Reply::Silent => continue,
                                };
                                let frame = EnginePacket::Message(answer).encode().unwrap();
                                if ws.send(Message::Text(frame.into())).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    });

    ScriptedServer {
        endpoint: format!("ws://{addr}"),
        frames: frames_rx,
        push: push_tx,
    }
}

/// Listener that records every callback as a string and joins on open.
pub struct RecordingListener {
    events: mpsc::UnboundedSender<String>,
}

impl RecordingListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { events: tx }, rx)
    }
}

impl TransportListener for RecordingListener {
    fn on_open(&self, socket_id: &str, emitter: &dyn EventEmitter) {
        let _ = self.events.send(format!("open:{socket_id}"));
        if let Err(err) = emitter.emit("join", json!({ "channelName": TEST_CHANNEL })) {
            let _ = self.events.send(format!("emit-failed:{err}"));
        }
    }

    fn on_error(&self, reason: &str) {
        let _ = self.events.send(format!("error:{reason}"));
    }

    fn on_close(&self, reason: &str) {
        let _ = self.events.send(format!("close:{reason}"));
    }

    fn on_message(&self, event: &str, data: &Value) {
        let _ = self.events.send(format!("message:{event}:{data}"));
    }
}

/// Next item from `rx`, failing the test after two seconds.
pub async fn next_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}
