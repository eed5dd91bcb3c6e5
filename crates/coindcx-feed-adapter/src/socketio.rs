/*
[INPUT]:  Text WebSocket frames carrying Engine.IO v4 / Socket.IO v4 packets
[OUTPUT]: Typed packets and their wire encoding
[POS]:    Protocol layer - framing shared by the real transport and test servers
[UPDATE]: When supporting new packet types or protocol revisions
*/

//! Engine.IO v4 / Socket.IO v4 text packet codec.
//!
//! Only the text encoding is handled. Binary attachments and
//! acknowledgement packets are rejected as protocol errors; the feed never
//! sends them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FeedError, Result};

/// Engine.IO protocol revision spoken by this codec.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Socket.IO namespace joined by default.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Handshake payload the server sends in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// Engine.IO transport-level packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO `message`.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        sid: Option<String>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        name: String,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

#[derive(Debug, Deserialize, Serialize)]
struct ConnectPayload {
    sid: String,
}

impl SocketPacket {
    /// Client request to join the default namespace.
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            sid: None,
        }
    }

    /// Client notice that it is leaving the default namespace.
    pub fn disconnect() -> Self {
        SocketPacket::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Named event on the default namespace with a single data argument.
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: name.into(),
            args: vec![data],
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    fn type_digit(&self) -> char {
        match self {
            SocketPacket::Connect { .. } => '0',
            SocketPacket::Disconnect { .. } => '1',
            SocketPacket::Event { .. } => '2',
            SocketPacket::ConnectError { .. } => '4',
        }
    }

    fn encode_into(&self, out: &mut String) -> Result<()> {
        out.push(self.type_digit());
        let namespace = self.namespace();
        let payload = match self {
            SocketPacket::Connect { sid, .. } => match sid {
                Some(sid) => Some(serde_json::to_string(&ConnectPayload { sid: sid.clone() })?),
                None => None,
            },
            SocketPacket::Disconnect { .. } => None,
            SocketPacket::Event { name, args, .. } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                Some(serde_json::to_string(&Value::Array(items))?)
            }
            SocketPacket::ConnectError { message, .. } => {
                Some(serde_json::to_string(&serde_json::json!({ "message": message }))?)
            }
        };

        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            if payload.is_some() {
                out.push(',');
            }
        }
        if let Some(payload) = payload {
            out.push_str(&payload);
        }
        Ok(())
    }

    fn decode(input: &str) -> Result<Self> {
        let mut chars = input.chars();
        let kind = chars
            .next()
            .ok_or_else(|| FeedError::Protocol("empty socket.io packet".to_string()))?;
        let rest = chars.as_str();

        let (namespace, rest) = split_namespace(rest);
        let (ack_id, body) = split_ack_id(rest);
        if ack_id.is_some() {
            return Err(FeedError::Protocol(
                "acknowledgement ids are not supported".to_string(),
            ));
        }

        match kind {
            '0' => {
                let sid = if body.is_empty() {
                    None
                } else {
                    let payload: ConnectPayload = serde_json::from_str(body)?;
                    Some(payload.sid)
                };
                Ok(SocketPacket::Connect { namespace, sid })
            }
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let value: Value = serde_json::from_str(body)?;
                let Value::Array(mut items) = value else {
                    return Err(FeedError::Protocol("event payload is not an array".to_string()));
                };
                if items.is_empty() {
                    return Err(FeedError::Protocol("event payload is empty".to_string()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(FeedError::Protocol("event name is not a string".to_string()));
                };
                Ok(SocketPacket::Event {
                    namespace,
                    name,
                    args: items,
                })
            }
            '4' => {
                let message = connect_error_message(body)?;
                Ok(SocketPacket::ConnectError { namespace, message })
            }
            '3' | '5' | '6' => Err(FeedError::Protocol(format!(
                "unsupported socket.io packet type '{kind}'"
            ))),
            other => Err(FeedError::Protocol(format!(
                "unknown socket.io packet type '{other}'"
            ))),
        }
    }
}

impl EnginePacket {
    /// Encode the packet as the text of a single WebSocket frame.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        match self {
            EnginePacket::Open(handshake) => {
                out.push('0');
                out.push_str(&serde_json::to_string(handshake)?);
            }
            EnginePacket::Close => out.push('1'),
            EnginePacket::Ping(data) => {
                out.push('2');
                out.push_str(data);
            }
            EnginePacket::Pong(data) => {
                out.push('3');
                out.push_str(data);
            }
            EnginePacket::Message(packet) => {
                out.push('4');
                packet.encode_into(&mut out)?;
            }
            EnginePacket::Upgrade => out.push('5'),
            EnginePacket::Noop => out.push('6'),
        }
        Ok(out)
    }

    /// Decode the text of a single WebSocket frame.
    pub fn decode(input: &str) -> Result<Self> {
        let mut chars = input.chars();
        let kind = chars
            .next()
            .ok_or_else(|| FeedError::Protocol("empty engine.io packet".to_string()))?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(rest.to_string())),
            '3' => Ok(EnginePacket::Pong(rest.to_string())),
            '4' => Ok(EnginePacket::Message(SocketPacket::decode(rest)?)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(FeedError::Protocol(format!(
                "unknown engine.io packet type '{other}'"
            ))),
        }
    }
}

fn split_namespace(input: &str) -> (String, &str) {
    if !input.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), input);
    }
    match input.find(',') {
        Some(idx) => (input[..idx].to_string(), &input[idx + 1..]),
        None => (input.to_string(), ""),
    }
}

fn split_ack_id(input: &str) -> (Option<u64>, &str) {
    let digits = input.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, input);
    }
    (input[..digits].parse().ok(), &input[digits..])
}

// Socket.IO v4 sends `{"message": ...}`; v2/v3 servers send a bare string.
fn connect_error_message(body: &str) -> Result<String> {
    if body.is_empty() {
        return Ok(String::new());
    }
    let value: Value = serde_json::from_str(body)?;
    Ok(match value {
        Value::String(message) => message,
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        other => other.to_string(),
    })
}
