/*
[INPUT]:  Socket.IO endpoint configuration and a transport listener
[OUTPUT]: Live WebSocket connections reporting through listener callbacks
[POS]:    WebSocket layer - real-time data stream handling
[UPDATE]: When changing connection logic
*/

pub mod client;

pub use client::{WebSocketHandle, WebSocketTransport, socket_io_url};
