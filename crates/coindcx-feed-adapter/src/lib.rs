/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public CoinDCX feed adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod error;
pub mod socketio;
pub mod transport;
pub mod ws;

pub use error::{FeedError, Result};

// Re-export commonly used types from transport
pub use transport::{
    ConnectOptions,
    EventEmitter,
    Transport,
    TransportHandle,
    TransportListener,
    TransportMode,
    mock::{MockConnection, MockTransport},
};

// Re-export commonly used types from ws
pub use ws::{WebSocketHandle, WebSocketTransport};
