/*
[INPUT]:  Error sources (WebSocket, Socket.IO framing, serialization, URL, runtime)
[OUTPUT]: Structured error types for the feed adapter
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the CoinDCX feed adapter
#[derive(Error, Debug)]
pub enum FeedError {
    /// WebSocket handshake or frame I/O failed
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Peer sent something that is not valid Engine.IO / Socket.IO
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Emit attempted on a connection that is not open
    #[error("Connection is not open")]
    NotConnected,

    /// No Tokio runtime to drive the connection task
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Check if the error was produced by the remote side rather than local setup
    pub fn is_remote(&self) -> bool {
        matches!(self, FeedError::WebSocket(_) | FeedError::Protocol(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::WebSocket(err.to_string())
    }
}

/// Result type alias for feed adapter operations
pub type Result<T> = std::result::Result<T, FeedError>;
