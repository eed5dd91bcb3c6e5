/*
[INPUT]:  Public API exports for coindcx-live-prices crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod channel;
pub mod config;
pub mod manager;
pub mod status;

// Re-export main types for convenience
pub use channel::PriceChannel;
pub use config::FeedConfig;
pub use manager::{Activation, ConnectionDetails, ConnectionManager, HandleSnapshot};
pub use status::{ConnectionState, ConnectionStatus};
