/*
[INPUT]:  YAML configuration file (optional) and CLI overrides
[OUTPUT]: Parsed feed configuration and transport connect options
[POS]:    Configuration layer - static connection parameters
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};

use coindcx_feed_adapter::ws::socket_io_url;
use coindcx_feed_adapter::{ConnectOptions, FeedError, TransportMode};

use crate::channel::PriceChannel;

pub const DEFAULT_ENDPOINT: &str = "wss://stream.coindcx.com";
pub const DEFAULT_PRICE_EVENT: &str = "price-change";

/// Static configuration of the live price connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Socket.IO endpoint of the price stream
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Channel joined after connect
    #[serde(default)]
    pub channel: PriceChannel,
    /// Wire transport; only "websocket" is supported
    #[serde(default)]
    pub transport: TransportMode,
    /// Inbound event carrying price updates
    #[serde(default = "default_price_event")]
    pub price_event: String,
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            channel: PriceChannel::default(),
            transport: TransportMode::default(),
            price_event: default_price_event(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_price_event() -> String {
    DEFAULT_PRICE_EVENT.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    coindcx_feed_adapter::transport::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

impl FeedConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that could never produce a connection.
    pub fn validate(&self) -> Result<(), FeedError> {
        socket_io_url(&self.endpoint)?;
        if self.connect_timeout_ms == 0 {
            return Err(FeedError::Config(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.price_event.trim().is_empty() {
            return Err(FeedError::Config("price_event must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            endpoint: self.endpoint.clone(),
            mode: self.transport,
            connect_timeout: self.connect_timeout(),
        }
    }
}
