/*
[INPUT]:  Channel names from configuration or CLI (`B-BTC_USDT@prices`)
[OUTPUT]: Validated price channel for the join request
[POS]:    Configuration layer - subscription target
[UPDATE]: When supporting other channel kinds
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PRICES_SUFFIX: &str = "@prices";

pub const DEFAULT_CHANNEL: &str = "B-BTC_USDT@prices";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel '{0}' must end with '@prices'")]
    MissingSuffix(String),

    #[error("channel '{0}' must look like <market-prefix>-<base>_<quote>@prices")]
    Malformed(String),

    #[error("channel '{channel}' has an invalid {part}")]
    InvalidPart { channel: String, part: &'static str },
}

/// Price stream for one trading pair, e.g. `B-BTC_USDT@prices`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PriceChannel {
    prefix: String,
    base: String,
    quote: String,
}

impl PriceChannel {
    pub fn new(
        prefix: impl Into<String>,
        base: impl Into<String>,
        quote: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        let channel = Self {
            prefix: prefix.into(),
            base: base.into(),
            quote: quote.into(),
        };
        channel.validate()?;
        Ok(channel)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Wire name sent in the join request.
    pub fn name(&self) -> String {
        self.to_string()
    }

    fn validate(&self) -> Result<(), ChannelError> {
        for (part, value) in [
            ("market prefix", &self.prefix),
            ("base asset", &self.base),
            ("quote asset", &self.quote),
        ] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ChannelError::InvalidPart {
                    channel: self.to_string(),
                    part,
                });
            }
        }
        Ok(())
    }
}

impl Default for PriceChannel {
    fn default() -> Self {
        Self {
            prefix: "B".to_string(),
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
        }
    }
}

impl fmt::Display for PriceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}_{}{PRICES_SUFFIX}", self.prefix, self.base, self.quote)
    }
}

impl FromStr for PriceChannel {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let pair = s
            .strip_suffix(PRICES_SUFFIX)
            .ok_or_else(|| ChannelError::MissingSuffix(s.to_string()))?;
        let (prefix, pair) = pair
            .split_once('-')
            .ok_or_else(|| ChannelError::Malformed(s.to_string()))?;
        let (base, quote) = pair
            .split_once('_')
            .ok_or_else(|| ChannelError::Malformed(s.to_string()))?;
        Self::new(prefix, base, quote)
    }
}

impl TryFrom<String> for PriceChannel {
    type Error = ChannelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PriceChannel> for String {
    fn from(value: PriceChannel) -> Self {
        value.to_string()
    }
}
