//! Relay configuration parsed from environment variables.

use std::time::Duration;

use crate::fetch::FetchConfig;
use crate::fetch::client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_REDIRECTS};
use crate::relay::RelayOptions;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
    #[error("invalid boolean for {var}: {value}")]
    InvalidBool { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Hosts refused for both HTTP and WebSocket targets.
    pub blocked_hosts: Vec<String>,
    pub fetch: FetchConfig,
    /// Frames buffered between exchanges and the transport writer.
    pub outbound_queue: usize,
    pub relay: RelayOptions,
}

impl RelayConfig {
    /// Build typed relay config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `RELAY_BIND_ADDR`: default `0.0.0.0`
    /// - `RELAY_BLOCKED_HOSTS`: comma-separated host names
    /// - `RELAY_CONNECT_TIMEOUT_SECS`: default 10
    /// - `RELAY_REQUEST_TIMEOUT_SECS`: default 0 (no deadline)
    /// - `RELAY_MAX_REDIRECTS`: default 10
    /// - `RELAY_OUTBOUND_QUEUE`: default 256
    /// - `RELAY_CLOSE_SOCKETS_ON_DISCONNECT`: default false
    ///
    /// # Errors
    ///
    /// Returns an error for an unparseable `PORT` or boolean flag.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let bind_addr = lookup("RELAY_BIND_ADDR")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let blocked_hosts = lookup("RELAY_BLOCKED_HOSTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let request_timeout_secs = parse_or(&lookup, "RELAY_REQUEST_TIMEOUT_SECS", 0u64);
        let fetch = FetchConfig {
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "RELAY_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            request_timeout: (request_timeout_secs > 0).then(|| Duration::from_secs(request_timeout_secs)),
            max_redirects: parse_or(&lookup, "RELAY_MAX_REDIRECTS", DEFAULT_MAX_REDIRECTS),
        };

        let relay = RelayOptions {
            close_sockets_on_disconnect: parse_bool(&lookup, "RELAY_CLOSE_SOCKETS_ON_DISCONNECT", false)?,
        };

        Ok(Self {
            bind_addr,
            port,
            blocked_hosts,
            fetch,
            outbound_queue: parse_or(&lookup, "RELAY_OUTBOUND_QUEUE", DEFAULT_OUTBOUND_QUEUE).max(1),
            relay,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
