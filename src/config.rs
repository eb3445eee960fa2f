//! Server configuration module
//! Handles dynamic configuration parameters for the relay

use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_GAME_SERVICE_URL, DEFAULT_HOST,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_PROXY_BODY, DEFAULT_PING_INTERVAL_SECS, DEFAULT_PORT,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SERVICE_TIMEOUT_SECS, DEFAULT_WRITE_TIMEOUT_SECS,
};
use crate::error::{Result, RoomRelayError};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the external game/room service
    pub game_service_url: Url,
    /// Bound of each client's outbound queue
    pub queue_capacity: usize,
    /// Read deadline; a connection silent for this long is dropped
    pub connection_timeout: Duration,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    pub service_timeout: Duration,
    pub max_message_size: usize,
    /// Largest request body the proxy buffers, in bytes
    pub max_proxy_body: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            game_service_url: Url::parse(DEFAULT_GAME_SERVICE_URL)
                .unwrap_or_else(|_| unreachable!("default service URL is valid")),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            service_timeout: Duration::from_secs(DEFAULT_SERVICE_TIMEOUT_SECS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_proxy_body: DEFAULT_MAX_PROXY_BODY,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables if available.
    /// A variable that is set but does not parse is an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env::var("ROOM_RELAY_HOST").unwrap_or(defaults.host);
        let port = parse_var("ROOM_RELAY_PORT")?.unwrap_or(defaults.port);

        let raw_url = env::var("ROOM_RELAY_GAME_SERVICE_URL")
            .or_else(|_| env::var("GAME_SERVICE_URL"))
            .unwrap_or_else(|_| DEFAULT_GAME_SERVICE_URL.to_string());
        let game_service_url = Self::parse_service_url(&raw_url)?;

        let queue_capacity =
            parse_var("ROOM_RELAY_QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity);

        let timeout_secs =
            parse_var("ROOM_RELAY_TIMEOUT")?.unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);
        let ping_secs = parse_var("ROOM_RELAY_PING")?.unwrap_or(DEFAULT_PING_INTERVAL_SECS);
        let write_secs =
            parse_var("ROOM_RELAY_WRITE_TIMEOUT")?.unwrap_or(DEFAULT_WRITE_TIMEOUT_SECS);
        let service_secs =
            parse_var("ROOM_RELAY_SERVICE_TIMEOUT")?.unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS);

        let max_message_size =
            parse_var("ROOM_RELAY_MAX_MESSAGE_SIZE")?.unwrap_or(defaults.max_message_size);
        let max_proxy_body =
            parse_var("ROOM_RELAY_MAX_PROXY_BODY")?.unwrap_or(defaults.max_proxy_body);

        let config = Self {
            host,
            port,
            game_service_url,
            queue_capacity,
            connection_timeout: Duration::from_secs(timeout_secs),
            ping_interval: Duration::from_secs(ping_secs),
            write_timeout: Duration::from_secs(write_secs),
            service_timeout: Duration::from_secs(service_secs),
            max_message_size,
            max_proxy_body,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and check the external service base URL
    pub fn parse_service_url(raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim()).map_err(|e| {
            RoomRelayError::ConfigError(format!("invalid game service URL '{}': {}", raw, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(RoomRelayError::ConfigError(format!(
                "game service URL must be http or https, got '{}'",
                other
            ))),
        }
    }

    /// Reject settings that would leave connections unbounded or unprobed
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(RoomRelayError::ConfigError(
                "outbound queue capacity must be at least 1".to_string(),
            ));
        }
        if self.ping_interval.is_zero() || self.ping_interval >= self.connection_timeout {
            return Err(RoomRelayError::ConfigError(format!(
                "ping interval ({:?}) must be non-zero and below the timeout ({:?})",
                self.ping_interval, self.connection_timeout
            )));
        }
        if self.write_timeout.is_zero() || self.service_timeout.is_zero() {
            return Err(RoomRelayError::ConfigError(
                "write and service timeouts must be non-zero".to_string(),
            ));
        }
        if self.max_message_size == 0 || self.max_proxy_body == 0 {
            return Err(RoomRelayError::ConfigError(
                "max message size and max proxy body must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address the server binds to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            RoomRelayError::ConfigError(format!(
                "invalid listen address {}:{}: {}",
                self.host, self.port, e
            ))
        })
    }
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, env::var(key).ok())
}

fn parse_value<T>(key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            RoomRelayError::ConfigError(format!("invalid value '{}' for {}: {}", raw, key, e))
        }),
    }
}
