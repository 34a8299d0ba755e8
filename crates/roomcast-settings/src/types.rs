//! Settings schema.
//!
//! Every struct uses `camelCase` keys and `#[serde(default)]`, so a partial
//! file only needs the keys it changes.

use roomcast_core::HubConfig;
use roomcast_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomcastSettings {
    /// Network and WebSocket settings.
    pub server: ServerSettings,
    /// Room and dispatch settings.
    pub hub: HubSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl RoomcastSettings {
    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if !self.server.ws_path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.wsPath must start with '/', got {:?}",
                self.server.ws_path
            )));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if self.server.pong_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.pongTimeoutSecs must not be shorter than the heartbeat interval".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.hub.send_concurrency == 0 {
            return Err(SettingsError::InvalidValue(
                "hub.sendConcurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener and WebSocket settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port; 0 picks a free one.
    pub port: u16,
    /// Path of the WebSocket upgrade endpoint.
    pub ws_path: String,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without any inbound traffic before the socket is closed.
    pub pong_timeout_secs: u64,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before sends wait.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ws_path: "/ws".to_string(),
            heartbeat_interval_secs: 30,
            pong_timeout_secs: 60,
            max_message_size: 1024 * 1024,
            send_queue_capacity: 256,
        }
    }
}

/// Room registry and dispatch settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Maximum broadcast sends in flight across the process.
    pub send_concurrency: usize,
    /// Drop frames whose payload does not decode.
    pub strict_decoding: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        let config = HubConfig::default();
        Self {
            send_concurrency: config.send_concurrency,
            strict_decoding: config.strict_decoding,
        }
    }
}

impl From<&HubSettings> for HubConfig {
    fn from(settings: &HubSettings) -> Self {
        Self {
            send_concurrency: settings.send_concurrency,
            strict_decoding: settings.strict_decoding,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// `compact` or `json`.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
