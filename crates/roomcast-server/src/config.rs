//! Server configuration.

use std::time::Duration;

use roomcast_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the roomcast HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Route of the WebSocket upgrade endpoint.
    pub ws_path: String,
    /// Seconds between pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds of inbound silence before the socket is closed.
    pub pong_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames queued per connection.
    pub send_queue_capacity: usize,
}

impl ServerConfig {
    /// Interval between heartbeat pings.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Silence after which a connection is considered dead.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/ws".into(),
            heartbeat_interval_secs: 30,
            pong_timeout_secs: 60,
            max_message_size: 1024 * 1024,
            send_queue_capacity: 256,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            ws_path: s.ws_path.clone(),
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            pong_timeout_secs: s.pong_timeout_secs,
            max_message_size: s.max_message_size,
            send_queue_capacity: s.send_queue_capacity,
        }
    }
}
