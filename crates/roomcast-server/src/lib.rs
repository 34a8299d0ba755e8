//! # roomcast-server
//!
//! Axum HTTP + `WebSocket` front for a roomcast [`Hub`](roomcast_core::Hub).
//!
//! - `GET {ws_path}`: upgrade, then one hub session per socket
//! - `GET /health`: uptime, connection and room counts
//! - `GET /metrics`: Prometheus exposition
//! - Heartbeat pings with a pong deadline per socket
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::RoomcastServer;
pub use shutdown::ShutdownCoordinator;
