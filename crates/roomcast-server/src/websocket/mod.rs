//! WebSocket upgrade handling and the socket-backed transport.

pub mod handler;
pub mod transport;

pub use transport::{Heartbeat, WsTransport};
