//! # roomcast-core
//!
//! Rooms, connections, and typed message dispatch over any duplex transport.
//!
//! - **Connections**: one per accepted [`Transport`], exposed to handlers as
//!   `Arc<dyn Client>` with a single-shot error path
//! - **Rooms**: case-insensitive, created on first lookup, fire-and-forget
//!   broadcast on a bounded send pool
//! - **Dispatch**: kind tag to typed handler, registered with
//!   [`Hub::register`] and decoded from the raw frame at dispatch time
//! - **Hub**: owns the registry and dispatch table and runs the per-connection
//!   receive/dispatch loop

#![deny(unsafe_code)]

pub mod builtins;
pub mod connection;
pub mod dispatch;
pub mod errors;
mod fanout;
pub mod hub;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod room;
pub mod transport;

pub use builtins::{BROADCAST, JOIN, JoinPayload};
pub use connection::{Client, ErrorObserver};
pub use dispatch::DispatchTable;
pub use errors::{ConfigError, ConnectionError, TransportError};
pub use hub::{Hub, HubConfig};
pub use ids::ConnectionId;
pub use registry::RoomRegistry;
pub use room::Room;
pub use transport::{MemoryPeer, MemoryTransport, Transport};
