//! Process-wide state and the per-connection receive/dispatch loop.
//!
//! A [`Hub`] owns the room registry and the dispatch table. Whatever accepts
//! transports (the HTTP server, a test) hands each one to [`Hub::serve`],
//! which runs the connection until its transport fails or closes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::builtins::{JOIN, JoinPayload, register_builtins};
use crate::connection::{Client, Connection, ErrorObserver};
use crate::dispatch::DispatchTable;
use crate::errors::{ConfigError, ConnectionError};
use crate::metrics::{CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL};
use crate::registry::RoomRegistry;
use crate::room::Room;
use crate::transport::Transport;

/// Default cap on broadcast sends in flight across the process.
pub const DEFAULT_SEND_CONCURRENCY: usize = 1024;

/// Hub construction options.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Maximum broadcast sends in flight across every room.
    pub send_concurrency: usize,
    /// Drop frames whose payload fails to decode instead of handing the
    /// handler a default-valued payload.
    pub strict_decoding: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_concurrency: DEFAULT_SEND_CONCURRENCY,
            strict_decoding: false,
        }
    }
}

/// Owner of the room registry and dispatch table.
#[derive(Debug)]
pub struct Hub {
    registry: Arc<RoomRegistry>,
    dispatch: Arc<DispatchTable>,
    active: AtomicUsize,
}

impl Hub {
    /// Build a hub with an empty registry and the built-in kinds registered.
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new(config.send_concurrency));
        let dispatch = DispatchTable::new().with_strict_decoding(config.strict_decoding);
        register_builtins(&dispatch, &registry);
        Self {
            registry,
            dispatch: Arc::new(dispatch),
            active: AtomicUsize::new(0),
        }
    }

    /// The room registry.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    /// The dispatch table.
    pub fn dispatch(&self) -> Arc<DispatchTable> {
        Arc::clone(&self.dispatch)
    }

    /// Register a handler for `kind`. See [`DispatchTable::register`].
    pub fn register<T, F, Fut>(&self, kind: &str, handler: F) -> Result<(), ConfigError>
    where
        T: DeserializeOwned + Default + Send + 'static,
        F: Fn(Arc<dyn Client>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatch.register(kind, handler)
    }

    /// Number of connections currently being served.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Run the receive/dispatch loop for one accepted transport.
    ///
    /// Each frame is dispatched to completion before the next is read.
    /// Returns once the transport fails or closes; by then the connection has
    /// left the room it most recently joined with a `join` frame. A `join`
    /// frame that no handler ran for leaves the tracked room as it was.
    pub async fn serve(&self, transport: Arc<dyn Transport>) {
        let conn = Connection::new(transport);
        let current = Arc::new(Mutex::new(None::<Arc<Room>>));
        conn.on_error(evict_on_error(&conn, &current));

        let _active = ActiveGuard::enter(&self.active);
        info!(conn_id = %conn.id(), "connection opened");

        let client: Arc<dyn Client> = conn.clone();
        while let Some((kind, raw)) = conn.receive().await {
            let handled = self
                .dispatch
                .dispatch(&kind, Arc::clone(&client), raw.clone())
                .await;
            if handled && kind == JOIN {
                // Mirror what the join handler saw, which is the default
                // payload when lenient decoding failed.
                let payload: JoinPayload = serde_json::from_slice(&raw).unwrap_or_default();
                if let Some(room) = self.registry.get(&payload.room) {
                    *current.lock() = Some(room);
                }
            }
        }

        info!(conn_id = %conn.id(), name = %conn.name(), "connection closed");
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Observer that takes the connection out of its tracked room.
///
/// Holds the connection weakly so the observer list never keeps it alive.
fn evict_on_error(
    conn: &Arc<Connection>,
    current: &Arc<Mutex<Option<Arc<Room>>>>,
) -> ErrorObserver {
    let weak = Arc::downgrade(conn);
    let current = Arc::clone(current);
    Box::new(move |err: &ConnectionError| {
        let Some(conn) = weak.upgrade() else { return };
        if let Some(room) = current.lock().take() {
            conn.leave(&room);
            debug!(conn_id = %conn.id(), room = room.name(), error = %err, "evicted from room");
        }
    })
}

/// Counts a running loop in the hub and the active-connections gauge.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize) -> Self {
        let _ = active.fetch_add(1, Ordering::AcqRel);
        counter!(CONNECTIONS_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);
        Self(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::AcqRel);
        counter!(DISCONNECTIONS_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
