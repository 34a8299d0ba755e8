//! A named broadcast group.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::Client;
use crate::fanout::SendPool;
use crate::ids::ConnectionId;
use crate::metrics::BROADCASTS_TOTAL;

/// A named set of connections.
///
/// Rooms are created by [`RoomRegistry::room`](crate::registry::RoomRegistry::room)
/// and live as long as the registry; an empty room stays registered.
/// Membership changes only through [`Client::join`] and [`Client::leave`].
pub struct Room {
    name: String,
    key: String,
    members: RwLock<HashMap<ConnectionId, Arc<dyn Client>>>,
    pool: SendPool,
}

impl Room {
    pub(crate) fn new(name: &str, pool: SendPool) -> Self {
        Self {
            name: name.to_owned(),
            key: name.to_lowercase(),
            members: RwLock::new(HashMap::new()),
            pool,
        }
    }

    /// The name as first looked up, with its original casing.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased name; the registry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Snapshot of the current members.
    pub fn clients(&self) -> Vec<Arc<dyn Client>> {
        self.members.read().values().cloned().collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Whether the connection with `id` is a member.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.read().contains_key(id)
    }

    /// Send `payload` to every current member.
    ///
    /// Each send runs independently on the send pool; this returns without
    /// waiting for any of them. No ordering holds between members, and a
    /// member leaving concurrently may or may not receive the payload.
    /// Per-member failures go to that member's error path.
    pub fn broadcast(&self, payload: Value) {
        let recipients = self.clients();
        counter!(BROADCASTS_TOTAL).increment(1);
        debug!(room = %self.name, recipients = recipients.len(), "broadcast");
        let payload = Arc::new(payload);
        for client in recipients {
            self.pool.spawn_send(client, Arc::clone(&payload));
        }
    }

    /// Serialize `payload` and [`broadcast`](Self::broadcast) it.
    pub fn broadcast_json<T: Serialize + ?Sized>(&self, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.broadcast(value),
            Err(e) => warn!(room = %self.name, error = %e, "failed to serialize broadcast payload"),
        }
    }

    pub(crate) fn add_client(&self, client: Arc<dyn Client>) {
        let _ = self.members.write().insert(client.id().clone(), client);
    }

    pub(crate) fn remove_client(&self, id: &ConnectionId) {
        let _ = self.members.write().remove(id);
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("members", &self.len())
            .finish_non_exhaustive()
    }
}
