//! Case-insensitive room lookup and lazy creation.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use tracing::debug;

use crate::fanout::SendPool;
use crate::metrics::ROOMS_CREATED_TOTAL;
use crate::room::Room;

/// All rooms known to the process, keyed by lowercased name.
///
/// Rooms are never removed. A room that loses its last member stays
/// registered, so the map only grows.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    pool: SendPool,
}

impl RoomRegistry {
    /// Create an empty registry whose rooms share a send pool with
    /// `send_concurrency` permits.
    pub fn new(send_concurrency: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            pool: SendPool::new(send_concurrency),
        }
    }

    /// Look up a room by name, creating it on first use.
    ///
    /// Names are compared case-insensitively. Concurrent calls for the same
    /// new name all receive the one instance that was inserted.
    pub fn room(&self, name: &str) -> Arc<Room> {
        let key = name.to_lowercase();
        if let Some(room) = self.rooms.get(&key) {
            return Arc::clone(room.value());
        }
        let entry = self.rooms.entry(key).or_insert_with(|| {
            debug!(room = name, "room created");
            counter!(ROOMS_CREATED_TOTAL).increment(1);
            Arc::new(Room::new(name, self.pool.clone()))
        });
        Arc::clone(entry.value())
    }

    /// Look up a room without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms
            .get(&name.to_lowercase())
            .map(|room| Arc::clone(room.value()))
    }

    /// Number of registered rooms, including empty ones.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room has been created yet.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Display names of all rooms, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rooms
            .iter()
            .map(|room| room.value().name().to_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(crate::hub::DEFAULT_SEND_CONCURRENCY)
    }
}
