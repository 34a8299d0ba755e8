//! The `join` and `broadcast` kinds.
//!
//! Both are stored through the same typed path as application kinds; only
//! the tag check of [`DispatchTable::register`] is skipped.

use std::future::ready;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::connection::Client;
use crate::dispatch::DispatchTable;
use crate::registry::RoomRegistry;

/// Kind tag for joining a room.
pub const JOIN: &str = "join";
/// Kind tag for broadcasting to a room.
pub const BROADCAST: &str = "broadcast";

/// Payload of a `join` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JoinPayload {
    /// Room to join; looked up case-insensitively.
    #[serde(alias = "Room")]
    pub room: String,
    /// New display name for the sender.
    #[serde(alias = "Name")]
    pub name: String,
}

/// Register the built-in kinds on `table`, resolving rooms through `registry`.
///
/// Both tags are constants known to be valid, so this skips kind validation
/// and cannot fail.
pub(crate) fn register_builtins(table: &DispatchTable, registry: &Arc<RoomRegistry>) {
    let rooms = Arc::clone(registry);
    table.insert(JOIN, move |client: Arc<dyn Client>, payload: JoinPayload| {
        client.set_name(payload.name);
        client.join(&rooms.room(&payload.room));
        ready(())
    });

    let rooms = Arc::clone(registry);
    table.insert(
        BROADCAST,
        move |client: Arc<dyn Client>, message: Map<String, Value>| {
            let name = room_field(&message);
            let room = rooms.room(name);
            debug!(conn_id = %client.id(), room = room.name(), "client broadcast");
            // The whole frame goes out, kind included.
            room.broadcast(Value::Object(message));
            ready(())
        },
    );
}

fn room_field(message: &Map<String, Value>) -> &str {
    message
        .get("room")
        .or_else(|| message.get("Room"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}
