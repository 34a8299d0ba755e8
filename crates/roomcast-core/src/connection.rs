//! Per-connection state and the capability surface handed to handlers.
//!
//! A [`Connection`] wraps one [`Transport`], owns a display name and the set of
//! rooms it belongs to, and has exactly one error path. Handlers never see the
//! concrete type; they get an `Arc<dyn Client>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dispatch::kind_of;
use crate::errors::ConnectionError;
use crate::ids::ConnectionId;
use crate::metrics::SEND_FAILURES_TOTAL;
use crate::room::Room;
use crate::transport::Transport;

/// Callback invoked when a connection's error path fires.
pub type ErrorObserver = Box<dyn Fn(&ConnectionError) + Send + Sync>;

/// What a message handler can do with the connection that sent the frame.
#[async_trait]
pub trait Client: Send + Sync {
    /// Stable identity of this connection.
    fn id(&self) -> &ConnectionId;

    /// Serialize `payload` and write it to the transport.
    ///
    /// Failures are not returned: they go down the connection's error path
    /// and reach the observers registered with [`on_error`](Self::on_error).
    async fn send(&self, payload: &Value);

    /// Current display name (empty until set).
    fn name(&self) -> String;

    /// Replace the display name. No validation.
    fn set_name(&self, name: String);

    /// Become a member of `room`. Both sides change under one lock.
    fn join(&self, room: &Arc<Room>);

    /// Stop being a member of `room`. Both sides change under one lock.
    fn leave(&self, room: &Arc<Room>);

    /// Register an observer for this connection's error path.
    ///
    /// Observers run once, in registration order, on the first error.
    fn on_error(&self, observer: ErrorObserver);
}

impl dyn Client {
    /// Serialize any `Serialize` value and send it.
    pub async fn send_json<T: Serialize + ?Sized>(&self, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.send(&value).await,
            Err(e) => warn!(conn_id = %self.id(), error = %e, "failed to serialize payload"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error path
// ─────────────────────────────────────────────────────────────────────────────

/// Single-shot error fan-out.
///
/// The first reported error drains the observer list and runs every observer
/// in order. Later errors are logged and dropped, so a dead transport that
/// keeps failing never blocks its callers or re-runs cleanup.
#[derive(Default)]
struct ErrorPath {
    fired: AtomicBool,
    observers: Mutex<Vec<ErrorObserver>>,
}

impl ErrorPath {
    fn subscribe(&self, observer: ErrorObserver) {
        self.observers.lock().push(observer);
    }

    fn report(&self, conn_id: &ConnectionId, err: &ConnectionError) {
        if self.fired.swap(true, Ordering::AcqRel) {
            debug!(conn_id = %conn_id, error = %err, "error path already fired, dropping error");
            return;
        }
        let observers = std::mem::take(&mut *self.observers.lock());
        if err.is_closed() {
            debug!(conn_id = %conn_id, observers = observers.len(), "transport closed");
        } else {
            warn!(conn_id = %conn_id, error = %err, observers = observers.len(), "connection failed");
        }
        for observer in &observers {
            observer(err);
        }
    }

    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection
// ─────────────────────────────────────────────────────────────────────────────

/// One accepted transport session.
pub(crate) struct Connection {
    id: ConnectionId,
    name: RwLock<String>,
    /// Rooms keyed by their lowercased name.
    rooms: Mutex<HashMap<String, Arc<Room>>>,
    transport: Arc<dyn Transport>,
    errors: ErrorPath,
    me: Weak<Connection>,
}

impl Connection {
    /// Wrap a transport. The connection starts with an empty name and no rooms.
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id: ConnectionId::new(),
            name: RwLock::new(String::new()),
            rooms: Mutex::new(HashMap::new()),
            transport,
            errors: ErrorPath::default(),
            me: me.clone(),
        })
    }

    /// Wait for the next frame and split off its kind tag.
    ///
    /// Returns `None` once the transport has failed or closed; the failure has
    /// already been pushed down the error path by then.
    pub(crate) async fn receive(&self) -> Option<(String, Bytes)> {
        match self.transport.receive().await {
            Ok(raw) => Some((kind_of(&raw), raw)),
            Err(e) => {
                self.fail(&e.into());
                None
            }
        }
    }

    /// Snapshot of the rooms this connection belongs to.
    pub(crate) fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.lock().values().cloned().collect()
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.errors.has_fired()
    }

    fn fail(&self, err: &ConnectionError) {
        self.errors.report(&self.id, err);
    }
}

#[async_trait]
impl Client for Connection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send(&self, payload: &Value) {
        let frame = match serde_json::to_string(payload) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(&e.into());
                return;
            }
        };
        if let Err(e) = self.transport.send(frame).await {
            counter!(SEND_FAILURES_TOTAL).increment(1);
            self.fail(&e.into());
        }
    }

    fn name(&self) -> String {
        self.name.read().clone()
    }

    fn set_name(&self, name: String) {
        *self.name.write() = name;
    }

    fn join(&self, room: &Arc<Room>) {
        let Some(me) = self.me.upgrade() else { return };
        let mut rooms = self.rooms.lock();
        room.add_client(me);
        let _ = rooms.insert(room.key().to_owned(), Arc::clone(room));
        debug!(conn_id = %self.id, room = room.name(), "joined room");
    }

    fn leave(&self, room: &Arc<Room>) {
        let mut rooms = self.rooms.lock();
        room.remove_client(&self.id);
        let _ = rooms.remove(room.key());
        debug!(conn_id = %self.id, room = room.name(), "left room");
    }

    fn on_error(&self, observer: ErrorObserver) {
        self.errors.subscribe(observer);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::registry::RoomRegistry;
    use crate::transport::{MemoryPeer, MemoryTransport};
    use serde_json::json;

    fn make_connection() -> (Arc<Connection>, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair(32);
        (Connection::new(Arc::new(transport)), peer)
    }

    /// Records every error an observer sees, tagged with the observer's label.
    fn recording_observer(
        label: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> ErrorObserver {
        let log = Arc::clone(log);
        Box::new(move |err: &ConnectionError| log.lock().push(format!("{label}: {err}")))
    }

    #[test]
    fn starts_with_empty_name_and_no_rooms() {
        let (conn, _peer) = make_connection();
        assert_eq!(conn.name(), "");
        assert!(conn.rooms().is_empty());
        assert!(!conn.has_failed());
    }

    #[test]
    fn set_name_replaces_name() {
        let (conn, _peer) = make_connection();
        conn.set_name("User 1".into());
        assert_eq!(conn.name(), "User 1");
        conn.set_name(String::new());
        assert_eq!(conn.name(), "");
    }

    #[tokio::test]
    async fn send_serializes_payload() {
        let (conn, mut peer) = make_connection();
        conn.send(&json!({"message": "hi"})).await;
        let received = peer.recv_json().await.unwrap();
        assert_eq!(received, json!({"message": "hi"}));
    }

    #[tokio::test]
    async fn send_json_accepts_structs() {
        #[derive(Serialize)]
        struct Greeting {
            text: &'static str,
        }

        let (conn, mut peer) = make_connection();
        let client: Arc<dyn Client> = conn;
        client.send_json(&Greeting { text: "hello" }).await;
        assert_eq!(peer.recv_json().await.unwrap()["text"], "hello");
    }

    #[tokio::test]
    async fn send_failure_reaches_observers_in_order() {
        let (conn, mut peer) = make_connection();
        let log = Arc::new(Mutex::new(Vec::new()));
        conn.on_error(recording_observer("first", &log));
        conn.on_error(recording_observer("second", &log));

        peer.close();
        conn.send(&json!({"x": 1})).await;

        assert_eq!(
            *log.lock(),
            vec!["first: transport closed", "second: transport closed"]
        );
        assert!(conn.has_failed());
    }

    #[tokio::test]
    async fn write_failure_is_reported_as_send_error() {
        struct BrokenPipe;

        #[async_trait]
        impl Transport for BrokenPipe {
            async fn send(&self, _frame: String) -> Result<(), TransportError> {
                Err(TransportError::Send("broken pipe".into()))
            }
            async fn receive(&self) -> Result<Bytes, TransportError> {
                Err(TransportError::Closed)
            }
        }

        let conn = Connection::new(Arc::new(BrokenPipe));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        conn.on_error(Box::new(move |err: &ConnectionError| {
            sink.lock().push((err.to_string(), err.is_closed()));
        }));

        conn.send(&json!({"x": 1})).await;

        assert_eq!(*seen.lock(), vec![("send failed: broken pipe".to_owned(), false)]);
    }

    #[tokio::test]
    async fn observers_fire_only_once() {
        let (conn, mut peer) = make_connection();
        let log = Arc::new(Mutex::new(Vec::new()));
        conn.on_error(recording_observer("only", &log));

        peer.close();
        conn.send(&json!(1)).await;
        conn.send(&json!(2)).await;
        assert!(conn.receive().await.is_none());

        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn errors_without_observers_do_not_block() {
        let (conn, mut peer) = make_connection();
        peer.close();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            conn.send(&json!("a")).await;
            conn.send(&json!("b")).await;
            conn.receive().await
        })
        .await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn receive_splits_kind_and_keeps_raw_frame() {
        let (conn, peer) = make_connection();
        peer.send_text(r#"{"kind":"vote","A":"x"}"#).await.unwrap();
        let (kind, raw) = conn.receive().await.unwrap();
        assert_eq!(kind, "vote");
        let full: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(full["A"], "x");
    }

    #[tokio::test]
    async fn receive_error_is_end_of_stream() {
        let (conn, mut peer) = make_connection();
        let log = Arc::new(Mutex::new(Vec::new()));
        conn.on_error(recording_observer("obs", &log));
        peer.close();
        assert!(conn.receive().await.is_none());
        assert_eq!(*log.lock(), vec![format!("obs: {}", TransportError::Closed)]);
    }

    #[test]
    fn join_updates_both_sides() {
        let registry = RoomRegistry::new(8);
        let room = registry.room("Lobby");
        let (conn, _peer) = make_connection();

        conn.join(&room);

        assert_eq!(room.len(), 1);
        assert!(room.contains(conn.id()));
        assert_eq!(conn.rooms().len(), 1);
        assert!(Arc::ptr_eq(&conn.rooms()[0], &room));
    }

    #[test]
    fn leave_updates_both_sides() {
        let registry = RoomRegistry::new(8);
        let room = registry.room("Lobby");
        let (conn, _peer) = make_connection();

        conn.join(&room);
        conn.leave(&room);

        assert!(room.is_empty());
        assert!(conn.rooms().is_empty());
    }

    #[test]
    fn connection_can_be_in_several_rooms() {
        let registry = RoomRegistry::new(8);
        let a = registry.room("a");
        let b = registry.room("b");
        let (conn, _peer) = make_connection();

        conn.join(&a);
        conn.join(&b);
        assert_eq!(conn.rooms().len(), 2);

        conn.leave(&a);
        assert_eq!(conn.rooms().len(), 1);
        assert!(a.is_empty());
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn joining_twice_is_idempotent() {
        let registry = RoomRegistry::new(8);
        let room = registry.room("Lobby");
        let (conn, _peer) = make_connection();
        conn.join(&room);
        conn.join(&room);
        assert_eq!(room.len(), 1);
        assert_eq!(conn.rooms().len(), 1);
    }

    #[test]
    fn leaving_a_room_never_joined_is_a_no_op() {
        let registry = RoomRegistry::new(8);
        let room = registry.room("Lobby");
        let (conn, _peer) = make_connection();
        conn.leave(&room);
        assert!(room.is_empty());
        assert!(conn.rooms().is_empty());
    }

    #[test]
    fn concurrent_join_leave_keeps_sides_consistent() {
        let registry = Arc::new(RoomRegistry::new(8));
        let room = registry.room("busy");
        let conns: Vec<_> = (0..8).map(|_| make_connection()).collect();

        std::thread::scope(|scope| {
            for (i, (conn, _)) in conns.iter().enumerate() {
                let room = Arc::clone(&room);
                let _ = scope.spawn(move || {
                    for round in 0..200 {
                        conn.join(&room);
                        if (round + i) % 2 == 0 {
                            conn.leave(&room);
                        }
                    }
                });
            }
        });

        for (conn, _) in &conns {
            let in_room = room.contains(conn.id());
            let has_room = conn.rooms().iter().any(|r| Arc::ptr_eq(r, &room));
            assert_eq!(in_room, has_room, "membership diverged for {}", conn.id());
        }
    }
}
