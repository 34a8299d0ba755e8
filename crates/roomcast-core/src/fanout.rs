//! Bounded fire-and-forget send pool used by room broadcasts.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::connection::Client;
use crate::metrics::BROADCAST_SENDS_TOTAL;

/// Caps the number of broadcast sends in flight across every room.
///
/// Each send runs on its own task and is never awaited by the broadcaster.
/// Tasks beyond the cap wait for a permit instead of writing.
#[derive(Clone, Debug)]
pub(crate) struct SendPool {
    permits: Arc<Semaphore>,
}

impl SendPool {
    pub(crate) fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Queue one send of `payload` to `client`.
    pub(crate) fn spawn_send(&self, client: Arc<dyn Client>, payload: Arc<Value>) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(conn_id = %client.id(), "broadcast outside a tokio runtime, send skipped");
            return;
        };
        let permits = Arc::clone(&self.permits);
        let _ = runtime.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            counter!(BROADCAST_SENDS_TOTAL).increment(1);
            client.send(&payload).await;
        });
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
