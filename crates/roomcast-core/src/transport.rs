//! The duplex channel beneath a connection.
//!
//! The core never sees sockets. It only needs a [`Transport`] that can send a
//! serialized frame and receive the next raw frame. The WebSocket binding
//! lives in `roomcast-server`; [`MemoryTransport`] is an in-process channel
//! pair for tests and embedders.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};

use crate::errors::TransportError;

/// One accepted duplex channel.
///
/// Both methods take `&self`: sends may come from several broadcast tasks at
/// once while the connection loop is parked in [`receive`](Self::receive).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Write one serialized frame.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Wait for the next inbound frame.
    ///
    /// A cleanly closed channel yields [`TransportError::Closed`]. After any
    /// error the transport is considered dead.
    async fn receive(&self) -> Result<Bytes, TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory transport
// ─────────────────────────────────────────────────────────────────────────────

/// Server half of an in-process channel pair.
pub struct MemoryTransport {
    outbound: mpsc::Sender<String>,
    inbound: Mutex<mpsc::Receiver<Bytes>>,
}

/// Client half of an in-process channel pair.
pub struct MemoryPeer {
    inbound: Option<mpsc::Sender<Bytes>>,
    outbound: mpsc::Receiver<String>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair with `capacity` frames of
    /// buffering in each direction.
    pub fn pair(capacity: usize) -> (Self, MemoryPeer) {
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let transport = Self {
            outbound: out_tx,
            inbound: Mutex::new(in_rx),
        };
        let peer = MemoryPeer {
            inbound: Some(in_tx),
            outbound: out_rx,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Bytes, TransportError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }
}

impl MemoryPeer {
    /// Push a raw text frame towards the server.
    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        let Some(tx) = &self.inbound else {
            return Err(TransportError::Closed);
        };
        tx.send(Bytes::copy_from_slice(text.as_bytes()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Serialize `value` and push it towards the server.
    pub async fn send_json(&self, value: &serde_json::Value) -> Result<(), TransportError> {
        self.send_text(&value.to_string()).await
    }

    /// Next frame the server sent, or `None` once the server side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Next frame the server sent, parsed as JSON.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let text = self.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// A frame the server already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Close both directions: the server's next receive yields
    /// [`TransportError::Closed`] and its sends start failing.
    pub fn close(&mut self) {
        self.inbound = None;
        self.outbound.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (transport, mut peer) = MemoryTransport::pair(8);

        peer.send_text(r#"{"kind":"ping"}"#).await.unwrap();
        let frame = transport.receive().await.unwrap();
        assert_eq!(&frame[..], br#"{"kind":"ping"}"#);

        transport.send("pong".into()).await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn close_ends_receive() {
        let (transport, mut peer) = MemoryTransport::pair(8);
        peer.close();
        assert_matches!(transport.receive().await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn close_fails_sends() {
        let (transport, mut peer) = MemoryTransport::pair(8);
        peer.close();
        assert_matches!(
            transport.send("late".into()).await,
            Err(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn peer_send_after_close_fails() {
        let (_transport, mut peer) = MemoryTransport::pair(8);
        peer.close();
        assert_matches!(peer.send_text("x").await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn dropped_peer_closes_transport() {
        let (transport, peer) = MemoryTransport::pair(8);
        drop(peer);
        assert_matches!(transport.receive().await, Err(TransportError::Closed));
        assert_matches!(transport.send("x".into()).await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn recv_json_parses() {
        let (transport, mut peer) = MemoryTransport::pair(8);
        transport.send(r#"{"a":1}"#.into()).await.unwrap();
        let value = peer.recv_json().await.unwrap();
        assert_eq!(value["a"], 1);
    }
}
