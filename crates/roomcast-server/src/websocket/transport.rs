//! [`Transport`] over an axum WebSocket.
//!
//! The socket is split. Outbound frames go through a bounded queue to a
//! writer task that also owns the heartbeat: it pings on every interval tick
//! and closes the socket once nothing has been heard from the peer for the
//! pong timeout. Inbound frames are read directly by [`Transport::receive`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use parking_lot::Mutex;
use roomcast_core::{Transport, TransportError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::metrics::WS_HEARTBEAT_TIMEOUTS_TOTAL;

/// Ping cadence and liveness deadline for one socket.
#[derive(Clone, Copy, Debug)]
pub struct Heartbeat {
    /// Time between pings.
    pub interval: Duration,
    /// Silence after which the peer is considered gone.
    pub timeout: Duration,
}

/// One accepted WebSocket, as seen by the hub.
pub struct WsTransport {
    outbound: mpsc::Sender<String>,
    inbound: tokio::sync::Mutex<SplitStream<WebSocket>>,
    last_seen: Arc<Mutex<Instant>>,
    /// Set by the writer when a socket write fails.
    write_error: Arc<Mutex<Option<String>>>,
    closed: CancellationToken,
}

impl WsTransport {
    /// Split `socket` and start its writer task.
    ///
    /// Cancelling `cancel` closes the socket; so does a missed heartbeat.
    /// Either way the next [`receive`](Transport::receive) reports
    /// [`TransportError::Closed`].
    pub fn spawn(
        socket: WebSocket,
        heartbeat: Heartbeat,
        queue_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let last_seen = Arc::new(Mutex::new(Instant::now()));
        let write_error = Arc::new(Mutex::new(None));

        let _ = tokio::spawn(run_writer(
            sink,
            rx,
            heartbeat,
            Writer {
                last_seen: Arc::clone(&last_seen),
                write_error: Arc::clone(&write_error),
                closed: cancel.clone(),
            },
        ));

        Self {
            outbound: tx,
            inbound: tokio::sync::Mutex::new(stream),
            last_seen,
            write_error,
            closed: cancel,
        }
    }

    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Why sends stopped working: a failed socket write, or a plain close.
    fn send_error(&self) -> TransportError {
        match self.write_error.lock().clone() {
            Some(reason) => TransportError::Send(reason),
            None => TransportError::Closed,
        }
    }
}

/// State the writer task shares with its transport.
struct Writer {
    last_seen: Arc<Mutex<Instant>>,
    write_error: Arc<Mutex<Option<String>>>,
    closed: CancellationToken,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(self.send_error());
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| self.send_error())
    }

    async fn receive(&self) -> Result<Bytes, TransportError> {
        let mut stream = self.inbound.lock().await;
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                () = self.closed.cancelled() => return Err(TransportError::Closed),
            };
            let msg = match next {
                None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
                Some(Ok(msg)) => msg,
            };
            self.touch();
            match msg {
                Message::Text(text) => return Ok(Bytes::copy_from_slice(text.as_str().as_bytes())),
                Message::Binary(data) => return Ok(data),
                Message::Ping(_) | Message::Pong(_) => trace!("heartbeat frame"),
                Message::Close(frame) => {
                    debug!(?frame, "peer closed socket");
                    self.closed.cancel();
                    return Err(TransportError::Closed);
                }
            }
        }
    }
}

/// Drain the outbound queue onto the socket and keep the heartbeat.
///
/// Exits when the queue closes, a write fails, the heartbeat expires or the
/// token is cancelled. On exit the token is cancelled so the reader stops too.
async fn run_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    heartbeat: Heartbeat,
    writer: Writer,
) {
    let Writer {
        last_seen,
        write_error,
        closed,
    } = writer;
    let mut ticker = tokio::time::interval(heartbeat.interval);
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    debug!(error = %e, "socket write failed");
                    *write_error.lock() = Some(e.to_string());
                    break;
                }
            }
            _ = ticker.tick() => {
                let silent = last_seen.lock().elapsed();
                if silent >= heartbeat.timeout {
                    warn!(silent_secs = silent.as_secs(), "heartbeat timed out, closing socket");
                    counter!(WS_HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                    break;
                }
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    *write_error.lock() = Some(e.to_string());
                    break;
                }
                trace!("sent ping");
            }
            () = closed.cancelled() => break,
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
    closed.cancel();
}
