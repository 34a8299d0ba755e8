//! Error taxonomy for roomcast.
//!
//! - [`ConfigError`]: rejected handler registrations, reported synchronously
//!   to the caller of `register`
//! - [`TransportError`]: failures of the underlying duplex channel
//! - [`ConnectionError`]: what travels down a connection's error path and
//!   reaches its observers
//!
//! Decode failures and unknown message kinds are deliberately not errors:
//! the dispatcher logs them and carries on.

use thiserror::Error;

/// A handler registration that was refused.
///
/// Non-callable handlers, handlers with the wrong arity and handlers whose
/// first parameter is not a client never reach this point: the signature of
/// [`DispatchTable::register`](crate::dispatch::DispatchTable::register)
/// rejects them at compile time. What remains are problems with the kind tag.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The kind tag was empty or whitespace only.
    #[error("message kind must not be empty")]
    EmptyKind,
    /// The kind tag contained characters that can never appear on the wire.
    #[error("invalid message kind {kind:?}: {reason}")]
    InvalidKind {
        /// The rejected kind.
        kind: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Failure of the transport beneath a connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer closed the channel, or the channel was dropped.
    #[error("transport closed")]
    Closed,
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),
    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),
}

/// An error delivered to a connection's error observers.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The transport failed while sending or receiving.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// An outbound payload could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ConnectionError {
    /// Whether this error means the peer went away, as opposed to a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
