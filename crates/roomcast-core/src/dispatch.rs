//! Kind-tag → typed handler dispatch.
//!
//! Handlers are registered per kind with a concrete payload type. At
//! registration the table erases the type behind a thunk that decodes the
//! raw frame into a fresh `T` and invokes the handler, so adding a kind never
//! touches the dispatcher.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use metrics::counter;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::connection::Client;
use crate::errors::ConfigError;
use crate::metrics::{FRAMES_DISPATCHED_TOTAL, FRAMES_DROPPED_TOTAL};

/// Decode and invoke; resolves to whether the handler ran.
type Thunk = Box<dyn Fn(Arc<dyn Client>, Bytes) -> BoxFuture<'static, bool> + Send + Sync>;

/// A registered kind: the payload type it decodes into and the erased call.
struct HandlerEntry {
    payload_type: &'static str,
    invoke: Thunk,
}

/// The outer structure every inbound frame carries.
///
/// `kind` is authoritative; `type` is read when `kind` is absent. Both are
/// also accepted capitalized, as older clients send `{"Type": "join", ...}`.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default, alias = "Kind")]
    kind: Option<String>,
    #[serde(default, rename = "type", alias = "Type")]
    legacy_kind: Option<serde_json::Value>,
}

/// Extract the kind tag from a raw frame without decoding the payload.
///
/// Frames that are not JSON objects or carry no kind yield `""`.
pub fn kind_of(raw: &[u8]) -> String {
    let Ok(envelope) = serde_json::from_slice::<Envelope>(raw) else {
        return String::new();
    };
    match (envelope.kind, envelope.legacy_kind) {
        (Some(kind), _) => kind,
        (None, Some(serde_json::Value::String(kind))) => kind,
        _ => String::new(),
    }
}

/// Mapping from kind tag to typed handler.
///
/// Read-mostly: dispatch takes a read lock only long enough to clone the
/// entry, so a concurrent `register` for the same kind lets an in-flight
/// dispatch run either the old or the new handler, never neither.
pub struct DispatchTable {
    handlers: RwLock<HashMap<String, Arc<HandlerEntry>>>,
    strict_decoding: bool,
}

impl DispatchTable {
    /// Create an empty table with best-effort decoding.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            strict_decoding: false,
        }
    }

    /// Drop frames whose payload fails to decode instead of passing
    /// `T::default()` to the handler.
    #[must_use]
    pub fn with_strict_decoding(mut self, strict: bool) -> Self {
        self.strict_decoding = strict;
        self
    }

    /// Register `handler` for frames tagged `kind`.
    ///
    /// The payload type `T` is decoded from the whole frame, so it may ignore
    /// the kind field. A later registration for the same kind replaces the
    /// earlier one.
    ///
    /// Without strict decoding, a payload that fails to decode reaches the
    /// handler as `T::default()` as a whole; fields that did parse are not
    /// kept.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use roomcast_core::{Client, DispatchTable};
    /// #[derive(Default, serde::Deserialize)]
    /// struct Vote {
    ///     #[serde(rename = "A")]
    ///     a: String,
    /// }
    ///
    /// let table = DispatchTable::new();
    /// table
    ///     .register("vote", |_client: Arc<dyn Client>, _vote: Vote| async {})
    ///     .unwrap();
    /// ```
    ///
    /// A handler must be callable:
    ///
    /// ```compile_fail
    /// # use roomcast_core::DispatchTable;
    /// let table = DispatchTable::new();
    /// let _ = table.register("x", 8);
    /// ```
    ///
    /// take exactly two parameters:
    ///
    /// ```compile_fail
    /// # use roomcast_core::DispatchTable;
    /// let table = DispatchTable::new();
    /// let _ = table.register("x", || async {});
    /// ```
    ///
    /// and take the client first:
    ///
    /// ```compile_fail
    /// # use roomcast_core::DispatchTable;
    /// let table = DispatchTable::new();
    /// let _ = table.register("x", |_s: String, _i: i64| async {});
    /// ```
    pub fn register<T, F, Fut>(&self, kind: &str, handler: F) -> Result<(), ConfigError>
    where
        T: DeserializeOwned + Default + Send + 'static,
        F: Fn(Arc<dyn Client>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        validate_kind(kind)?;
        self.insert(kind, handler);
        Ok(())
    }

    /// Store `handler` under `kind` without validating the tag.
    pub(crate) fn insert<T, F, Fut>(&self, kind: &str, handler: F)
    where
        T: DeserializeOwned + Default + Send + 'static,
        F: Fn(Arc<dyn Client>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let strict = self.strict_decoding;
        let label = kind.to_owned();
        let invoke: Thunk = Box::new(move |client: Arc<dyn Client>, raw: Bytes| -> BoxFuture<'static, bool> {
            let payload = match serde_json::from_slice::<T>(&raw) {
                Ok(payload) => payload,
                Err(e) if strict => {
                    warn!(kind = %label, conn_id = %client.id(), error = %e, "payload rejected");
                    counter!(FRAMES_DROPPED_TOTAL, "reason" => "decode").increment(1);
                    return Box::pin(std::future::ready(false));
                }
                Err(e) => {
                    debug!(kind = %label, conn_id = %client.id(), error = %e, "payload decoded to default");
                    T::default()
                }
            };
            let call = handler(client, payload);
            Box::pin(async move {
                call.await;
                true
            })
        });

        let entry = Arc::new(HandlerEntry {
            payload_type: std::any::type_name::<T>(),
            invoke,
        });
        let replaced = self.handlers.write().insert(kind.to_owned(), entry);
        debug!(
            kind,
            payload = std::any::type_name::<T>(),
            replaced = replaced.is_some(),
            "handler registered"
        );
    }

    /// Route one frame to its handler and run it to completion.
    ///
    /// Returns whether a handler ran. Frames of an unknown kind, and frames
    /// rejected by strict decoding, are dropped without error and yield
    /// `false`.
    pub async fn dispatch(&self, kind: &str, client: Arc<dyn Client>, raw: Bytes) -> bool {
        let entry = self.handlers.read().get(kind).cloned();
        let Some(entry) = entry else {
            trace!(kind, conn_id = %client.id(), "no handler for kind, frame dropped");
            counter!(FRAMES_DROPPED_TOTAL, "reason" => "unknown_kind").increment(1);
            return false;
        };
        counter!(FRAMES_DISPATCHED_TOTAL, "kind" => kind.to_owned()).increment(1);
        (entry.invoke)(client, raw).await
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Whether a handler is registered for `kind`.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.handlers.read().contains_key(kind)
    }

    /// Type name of the payload the handler for `kind` decodes into.
    pub fn payload_type(&self, kind: &str) -> Option<&'static str> {
        self.handlers.read().get(kind).map(|e| e.payload_type)
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("kinds", &self.kinds())
            .field("strict_decoding", &self.strict_decoding)
            .finish()
    }
}

pub(crate) fn validate_kind(kind: &str) -> Result<(), ConfigError> {
    if kind.trim().is_empty() {
        return Err(ConfigError::EmptyKind);
    }
    if kind.chars().any(char::is_control) {
        return Err(ConfigError::InvalidKind {
            kind: kind.to_owned(),
            reason: "contains control characters",
        });
    }
    Ok(())
}
