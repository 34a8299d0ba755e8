//! `GET {ws_path}`: upgrade and hand the socket to the hub.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use metrics::counter;
use tracing::instrument;

use crate::metrics::WS_UPGRADES_TOTAL;
use crate::server::AppState;
use crate::websocket::transport::WsTransport;

/// Accept the upgrade and run the session on its own task.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    counter!(WS_UPGRADES_TOTAL).increment(1);
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            let shutdown = Arc::clone(&state.shutdown);
            shutdown.track(run_session(socket, state))
        })
}

#[instrument(name = "ws_session", skip_all)]
async fn run_session(socket: WebSocket, state: AppState) {
    let transport = WsTransport::spawn(
        socket,
        state.heartbeat,
        state.send_queue_capacity,
        state.shutdown.token().child_token(),
    );
    state.hub.serve(Arc::new(transport)).await;
}
