//! WebSocket endpoint for live notifications

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use crate::realtime::socket::serve_connection;
use crate::AppState;

/// GET /ws - upgrade to a real-time connection
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let registry = state.registry.clone();
    let ping_interval = state.ping_interval;

    ws.on_upgrade(move |socket| serve_connection(socket, registry, ping_interval))
}
