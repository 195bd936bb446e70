//! Per-connection WebSocket task
//!
//! Owns one socket for its whole life: adds it to the registry, greets the
//! client, then multiplexes three things until the socket ends:
//! - frames queued by the dispatcher on this connection's outbound queue
//! - `register` announcements (and anything else) sent by the client
//! - periodic pings
//!
//! Every way out of the loop (close frame, end of stream, send or receive
//! error, eviction from the registry) falls through to the single `remove`
//! at the end.

use axum::extract::ws::{Message, WebSocket};
use handoff_common::{ClientMessage, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::registry::{ConnectionHandle, ConnectionRegistry, OutboundFrame};

const GREETING: &str = "Connected to the handoff notification service";

/// Why a connection task finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    ClientClosed,
    SendFailed,
    ReceiveFailed,
    QueueClosed,
}

impl std::fmt::Display for Exit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Exit::ClientClosed => "client closed",
            Exit::SendFailed => "send failed",
            Exit::ReceiveFailed => "receive failed",
            Exit::QueueClosed => "outbound queue closed",
        };
        f.write_str(text)
    }
}

/// Serve one upgraded WebSocket until it closes
pub async fn serve_connection(
    mut socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    ping_interval: Duration,
) {
    let (handle, mut outbound) = registry.add();
    info!(%handle, "Real-time client connected, total clients: {}", registry.len());

    let exit = run(&mut socket, &registry, handle, &mut outbound, ping_interval).await;

    // Evicted from the registry: tell the client instead of just hanging up.
    if exit == Exit::QueueClosed {
        let _ = socket.send(Message::Close(None)).await;
    }
    registry.remove(handle);
    info!(%handle, reason = %exit, "Real-time client disconnected");
}

async fn run(
    socket: &mut WebSocket,
    registry: &ConnectionRegistry,
    handle: ConnectionHandle,
    outbound: &mut mpsc::Receiver<OutboundFrame>,
    ping_interval: Duration,
) -> Exit {
    let greeting = ServerMessage::Connected {
        message: GREETING.to_string(),
    };
    let greeting = match serde_json::to_string(&greeting) {
        Ok(json) => json,
        Err(_) => return Exit::SendFailed,
    };
    if socket.send(Message::Text(greeting)).await.is_err() {
        return Exit::SendFailed;
    }

    let mut ping = tokio::time::interval(ping_interval);
    ping.reset();

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    return Exit::SendFailed;
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return Exit::QueueClosed;
                };
                if socket.send(Message::Text(frame.to_string())).await.is_err() {
                    return Exit::SendFailed;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(registry, handle, &text);
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        debug!(%handle, len = bytes.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => return Exit::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%handle, "WebSocket receive error: {}", e);
                        return Exit::ReceiveFailed;
                    }
                }
            }
        }
    }
}

/// Apply one text frame from a client
///
/// Malformed frames are logged and dropped; they never close the
/// connection. Returns `true` if the frame was understood and applied.
pub fn handle_client_frame(registry: &ConnectionRegistry, handle: ConnectionHandle, text: &str) -> bool {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Register { user_id, role }) => registry.register(handle, user_id, role),
        Err(e) => {
            debug!(%handle, "Dropping malformed client frame: {}", e);
            false
        }
    }
}
