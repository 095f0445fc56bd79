//! Per-socket handling: the upgrade, the reader/writer task pair, and the
//! dispatch of inbound events to the lobby and the relay.
//!
//! Each accepted socket is split into its two halves. The writer task drains
//! the connection's outbound channel, the reader task parses frames and
//! dispatches them one at a time under the state lock. Whichever task
//! finishes first aborts the other, after which the connection is cleaned
//! out of the rooms and the registry.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use protocol::ClientEvent;
use tokio::sync::mpsc;

use crate::lobby::{AppState, RelayCore};
use crate::message_relay;
use crate::registry::ConnectionId;

/// Upgrades the request to a web socket, unless an allowed origin is
/// configured and the request carries a different one.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(allowed) = &state.allowed_origin {
        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok());
        if origin.is_some_and(|origin| origin != allowed) {
            tracing::warn!(?origin, "Refused socket upgrade from a foreign origin.");
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    ws.on_upgrade(|socket| websocket(socket, state)).into_response()
}

/// Drives one connection from registration to clean-up.
async fn websocket(stream: WebSocket, state: Arc<AppState>) {
    // By splitting, we can send and receive at the same time.
    let (sender, receiver) = stream.split();

    let (connection, outbound) = {
        let mut core = state.core.lock().await;
        core.registry.register()
    };
    tracing::info!(%connection, "Connected.");

    let mut send_task = tokio::spawn(send_loop(sender, outbound));
    let reader_state = state.clone();
    let mut receive_task =
        tokio::spawn(async move { receive_loop(receiver, reader_state, connection).await });

    // If any one of the tasks runs to completion, we abort the other.
    let reason = tokio::select! {
        res_a = &mut send_task => { receive_task.abort(); res_a }
        res_b = &mut receive_task => { send_task.abort(); res_b }
    }
    .unwrap_or_else(|err| {
        tracing::error!(?err, "Panic while handling the connection.");
        "Internal panic while handling the connection."
    });

    {
        let mut core = state.core.lock().await;
        let RelayCore { registry, rooms } = &mut *core;
        rooms.disconnect(registry, connection);
        registry.deregister(connection);
    }
    tracing::info!(%connection, reason, "Disconnected.");
}

/// Pushes the queued outbound frames onto the socket.
async fn send_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Utf8Bytes>,
) -> &'static str {
    while let Some(frame) = outbound.recv().await {
        if sender.send(Message::Text(frame)).await.is_err() {
            return "Connection lost.";
        }
    }
    // The sender half lives in the registry, so this only happens once the
    // connection has been reaped.
    "Outbound channel closed."
}

/// Parses inbound frames and feeds them to the dispatch, one at a time, so
/// events from the same connection apply in arrival order.
async fn receive_loop(
    mut receiver: SplitStream<WebSocket>,
    state: Arc<AppState>,
    connection: ConnectionId,
) -> &'static str {
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => dispatch_event(&state, connection, event).await,
                Err(error) => {
                    // Malformed traffic never takes the connection down.
                    tracing::warn!(%connection, ?error, "Ignoring an unparseable frame.");
                }
            },
            Ok(Message::Close(_)) => {
                return "Client closed the connection.";
            }
            Ok(_) => {} // Ping, pong and binary frames carry no events.
            Err(_) => {
                return "Connection lost.";
            }
        }
    }
    "Connection lost."
}

/// Applies one inbound event under the state lock. The lock is never held
/// across an await, so events from all connections serialize cleanly and
/// each handler leaves the table consistent.
async fn dispatch_event(state: &AppState, connection: ConnectionId, event: ClientEvent) {
    let mut core = state.core.lock().await;
    let RelayCore { registry, rooms } = &mut *core;
    match event {
        ClientEvent::JoinRoom { room_id } => rooms.join(registry, connection, &room_id),
        ClientEvent::LeaveRoom { room_id } => rooms.leave(registry, connection, &room_id),
        ClientEvent::Move { room_id, board } => {
            message_relay::relay_move(rooms.table(), registry, connection, &room_id, board);
        }
        ClientEvent::GameOver { room_id, winner } => {
            message_relay::relay_outcome(rooms.table(), registry, &room_id, winner);
        }
    }
}
