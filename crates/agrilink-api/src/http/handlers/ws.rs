//! WebSocket handler for realtime presence, typing, and message delivery.
//!
//! The `/ws` endpoint upgrades an HTTP connection to a WebSocket. A
//! connection may be opened without a bearer token, but must send a
//! `join` event before it receives targeted events. Once connected, the
//! handler:
//!
//! - **Forwards events:** Drains the connection's personal channel (fed by
//!   the [`PresenceRegistry`]) and pushes every [`ServerEvent`] to the
//!   client as a JSON text frame.
//! - **Receives events:** Parses incoming text frames as [`ClientEvent`]
//!   and updates presence/room state or relays typing and delivery acks.
//!
//! Malformed frames are logged and dropped; the connection stays open.
//! Disconnection is an implicit unsubscribe from every room plus an
//! unregister -- stale handles from an already-superseded connection never
//! evict a newer registration.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use agrilink_core::presence::ConnectionHandle;
use agrilink_types::event::{ClientEvent, ServerEvent};

use crate::state::AppState;

/// Upgrade an HTTP request to a WebSocket connection for realtime events.
///
/// This is mounted at `/ws` in the router.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Core WebSocket connection handler.
///
/// Uses `tokio::select!` to multiplex between the connection's personal
/// event channel and incoming WebSocket messages from the client. This
/// keeps both sender and receiver in a single task, enabling bidirectional
/// communication over one socket.
async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let handle = ConnectionHandle::new(event_tx);

    loop {
        tokio::select! {
            // --- Branch 1: Forward registry events to the WebSocket client ---
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            // Client disconnected
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!("Failed to serialize ServerEvent: {err}");
                    }
                }
            }

            // --- Branch 2: Process events from the WebSocket client ---
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_event(&text, &handle, &state);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        // Client disconnected
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.presence.disconnect(handle.id());
    tracing::debug!(connection_id = %handle.id(), "WebSocket connection closed");
}

/// Parse and process a single event from the WebSocket client.
fn process_event(text: &str, handle: &ConnectionHandle, state: &AppState) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(
                raw = %text,
                error = %err,
                "Ignoring malformed WebSocket event"
            );
            return;
        }
    };

    match event {
        ClientEvent::Join { identity_id } => {
            state.presence.register_identity(identity_id, handle.clone());
            tracing::debug!(identity_id = %identity_id, connection_id = %handle.id(), "identity joined");
        }
        ClientEvent::JoinChat { thread_id } => {
            if state.presence.identity_of(&handle.id()).is_none() {
                tracing::warn!(connection_id = %handle.id(), "joinChat before join, ignoring");
                return;
            }
            state.presence.subscribe_to_thread(handle, thread_id);
        }
        ClientEvent::LeaveChat { thread_id } => {
            state.presence.unsubscribe_from_thread(handle.id(), thread_id);
        }
        ClientEvent::Typing { thread_id, is_typing } => {
            let Some(identity_id) = state.presence.identity_of(&handle.id()) else {
                tracing::warn!(connection_id = %handle.id(), "typing before join, ignoring");
                return;
            };
            // Ephemeral relay, at-most-once; clients expire stale
            // indicators after ~1s.
            state.presence.publish_to_thread_except(
                &thread_id,
                handle.id(),
                ServerEvent::UserTyping {
                    identity_id,
                    is_typing,
                },
            );
        }
        ClientEvent::MessageDelivered { thread_id, message_id } => {
            let Some(identity_id) = state.presence.identity_of(&handle.id()) else {
                tracing::warn!(connection_id = %handle.id(), "messageDelivered before join, ignoring");
                return;
            };
            state.presence.publish_to_thread_except(
                &thread_id,
                handle.id(),
                ServerEvent::MessageDelivered {
                    message_id,
                    delivered_to: identity_id,
                },
            );
        }
    }
}
