//! Per-user WebSocket connection lifecycle.
//!
//! Clients authenticate at upgrade time; afterwards the socket is a passive
//! event sink, with a small ping/pong liveness exchange.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientInboundMessage, EventEnvelope},
    state::{ClientConnection, SharedState},
};

/// Handle the full lifecycle for an authenticated client WebSocket.
pub async fn handle_socket(state: SharedState, socket: WebSocket, user_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound events flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.hub().register(
        &user_id,
        ClientConnection {
            id: connection_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(user_id, %connection_id, "websocket client connected");

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientInboundMessage>(&text) {
                Ok(ClientInboundMessage::Ping) => {
                    let pong = EventEnvelope::new("pong", serde_json::json!({}));
                    if let Ok(payload) = serde_json::to_string(&pong) {
                        let _ = outbound_tx.send(Message::Text(payload.into()));
                    }
                }
                Ok(ClientInboundMessage::Unknown) => {
                    debug!(user_id, "ignoring unknown websocket message");
                }
                Err(err) => {
                    warn!(user_id, error = %err, "failed to parse websocket message");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(user_id, error = %err, "websocket receive error");
                break;
            }
        }
    }

    state.hub().unregister(&user_id, connection_id);
    drop(outbound_tx);
    writer_task.abort();
    info!(user_id, %connection_id, "websocket client disconnected");
}
