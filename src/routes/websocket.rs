use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    services::{identity, websocket_service},
    state::SharedState,
};

/// Credentials supplied with the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer credential; browsers cannot set headers on WebSocket upgrades.
    pub token: String,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "realtime",
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Authenticate and upgrade the HTTP connection into an event stream.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let user = identity::authenticate(&state, &query.token)
        .await
        .map_err(AppError::from)?;

    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(shared_state, socket, user.uid)
    }))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
