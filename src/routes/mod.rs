use axum::Router;

use crate::state::SharedState;

/// Caller extraction.
pub mod auth;
/// Challenge lifecycle routes.
pub mod challenge;
/// OpenAPI/Swagger routes.
pub mod docs;
/// Health routes.
pub mod health;
/// Statistics routes.
pub mod stats;
/// WebSocket routes.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(challenge::router())
        .merge(stats::router())
        .merge(docs::router())
        .with_state(state)
}
