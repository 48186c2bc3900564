// src/server/routes.rs

//! The HTTP surface of the relay: the WebSocket upgrade and the user listing.

use super::websocket;
use crate::connection::{ConnectionHandler, Handshake};
use crate::core::listing::{UserListing, list_users};
use crate::core::metrics;
use crate::core::state::ServerState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds the application router.
///
/// - `GET /ws?id=<id>&name=<name>` upgrades to a WebSocket and runs a connection handler.
/// - `GET /users` lists the connected clients.
pub fn app(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/users", get(users))
        .with_state(state)
}

/// Upgrades the request and hands the resulting channel, with the handshake
/// parameters from the query string, to a new `ConnectionHandler`.
async fn ws_upgrade(
    State(state): State<Arc<ServerState>>,
    Query(handshake): Query<Handshake>,
    ws: WebSocketUpgrade,
) -> Response {
    let Ok(permit) = state.connection_permits.clone().try_acquire_owned() else {
        warn!(
            "Rejecting connection: max_clients ({}) reached.",
            state.config.max_clients
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "max clients reached").into_response();
    };

    state.stats.increment_total_connections();
    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
    debug!("Upgrading connection (id: {:?}, name: {:?})", handshake.id, handshake.name);

    ws.on_upgrade(move |socket| async move {
        let _permit = permit;
        let channel = websocket::into_duplex(socket);
        let mut handler = ConnectionHandler::new(channel, handshake, state);
        if let Err(e) = handler.run().await {
            debug!(
                "Session {} ended with error: {}",
                handler.session_id(),
                e
            );
        }
    })
}

/// Returns the ids and display names of all connected clients.
async fn users(State(state): State<Arc<ServerState>>) -> Json<UserListing> {
    Json(list_users(&state.registry).await)
}
