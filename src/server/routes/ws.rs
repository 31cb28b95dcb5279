//! WebSocket Route
//!
//! Upgrades the HTTP connection and admits it into the registry.
//!
//! The group is chosen, in order, from the `Sec-WebSocket-Protocol` header,
//! the `group` query parameter, and the configured default group.

use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::server::state::AppState;
use crate::transport::websocket;

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub group: Option<String>,
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> Response {
    let subprotocol = requested_subprotocol(&headers);
    let group = resolve_group(subprotocol.as_deref(), params.group, &state.default_group);

    let ws = match &subprotocol {
        Some(protocol) => ws.protocols([protocol.clone()]),
        None => ws,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, group, subprotocol))
}

/// Admit an upgraded socket and wait for its loops to finish
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    group: String,
    subprotocol: Option<String>,
) {
    let (reader, writer) = websocket::split(socket);

    match state
        .registry
        .join(&group, subprotocol, Arc::clone(&state.transform), reader, writer)
        .await
    {
        Ok(handle) => {
            tracing::debug!(
                group = %group,
                session_id = %handle.session.id(),
                "WebSocket admitted"
            );
            handle.tasks.join().await;
        }
        Err(e) => {
            tracing::error!(group = %group, error = %e, "Failed to admit WebSocket connection");
        }
    }
}

/// First protocol listed in `Sec-WebSocket-Protocol`, if any
fn requested_subprotocol(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|protocol| !protocol.is_empty())
        .map(str::to_string)
}

fn resolve_group(subprotocol: Option<&str>, requested: Option<String>, default_group: &str) -> String {
    subprotocol
        .map(str::to_string)
        .or(requested.filter(|group| !group.is_empty()))
        .unwrap_or_else(|| default_group.to_string())
}
