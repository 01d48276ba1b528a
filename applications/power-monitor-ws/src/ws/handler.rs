use crate::auth;
use crate::session::PageHandle;
use crate::ws::connection::handle_connection;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::Response,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub graph: PageHandle,
    pub monitor: PageHandle,
    pub jwt_secret: Option<String>,
    pub max_connections: usize,
    connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        graph: PageHandle,
        monitor: PageHandle,
        jwt_secret: Option<String>,
        max_connections: usize,
    ) -> Self {
        Self {
            graph,
            monitor,
            jwt_secret,
            max_connections,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Reserve a websocket slot; `None` once `max_connections` are open.
    pub fn try_connect(&self) -> Option<ConnectionSlot> {
        let previous = self.connections.fetch_add(1, Ordering::SeqCst);
        if previous >= self.max_connections {
            self.connections.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(ConnectionSlot {
            connections: self.connections.clone(),
        })
    }
}

/// Held for the lifetime of one websocket; frees its slot on drop.
pub struct ConnectionSlot {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Live graph page: /ws/graph?token=<JWT_TOKEN>
pub async fn ws_graph(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, StatusCode> {
    let handle = state.graph.clone();
    upgrade(ws, params, &state, handle)
}

/// Live monitor page: /ws/monitor?token=<JWT_TOKEN>
pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, StatusCode> {
    let handle = state.monitor.clone();
    upgrade(ws, params, &state, handle)
}

fn upgrade(
    ws: WebSocketUpgrade,
    params: HashMap<String, String>,
    state: &AppState,
    handle: PageHandle,
) -> Result<Response, StatusCode> {
    let page = handle.page().as_str();

    let claims = auth::authorize(
        state.jwt_secret.as_deref(),
        params.get("token").map(String::as_str),
    )
    .map_err(|e| {
        error!(page, "JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let Some(slot) = state.try_connect() else {
        warn!(
            page,
            max_connections = state.max_connections,
            "connection limit reached, refusing websocket"
        );
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let user = claims.map(|c| c.sub).unwrap_or_else(|| "anonymous".to_string());
    info!(page, user = %user, "WebSocket upgrade authorized");

    let client_id = format!("{}_{}", user, uuid::Uuid::new_v4());
    Ok(ws.on_upgrade(move |socket: WebSocket| async move {
        handle_connection(socket, handle, client_id).await;
        drop(slot);
    }))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Page;

    fn state(max_connections: usize) -> AppState {
        AppState::new(
            PageHandle::detached(Page::Graph, vec![]),
            PageHandle::detached(Page::Monitor, vec![]),
            None,
            max_connections,
        )
    }

    #[test]
    fn test_connection_limit() {
        let state = state(2);

        let first = state.try_connect();
        let second = state.try_connect();
        assert!(first.is_some() && second.is_some());
        assert!(state.try_connect().is_none());
        assert_eq!(state.active_connections(), 2);

        drop(first);
        assert_eq!(state.active_connections(), 1);
        assert!(state.try_connect().is_some());
    }

    #[test]
    fn test_zero_limit_refuses_everything() {
        let state = state(0);

        assert!(state.try_connect().is_none());
        assert_eq!(state.active_connections(), 0);
    }
}
