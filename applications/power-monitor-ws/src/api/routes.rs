use axum::{
    extract::Request,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Level;

use super::handlers;
use super::middleware::require_auth;
use crate::ws::{health_check, ws_graph, ws_monitor, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    // Pages, health and websockets; the websockets check their own ?token
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/", get(handlers::graph_page))
        .route("/monitor", get(handlers::monitor_page))
        .route("/ws/graph", get(ws_graph))
        .route("/ws/monitor", get(ws_monitor));

    let protected_routes = Router::new()
        .route("/api/v1/graph", get(handlers::get_graph))
        .route("/api/v1/monitor", get(handlers::get_monitor))
        .route(
            "/api/v1/monitor/outlets/{outlet}/toggle",
            post(handlers::toggle_outlet),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|_request: &Request, _span: &tracing::Span| {
                    tracing::event!(Level::DEBUG, "received request");
                }),
        )
}
