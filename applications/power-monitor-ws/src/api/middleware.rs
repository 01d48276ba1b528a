use crate::auth::{authorize, bearer_token};
use crate::ws::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Bearer-token check for the REST routes. Open when no secret is configured.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);

    authorize(state.jwt_secret.as_deref(), token).map_err(|e| {
        debug!(uri = %request.uri(), "rejecting request: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    Ok(next.run(request).await)
}
