//! HTTP router assembly.

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/invites", post(handlers::issue_invite).get(handlers::list_invites))
        .route("/invites/validate", post(handlers::validate_invite))
        .route("/invites/redeem", post(handlers::redeem_invite))
        .route("/invites/{id}/revoke", post(handlers::revoke_invite))
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
