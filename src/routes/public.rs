use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints. Everything else in the portal needs a token,
/// which is obtained here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        // Exchanges email + password for a JWT. Inactive users are refused.
        .route("/auth/login", post(handlers::login))
}
