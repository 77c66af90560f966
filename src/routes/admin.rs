use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// User management, nested under `/admin`. Authentication is layered on in
/// `create_router`; each handler then checks `role == "admin"` and refuses
/// others with the 401 envelope.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/users
        // Creates an account and sends the welcome mail.
        .route("/users", post(handlers::create_user))
        // PUT /admin/users/{id}
        // Partial update; only active users can be edited.
        .route("/users/{id}", put(handlers::update_user))
        // PUT /admin/users/{id}/status
        // Activate / deactivate. No-op transitions are rejected.
        .route("/users/{id}/status", put(handlers::change_user_status))
}
