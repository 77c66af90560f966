use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Endpoints available to any active, authenticated user. The `AuthUser`
/// middleware layered on this router in `create_router` rejects everything
/// else with the 401 envelope.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // --- Users (read-only) ---
        .route("/users", get(handlers::get_all_users))
        // GET /users/active?roles=admin,manager
        // Static segment; takes precedence over `/users/{id}`.
        .route("/users/active", get(handlers::get_active_users_by_roles))
        .route("/users/email/{email}", get(handlers::get_user_by_email))
        .route("/users/{id}", get(handlers::get_user))
        // GET /roles
        .route("/roles", get(handlers::get_roles))
        // --- Attachments ---
        // POST /attachments (multipart: file, fileName, fileType)
        .route("/attachments", post(handlers::upload_attachment))
        // GET/DELETE /attachments/{id}
        .route(
            "/attachments/{id}",
            get(handlers::download_attachment).delete(handlers::delete_attachment),
        )
}
