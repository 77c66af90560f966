use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod repository;
pub mod services;
pub mod storage;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use mail::{MailState, MockMailService};
pub use repository::{PostgresRepository, RepositoryState};
pub use services::{AttachmentService, UserService};
pub use storage::{FsAttachmentStore, MockAttachmentStore, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::get_me, handlers::get_all_users, handlers::get_user,
        handlers::get_user_by_email, handlers::get_active_users_by_roles, handlers::get_roles,
        handlers::create_user, handlers::update_user, handlers::change_user_status,
        handlers::upload_attachment, handlers::download_attachment, handlers::delete_attachment,
    ),
    components(
        schemas(
            models::User, models::Role, models::Attachment, models::LoginRequest,
            models::CreateUserRequest, models::UpdateUserRequest, models::ChangeStatusRequest,
            models::UploadAttachmentForm, models::ResponseMsg, models::Envelope,
            models::AttachmentResponse, models::LoginStatus, models::LoginResponse,
        )
    ),
    tags(
        (name = "kmt", description = "Knowledge Management Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container of shared services and configuration,
/// cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: database access.
    pub repo: RepositoryState,
    /// Storage Layer: attachment bytes on disk.
    pub storage: StorageState,
    /// Outbound notifications.
    pub mail: MailState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These let handlers and extractors pull only the component they need.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for UserService {
    fn from_ref(app_state: &AppState) -> UserService {
        UserService::new(
            app_state.repo.clone(),
            app_state.mail.clone(),
            app_state.config.portal_login_link.clone(),
        )
    }
}

impl FromRef<AppState> for AttachmentService {
    fn from_ref(app_state: &AppState) -> AttachmentService {
        AttachmentService::new(app_state.repo.clone(), app_state.storage.clone())
    }
}

/// auth_middleware
///
/// Guards the authenticated and admin routers. Extracting `AuthUser` does all
/// the work: any failure rejects with the 401 envelope before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles routing, the auth layer, the upload size limit and the
/// observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let body_limit = state.config.max_upload_bytes;

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Role check happens in the handlers, after this layer has authenticated.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Request span carrying method, URI and the generated `x-request-id`, so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
