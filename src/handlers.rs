use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    models::{
        AttachmentResponse, ChangeStatusRequest, CreateUserRequest, Envelope, LoginRequest,
        LoginResponse, LoginStatus, ResponseMsg, Role, UpdateUserRequest, User,
    },
    services::{
        ATTACHMENT_DELETE_FAILED_MSG, ATTACHMENT_DELETED_MSG, AttachmentService, UploadedFile,
        UserService,
    },
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

/// ActiveUsersQuery
///
/// Query parameters for `GET /users/active`.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActiveUsersQuery {
    /// Comma-separated role names, e.g. `admin,manager`.
    pub roles: String,
}

impl ActiveUsersQuery {
    fn role_names(&self) -> Vec<String> {
        self.roles
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// --- Authentication ---

/// login
///
/// [Public Route] Exchanges email and password for a signed access token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Bad credentials or inactive user", body = Envelope)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    State(users): State<UserService>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = users.authenticate(&payload.email, &payload.password).await?;
    let access_token = auth::issue_token(user.id, &state.config)?;

    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(Json(LoginResponse {
        success: LoginStatus {
            status: true,
            message: "login successful".to_string(),
            access_token,
            user,
        },
    }))
}

/// get_me
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(users): State<UserService>,
) -> Result<Json<User>, AppError> {
    Ok(Json(users.get_user_by_id(id).await?))
}

// --- Users ---

#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn get_all_users(State(users): State<UserService>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(users.get_all_users().await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 400, description = "No such user", body = Envelope)
    )
)]
pub async fn get_user(
    State(users): State<UserService>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(users.get_user_by_id(id).await?))
}

#[utoipa::path(
    get,
    path = "/users/email/{email}",
    params(("email" = String, Path, description = "Email address")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 400, description = "No such user", body = Envelope)
    )
)]
pub async fn get_user_by_email(
    State(users): State<UserService>,
    AppPath(email): AppPath<String>,
) -> Result<Json<User>, AppError> {
    users
        .get_user_by_email(&email)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("user with the email does not exist".to_string()))
}

/// get_active_users_by_roles
///
/// [Authenticated Route] Active users holding any of the listed roles.
#[utoipa::path(
    get,
    path = "/users/active",
    params(ActiveUsersQuery),
    responses((status = 200, description = "Active users", body = [User]))
)]
pub async fn get_active_users_by_roles(
    State(users): State<UserService>,
    AppQuery(query): AppQuery<ActiveUsersQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let roles = query.role_names();
    Ok(Json(users.get_all_active_users_by_roles(&roles).await?))
}

#[utoipa::path(
    get,
    path = "/roles",
    responses((status = 200, description = "All roles", body = [Role]))
)]
pub async fn get_roles(State(users): State<UserService>) -> Result<Json<Vec<Role>>, AppError> {
    Ok(Json(users.get_user_roles().await?))
}

/// create_user
///
/// [Admin Route] Creates an account and sends the welcome mail.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = User),
        (status = 401, description = "Not an admin", body = Envelope)
    )
)]
pub async fn create_user(
    auth_user: AuthUser,
    State(users): State<UserService>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    auth_user.require_admin()?;
    Ok(Json(users.create_user(payload).await?))
}

/// update_user
///
/// [Admin Route] Partial update of an active account.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Missing or inactive user", body = Envelope)
    )
)]
pub async fn update_user(
    auth_user: AuthUser,
    State(users): State<UserService>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    auth_user.require_admin()?;
    Ok(Json(users.update_user(payload, id).await?))
}

/// change_user_status
///
/// [Admin Route] Activates or deactivates an account.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/status",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Missing user or no-op transition", body = Envelope)
    )
)]
pub async fn change_user_status(
    auth_user: AuthUser,
    State(users): State<UserService>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ChangeStatusRequest>,
) -> Result<Json<User>, AppError> {
    auth_user.require_admin()?;
    Ok(Json(users.change_user_status(id, payload.active).await?))
}

// --- Attachments ---

/// upload_attachment
///
/// [Authenticated Route] Multipart upload with fields `file`, `fileName` and
/// `fileType`. Empty files and write failures are reported in the body with
/// `status: false`.
#[utoipa::path(
    post,
    path = "/attachments",
    request_body(content = crate::models::UploadAttachmentForm, content_type = "multipart/form-data"),
    responses((status = 200, description = "Upload result", body = AttachmentResponse))
)]
pub async fn upload_attachment(
    State(attachments): State<AttachmentService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AttachmentResponse>, AppError> {
    let mut multipart = multipart?;

    let mut bytes = Vec::new();
    let mut file_name = None;
    let mut file_type = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => bytes = field.bytes().await?.to_vec(),
            Some("fileName") => file_name = Some(field.text().await?),
            Some("fileType") => file_type = Some(field.text().await?),
            _ => {}
        }
    }

    let file = UploadedFile {
        bytes,
        file_name: file_name
            .ok_or_else(|| AppError::Validation("fileName is required".to_string()))?,
        file_type: file_type
            .ok_or_else(|| AppError::Validation("fileType is required".to_string()))?,
    };

    Ok(Json(attachments.upload(file).await?))
}

/// download_attachment
///
/// [Authenticated Route] Streams the stored bytes as a forced download with
/// caching disabled.
#[utoipa::path(
    get,
    path = "/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "File contents as application/octet-stream"),
        (status = 400, description = "Unknown attachment or missing file", body = Envelope)
    )
)]
pub async fn download_attachment(
    State(attachments): State<AttachmentService>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    let download = attachments.download(id).await?;

    let headers = [
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate".to_string()),
        (header::PRAGMA, "no-cache".to_string()),
        (header::EXPIRES, "0".to_string()),
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", download.file_name),
        ),
    ];

    Ok((headers, download.bytes).into_response())
}

/// delete_attachment
///
/// [Authenticated Route] Removes the row and the file.
#[utoipa::path(
    delete,
    path = "/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses((status = 200, description = "Deletion result", body = Envelope))
)]
pub async fn delete_attachment(
    State(attachments): State<AttachmentService>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Envelope>, AppError> {
    let success = if attachments.delete(id).await? {
        ResponseMsg::new(true, ATTACHMENT_DELETED_MSG)
    } else {
        ResponseMsg::new(false, ATTACHMENT_DELETE_FAILED_MSG)
    };

    Ok(Json(Envelope { success }))
}
