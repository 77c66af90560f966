use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A portal account stored in the `users` table. The role is referenced by
/// name (`roles.name`), and the `active` flag gates every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    // FK to roles.name: 'admin', 'manager' or 'user'.
    pub user_role: String,
    pub active: bool,

    // bcrypt hash. Never leaves the server.
    #[serde(skip)]
    pub password_hash: String,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Role
///
/// A named role from the `roles` table. Many users reference one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub name: String,
    pub label: String,
}

/// Attachment
///
/// Metadata row for a stored file. The bytes live on disk under the
/// generated `file_name`; `url` is synthesized from the id and is not a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    /// Hex-encoded SHA-256 of the stored bytes.
    pub checksum: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub url: String,
}

impl Attachment {
    /// Fills in the client-facing access URL derived from the row id.
    pub fn with_access_url(mut self) -> Self {
        self.url = format!("api/attachments/{}", self.id);
        self
    }
}

/// NewAttachment
///
/// Everything the repository needs to insert an attachment row once the
/// bytes are safely on disk.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub checksum: String,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Input payload for `POST /admin/users`. The password is hashed before the
/// user reaches the repository.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_role: String,
    pub password: String,
}

/// UpdateUserRequest
///
/// Partial update for `PUT /admin/users/{id}`. Absent fields keep their
/// stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// ChangeStatusRequest
///
/// Body of `PUT /admin/users/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangeStatusRequest {
    pub active: bool,
}

/// UploadAttachmentForm
///
/// Documentation-only description of the multipart form accepted by
/// `POST /attachments`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct UploadAttachmentForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    file_name: String,
    file_type: String,
}

// --- Response Envelopes (Output Schemas) ---

/// ResponseMsg
///
/// The `{status, message}` pair used by every envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResponseMsg {
    pub status: bool,
    pub message: String,
}

impl ResponseMsg {
    pub fn new(status: bool, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Envelope
///
/// `{success: {status, message}}`: the shape of error responses and of
/// attachment deletion results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Envelope {
    pub success: ResponseMsg,
}

/// AttachmentResponse
///
/// Result of an upload. `attachment` is only present when the file was stored
/// and its row persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AttachmentResponse {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl AttachmentResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            attachment: None,
        }
    }
}

/// LoginStatus
///
/// Inner part of the login envelope. The client reads `success.accessToken`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginStatus {
    pub status: bool,
    pub message: String,
    pub access_token: String,
    pub user: User,
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub success: LoginStatus,
}
