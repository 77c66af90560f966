use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::{Envelope, ResponseMsg};

/// Client-facing message for every authentication or authorization failure.
pub const UNAUTHORIZED_MSG: &str = "unauthorized";
/// Client-facing message for every other failure.
pub const BAD_REQUEST_MSG: &str = "bad request";

/// AppError
///
/// The single error type flowing out of services, the repository and the
/// extractors. Its `IntoResponse` implementation is the only place where a
/// failure is turned into an HTTP status, so the client contract stays at
/// exactly two shapes: 401 for auth failures, 400 for everything else.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NotPermitted(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),
    #[error("mail error: {0}")]
    Mail(String),
    #[error("malformed request: {0}")]
    Rejection(String),
}

impl AppError {
    /// The HTTP status this error maps to at the boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Unauthorized => UNAUTHORIZED_MSG,
            AppError::Database(_) | AppError::Storage(_) | AppError::Password(_) => {
                tracing::error!(error = %self, "request failed");
                BAD_REQUEST_MSG
            }
            _ => {
                tracing::warn!(error = %self, "request rejected");
                BAD_REQUEST_MSG
            }
        };

        let body = Envelope {
            success: ResponseMsg::new(false, message),
        };

        (self.status(), Json(body)).into_response()
    }
}

// Framework rejections are funnelled through the same boundary so malformed
// requests still get the uniform envelope.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Rejection(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Rejection(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Rejection(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Rejection(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Rejection(err.body_text())
    }
}
