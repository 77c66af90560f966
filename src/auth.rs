use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::User,
    repository::RepositoryState,
};

/// Role name that unlocks the `/admin` routes.
pub const ADMIN_ROLE: &str = "admin";

/// Claims
///
/// Payload of the tokens issued by `POST /auth/login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// issue_token
///
/// Signs an HS256 token for `user_id` valid for the configured lifetime.
pub fn issue_token(user_id: Uuid, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now.max(0) as usize,
        exp: (now + i64::from(config.jwt_ttl_secs)).max(0) as usize,
    };
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    Ok(encode(&Header::default(), &claims, &key)?)
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(hash(password, DEFAULT_COST)?)
}

/// Any malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    /// Role name, used for the admin checks.
    pub role: String,
}

impl AuthUser {
    /// Fails with `Unauthorized` unless the caller holds the admin role.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == ADMIN_ROLE {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, "admin route refused");
            Err(AppError::Unauthorized)
        }
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.user_role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing
///    active user is accepted as-is.
/// 2. Token extraction: `Authorization: Bearer <jwt>`, or the bare token as
///    the browser client sends it.
/// 3. JWT decoding with expiry validation.
/// 4. DB lookup: the subject must still exist and be active.
///
/// Rejection: `AppError::Unauthorized` (401 envelope) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id| Uuid::parse_str(id).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = active_user(&repo, user_id).await? {
                    return Ok(user.into());
                }
            }
        }

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .unwrap_or(auth_header)
            .trim();

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AppError::Unauthorized
        })?;

        active_user(&repo, token_data.claims.sub)
            .await?
            .map(AuthUser::from)
            .ok_or(AppError::Unauthorized)
    }
}

// Resolves a token subject. Lookup failures are reported as auth failures so
// the client never learns more than "unauthorized".
async fn active_user(repo: &RepositoryState, id: Uuid) -> Result<Option<User>, AppError> {
    match repo.get_user(id).await {
        Ok(user) => Ok(user.filter(|u| u.active)),
        Err(e) => {
            tracing::error!(error = %e, "user lookup failed during authentication");
            Err(AppError::Unauthorized)
        }
    }
}
