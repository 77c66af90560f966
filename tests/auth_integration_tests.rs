mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use common::*;
use kmt_server::{
    AppState,
    auth::{AuthUser, Claims, issue_token},
    config::Env,
    error::AppError,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::time::SystemTime;
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Token signed with `secret`, expiring `exp` seconds from now (negative for
/// already-expired tokens).
fn create_token(user_id: Uuid, exp: i64, secret: &str) -> String {
    let now = now_secs() as i64;
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env) -> AppState {
    let mut ctx = TestContext::new(MockRepo::seeded());
    ctx.config.env = env;
    ctx.config.jwt_secret = TEST_JWT_SECRET.to_string();
    ctx.state()
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

async fn extract(state: &AppState, headers: &[(&str, String)]) -> Result<AuthUser, AppError> {
    let mut parts = get_request_parts(Method::GET, "/me".parse().unwrap());
    for (name, value) in headers {
        parts.headers.insert(
            header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            value.parse().unwrap(),
        );
    }
    AuthUser::from_request_parts(&mut parts, state).await
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_bearer_token() {
    let state = create_app_state(Env::Production);
    let token = create_token(ADMIN_ID, 3600, TEST_JWT_SECRET);

    let user = extract(&state, &[("authorization", format!("Bearer {token}"))])
        .await
        .unwrap();

    assert_eq!(user.id, ADMIN_ID);
    assert_eq!(user.role, "admin");
}

#[tokio::test]
async fn test_auth_accepts_bare_token() {
    // The browser client sends the raw token without a scheme.
    let state = create_app_state(Env::Production);
    let token = create_token(MANAGER_ID, 3600, TEST_JWT_SECRET);

    let user = extract(&state, &[("authorization", token)]).await.unwrap();

    assert_eq!(user.id, MANAGER_ID);
}

#[tokio::test]
async fn test_issued_token_round_trips_through_extractor() {
    let state = create_app_state(Env::Production);
    let token = issue_token(MANAGER_ID, &state.config).unwrap();

    let user = extract(&state, &[("authorization", format!("Bearer {token}"))])
        .await
        .unwrap();

    assert_eq!(user.id, MANAGER_ID);
}

#[tokio::test]
async fn test_auth_fails_with_expired_token() {
    let state = create_app_state(Env::Production);
    // Past the default 60s leeway.
    let token = create_token(ADMIN_ID, -3600, TEST_JWT_SECRET);

    let result = extract(&state, &[("authorization", format!("Bearer {token}"))]).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_fails_with_wrong_secret() {
    let state = create_app_state(Env::Production);
    let token = create_token(ADMIN_ID, 3600, "some-other-secret");

    let result = extract(&state, &[("authorization", format!("Bearer {token}"))]).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_fails_with_garbage_token() {
    let state = create_app_state(Env::Production);

    let result = extract(&state, &[("authorization", "Bearer not.a.jwt".to_string())]).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_fails_for_inactive_or_unknown_subject() {
    let state = create_app_state(Env::Production);

    let inactive = create_token(INACTIVE_ID, 3600, TEST_JWT_SECRET);
    let result = extract(&state, &[("authorization", format!("Bearer {inactive}"))]).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));

    let unknown = create_token(MISSING_ID, 3600, TEST_JWT_SECRET);
    let result = extract(&state, &[("authorization", format!("Bearer {unknown}"))]).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_fails_without_header() {
    let state = create_app_state(Env::Production);

    let result = extract(&state, &[]).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_local_bypass_with_user_id_header() {
    let state = create_app_state(Env::Local);

    let user = extract(&state, &[("x-user-id", MANAGER_ID.to_string())])
        .await
        .unwrap();

    assert_eq!(user.id, MANAGER_ID);
    assert_eq!(user.role, "manager");
}

#[tokio::test]
async fn test_local_bypass_ignores_inactive_user() {
    let state = create_app_state(Env::Local);

    let result = extract(&state, &[("x-user-id", INACTIVE_ID.to_string())]).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_bypass_header_ignored_in_production() {
    let state = create_app_state(Env::Production);

    let result = extract(&state, &[("x-user-id", ADMIN_ID.to_string())]).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[test]
fn test_require_admin() {
    let admin = AuthUser {
        id: ADMIN_ID,
        role: "admin".to_string(),
    };
    let manager = AuthUser {
        id: MANAGER_ID,
        role: "manager".to_string(),
    };

    assert!(admin.require_admin().is_ok());
    assert!(matches!(manager.require_admin(), Err(AppError::Unauthorized)));
}
