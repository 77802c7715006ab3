use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{Method, Request, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use review_portal::{
    AppState, InMemoryRepository, MockMailer,
    auth::{AuthUser, Claims, DEV_USER_HEADER},
    config::{AppConfig, Env},
    error::ApiError,
    models::{Role, User},
    repository::Repository,
};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn create_token(user_id: Uuid, exp_offset: i64, secret: &str) -> String {
    let now = now_secs();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn test_user(id: Uuid, role: Role) -> User {
    User {
        id,
        username: format!("user-{}", id.as_u128()),
        email: format!("{}@example.com", id.as_u128()),
        role,
        ..Default::default()
    }
}

async fn create_app_state(env: Env, users: Vec<User>) -> AppState {
    let repo = InMemoryRepository::new();
    for user in users {
        repo.insert_user(user).await.unwrap();
    }

    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState::new(Arc::new(repo), Arc::new(MockMailer::new()), config)
}

/// Builds request parts with an optional `Authorization: Bearer` header.
fn get_request_parts(bearer: Option<&str>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("/".parse::<Uri>().unwrap());
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

async fn required(parts: &mut Parts, state: &AppState) -> Result<AuthUser, ApiError> {
    <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await
}

async fn optional(parts: &mut Parts, state: &AppState) -> Result<Option<AuthUser>, ApiError> {
    <AuthUser as OptionalFromRequestParts<AppState>>::from_request_parts(parts, state).await
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let state = create_app_state(
        Env::Production,
        vec![test_user(TEST_USER_ID, Role::Moderator)],
    )
    .await;
    let token = create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET);

    let mut parts = get_request_parts(Some(&token));
    let user = required(&mut parts, &state).await.unwrap();

    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, Role::Moderator);
    assert!(user.is_moderator());
    assert!(!user.is_admin());
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let state = create_app_state(Env::Production, vec![]).await;

    let mut parts = get_request_parts(None);
    let result = required(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthenticated)));

    // The optional extractor treats the same request as anonymous.
    let mut parts = get_request_parts(None);
    assert!(optional(&mut parts, &state).await.unwrap().is_none());
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let state = create_app_state(Env::Production, vec![test_user(TEST_USER_ID, Role::User)]).await;

    let mut parts = get_request_parts(None);
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );

    assert!(matches!(
        required(&mut parts, &state).await,
        Err(ApiError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let state = create_app_state(Env::Production, vec![test_user(TEST_USER_ID, Role::User)]).await;
    // Past the default 60 second leeway.
    let token = create_token(TEST_USER_ID, -120, TEST_JWT_SECRET);

    let mut parts = get_request_parts(Some(&token));
    assert!(matches!(
        required(&mut parts, &state).await,
        Err(ApiError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_auth_failure_with_wrong_signature() {
    let state = create_app_state(Env::Production, vec![test_user(TEST_USER_ID, Role::User)]).await;
    let token = create_token(TEST_USER_ID, 3600, "some-other-secret");

    let mut parts = get_request_parts(Some(&token));
    assert!(required(&mut parts, &state).await.is_err());

    // A bad token is an error for optional endpoints too, not an anonymous call.
    let mut parts = get_request_parts(Some(&token));
    assert!(optional(&mut parts, &state).await.is_err());
}

#[tokio::test]
async fn test_auth_failure_for_deleted_user() {
    let state = create_app_state(Env::Production, vec![test_user(TEST_USER_ID, Role::User)]).await;
    let token = create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET);

    state.repo.delete_user(TEST_USER_ID).await.unwrap();

    let mut parts = get_request_parts(Some(&token));
    assert!(matches!(
        required(&mut parts, &state).await,
        Err(ApiError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_staff_flag_makes_admin() {
    let staff = User {
        is_staff: true,
        ..test_user(TEST_USER_ID, Role::User)
    };
    let state = create_app_state(Env::Production, vec![staff]).await;
    let token = create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET);

    let mut parts = get_request_parts(Some(&token));
    let user = required(&mut parts, &state).await.unwrap();
    assert!(user.is_admin());
}

#[tokio::test]
async fn test_local_bypass_success() {
    let user_id = Uuid::new_v4();
    let state = create_app_state(Env::Local, vec![test_user(user_id, Role::Admin)]).await;

    let mut parts = get_request_parts(None);
    parts.headers.insert(
        DEV_USER_HEADER,
        header::HeaderValue::from_str(&user_id.to_string()).unwrap(),
    );

    let user = required(&mut parts, &state).await.unwrap();
    assert_eq!(user.id, user_id);
    assert!(user.is_admin());
}

#[tokio::test]
async fn test_local_bypass_ignored_in_production() {
    let user_id = Uuid::new_v4();
    let state = create_app_state(Env::Production, vec![test_user(user_id, Role::Admin)]).await;

    let mut parts = get_request_parts(None);
    parts.headers.insert(
        DEV_USER_HEADER,
        header::HeaderValue::from_str(&user_id.to_string()).unwrap(),
    );

    assert!(matches!(
        required(&mut parts, &state).await,
        Err(ApiError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_local_bypass_with_unknown_user_is_anonymous() {
    let state = create_app_state(Env::Local, vec![]).await;

    let mut parts = get_request_parts(None);
    parts.headers.insert(
        DEV_USER_HEADER,
        header::HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap(),
    );

    assert!(optional(&mut parts, &state).await.unwrap().is_none());
}
