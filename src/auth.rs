use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` in place of a JWT.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the access tokens issued by `POST /v1/auth/token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID.
    pub sub: Uuid,
    /// Expiration time (seconds since the epoch).
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. The role is re-read from
/// the repository on every request, so a role change takes effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub is_staff: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_staff
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            is_staff: user.is_staff,
        }
    }
}

async fn load_user(repo: &RepositoryState, id: Uuid) -> Result<Option<AuthUser>, ApiError> {
    Ok(repo.get_user(id).await?.map(AuthUser::from))
}

/// resolve
///
/// Shared by the required and optional extractors. `Ok(None)` means the request
/// carried no credentials at all; malformed or stale credentials are an error.
async fn resolve(parts: &Parts, repo: &RepositoryState, config: &AppConfig) -> Result<Option<AuthUser>, ApiError> {
    // Local development bypass: a known user id in `x-user-id` stands in for a JWT.
    if config.env == Env::Local {
        if let Some(user_id) = parts
            .headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
        {
            if let Some(user) = load_user(repo, user_id).await? {
                return Ok(Some(user));
            }
        }
    }

    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => tracing::debug!("rejected expired access token"),
            _ => tracing::debug!("rejected access token: {}", e),
        }
        ApiError::Unauthenticated
    })?;

    // The user may have been deleted after the token was issued.
    load_user(repo, token_data.claims.sub)
        .await?
        .map(Some)
        .ok_or(ApiError::Unauthenticated)
}

/// AuthUser Extractor Implementation
///
/// Rejects with 401 when the request has no valid credentials.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve(parts, &repo, &config)
            .await?
            .ok_or(ApiError::Unauthenticated)
    }
}

/// `Option<AuthUser>` for endpoints that anonymous callers may read. A request
/// without an `Authorization` header is anonymous; a bad token is still a 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve(parts, &repo, &config).await
    }
}
