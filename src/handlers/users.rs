use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};

use super::SearchQuery;
use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::ValidatedJson,
    models::{
        CreateUserRequest, NewUser, Role, UpdateProfileRequest, UpdateUserRequest, User,
        UserChanges, UserResponse,
    },
    permissions::{Policy, authorize},
};

fn parse_role(role: Option<String>) -> Result<Option<Role>, ApiError> {
    role.map(|r| r.parse::<Role>())
        .transpose()
        .map_err(|e| ApiError::field("role", e.to_string()))
}

async fn find_by_username(state: &AppState, username: &str) -> Result<User, ApiError> {
    state
        .repo
        .get_user_by_username(username)
        .await?
        .ok_or(ApiError::NotFound)
}

/// list_users
///
/// [Admin Route] Lists accounts ordered by username.
#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "users",
    params(SearchQuery),
    responses(
        (status = 200, description = "Users", body = [UserResponse]),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_users(
    actor: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    authorize(Policy::IsAdmin, Some(&actor), &Method::GET, None).into_result()?;

    let users = state.repo.list_users(query.search).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// create_user
///
/// [Admin Route] Creates an account directly, with any role. No confirmation
/// mail is sent.
#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn create_user(
    actor: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    authorize(Policy::IsAdmin, Some(&actor), &Method::POST, None).into_result()?;

    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            bio: payload.bio,
            role: parse_role(payload.role)?.unwrap_or_default(),
        })
        .await?;

    tracing::info!(admin = %actor.username, username = %user.username, "User created by admin");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    get,
    path = "/v1/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    authorize(Policy::IsAdmin, Some(&actor), &Method::GET, None).into_result()?;

    let user = find_by_username(&state, &username).await?;
    Ok(Json(user.into()))
}

/// update_user
///
/// [Admin Route] Partial update, including the role.
#[utoipa::path(
    patch,
    path = "/v1/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    authorize(Policy::IsAdmin, Some(&actor), &Method::PATCH, None).into_result()?;

    let user = find_by_username(&state, &username).await?;
    let changes = UserChanges {
        username: payload.username,
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        bio: payload.bio,
        role: parse_role(payload.role)?,
    };
    let updated = state.repo.update_user(user.id, changes).await?;
    Ok(Json(updated.into()))
}

/// delete_user
///
/// [Admin Route] Removes the account together with its reviews and comments.
#[utoipa::path(
    delete,
    path = "/v1/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    authorize(Policy::IsAdmin, Some(&actor), &Method::DELETE, None).into_result()?;

    let user = find_by_username(&state, &username).await?;
    if state.repo.delete_user(user.id).await? {
        tracing::info!(admin = %actor.username, username = %user.username, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "users",
    responses((status = 200, description = "Current user", body = UserResponse))
)]
pub async fn get_me(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    authorize(Policy::IsAuthenticated, Some(&actor), &Method::GET, None).into_result()?;

    let user = state.repo.get_user(actor.id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(user.into()))
}

/// update_me
///
/// [Authenticated Route] Edits the caller's own profile. The role cannot be
/// changed here; a `role` key in the body is ignored.
#[utoipa::path(
    patch,
    path = "/v1/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile updated", body = UserResponse))
)]
pub async fn update_me(
    actor: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    authorize(Policy::IsAuthenticated, Some(&actor), &Method::PATCH, None).into_result()?;

    let updated = state.repo.update_user(actor.id, payload.into()).await?;
    Ok(Json(updated.into()))
}
