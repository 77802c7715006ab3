use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    error::ApiError,
    extract::ValidatedJson,
    mail::confirmation_message,
    models::{NewUser, SignupRequest, SignupResponse, TokenRequest, TokenResponse},
};

/// signup
///
/// [Public Route] Registers a user with role `user` and mails a confirmation
/// code to the given address. A username or email already in use is reported
/// as a field error.
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Confirmation code sent", body = SignupResponse),
        (status = 400, description = "Invalid or already used username/email")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> Result<Json<SignupResponse>, ApiError> {
    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            ..NewUser::default()
        })
        .await?;

    // An account whose code was never delivered is rolled back.
    let sent = match state.tokens.create_confirmation_code(&user) {
        Ok(code) => state
            .mail
            .send(confirmation_message(&user, &code))
            .await
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };
    if let Err(e) = sent {
        tracing::warn!(username = %user.username, "Confirmation mail failed, signup rolled back");
        state.repo.delete_user(user.id).await?;
        return Err(e);
    }

    tracing::info!(username = %user.username, "User signed up, confirmation code sent");
    Ok(Json(SignupResponse {
        username: user.username,
        email: user.email,
    }))
}

/// obtain_token
///
/// [Public Route] Exchanges a confirmation code for an access token. The code
/// is valid once: issuing the token updates `last_login`, which retires it.
#[utoipa::path(
    post,
    path = "/v1/auth/token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 400, description = "Invalid confirmation code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .ok_or(ApiError::NotFound)?;

    // Only one request can move `last_login` off the value the code was
    // derived from.
    let accepted = state
        .tokens
        .check_confirmation_code(&user, &payload.confirmation_code)
        && state
            .repo
            .record_login(user.id, user.last_login, Utc::now())
            .await?;
    if !accepted {
        tracing::warn!(username = %user.username, "Rejected confirmation code");
        return Err(ApiError::field(
            "confirmation_code",
            "Invalid confirmation code.",
        ));
    }

    let token = state.tokens.create_token_for_user(&user)?;

    tracing::info!(username = %user.username, "Access token issued");
    Ok(Json(token))
}
