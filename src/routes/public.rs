use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints: liveness and the two-step registration flow.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Used by load balancers and container probes.
        .route("/health", get(|| async { "ok" }))
}

/// Mounted under `/v1`.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/signup
        // Creates the account and mails a confirmation code.
        .route("/auth/signup", post(handlers::auth::signup))
        // POST /auth/token
        // Exchanges username + confirmation code for a JWT access token.
        .route("/auth/token", post(handlers::auth::obtain_token))
}
