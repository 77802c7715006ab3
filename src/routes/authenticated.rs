use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any signed-in user, whatever their role. Mounted under `/v1`
/// behind `auth_middleware`, so anonymous requests are answered with 401
/// before a handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET/PATCH /users/me
        // The caller's own profile. The role is read-only here.
        .route(
            "/users/me",
            get(handlers::users::get_me).patch(handlers::users::update_me),
        )
}
