use crate::{AppState, handlers::users};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// User management. Mounted under `/v1` behind `auth_middleware`; each handler
/// additionally applies the `IsAdmin` policy, which also admits staff accounts.
///
/// `/users/me` lives in the authenticated router. Axum prefers the static
/// segment, so `me` never reaches `/users/{username}` (and is a reserved
/// username anyway).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{username}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}
