//! HTTP handlers, grouped by resource.
//!
//! Every handler resolves the caller (`AuthUser` or `Option<AuthUser>`) and asks
//! [`crate::permissions::authorize`] before touching the repository. Collection
//! level checks run before object lookups, so an anonymous write to a missing
//! object is a 401 rather than a 404.

use serde::Deserialize;

pub mod auth;
pub mod catalog;
pub mod reviews;
pub mod users;

/// SearchQuery
///
/// `?search=` on the user, category and genre listings.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring match on username or name.
    pub search: Option<String>,
}
