//! Role-based authorization.
//!
//! Every endpoint names one [`Policy`]; [`authorize`] is the only place that maps
//! (policy, caller, method, ownership) to a decision.

use axum::http::Method;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Any authenticated user.
    IsAuthenticated,
    /// Authenticated administrators only, for every method.
    IsAdmin,
    /// Reads are public; writes need an administrator.
    IsAdminOrReadOnly,
    /// Reads are public; creating needs any authenticated user; changing an
    /// existing object needs its author, a moderator or an administrator.
    ReadOnlyOrIsAdminOrModeratorOrAuthor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// No (valid) credentials were supplied. Rendered as 401.
    Unauthenticated,
    /// Credentials are fine but the role is not enough. Rendered as 403.
    Forbidden,
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        *self == Access::Allow
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            Access::Allow => Ok(()),
            Access::Unauthenticated => Err(ApiError::Unauthenticated),
            Access::Forbidden => Err(ApiError::Forbidden),
        }
    }
}

/// GET, HEAD and OPTIONS never change state.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// authorize
///
/// `author` is the owner of the object being changed, or `None` for
/// collection-level requests (listing, creating). Admin privilege is checked
/// before ownership, so an administrator is never refused by a policy.
pub fn authorize(
    policy: Policy,
    actor: Option<&AuthUser>,
    method: &Method,
    author: Option<Uuid>,
) -> Access {
    let safe = is_safe_method(method);

    if matches!(
        policy,
        Policy::IsAdminOrReadOnly | Policy::ReadOnlyOrIsAdminOrModeratorOrAuthor
    ) && safe
    {
        return Access::Allow;
    }

    let Some(actor) = actor else {
        return Access::Unauthenticated;
    };
    if actor.is_admin() {
        return Access::Allow;
    }

    match policy {
        Policy::IsAuthenticated => Access::Allow,
        Policy::IsAdmin | Policy::IsAdminOrReadOnly => Access::Forbidden,
        Policy::ReadOnlyOrIsAdminOrModeratorOrAuthor => match author {
            None => Access::Allow,
            Some(_) if actor.is_moderator() => Access::Allow,
            Some(owner) if owner == actor.id => Access::Allow,
            Some(_) => Access::Forbidden,
        },
    }
}
