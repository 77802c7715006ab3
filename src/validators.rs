//! Field validators shared by the request schemas.
//!
//! Each function has the shape `validator`'s `custom(function = ...)` expects, so
//! the same rule runs for the full and the partial (PATCH) variant of a payload.

use chrono::{Datelike, Utc};
use std::borrow::Cow;
use validator::ValidationError;

use crate::models::Role;

/// The path segment `/users/me` belongs to the current user, so nobody may own it.
pub const RESERVED_USERNAME: &str = "me";

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Letters, digits and `@ . + - _` only; `me` is reserved.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value == RESERVED_USERNAME {
        return Err(error(
            "reserved_username",
            "The username \"me\" is reserved by the system.",
        ));
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-');
    if value.is_empty() || !value.chars().all(allowed) {
        return Err(error(
            "invalid_username",
            "Enter a valid username. It may contain only letters, digits and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

/// Slugs follow `^[-a-zA-Z0-9_]+$`.
pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if value.is_empty() || !value.chars().all(allowed) {
        return Err(error(
            "invalid_slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ));
    }
    Ok(())
}

pub fn validate_year(year: i32) -> Result<(), ValidationError> {
    if year > Utc::now().year() {
        return Err(error("future_year", "The year cannot be in the future."));
    }
    Ok(())
}

pub fn validate_role(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Role>()
        .map(|_| ())
        .map_err(|_| error("invalid_role", "Role must be one of: user, moderator, admin."))
}
