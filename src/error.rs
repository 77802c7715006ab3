//! Maps domain failures to HTTP responses.
//!
//! Validation failures render as a field map (`{"field": ["message"]}`); every
//! other failure renders as `{"detail": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{mail::MailError, repository::RepositoryError};

pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action.";
pub const UNAUTHENTICATED_MESSAGE: &str = "Authentication credentials were not provided or are invalid.";
pub const NOT_FOUND_MESSAGE: &str = "Not found.";

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// FieldErrors
///
/// Ordered map of field name to messages, serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::default();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", err.code));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

#[derive(Debug, Serialize)]
struct DetailBody<'a> {
    detail: &'a str,
}

/// ApiError
///
/// The single error type returned by handlers and extractors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.into())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ApiError::NotFound,
            RepositoryError::UniqueViolation { constraint } => {
                let (field, message) = conflict_message(&constraint);
                ApiError::field(field, message)
            }
            RepositoryError::UnknownReference { field, slug } => ApiError::field(
                field,
                format!("Object with slug={slug} does not exist."),
            ),
            RepositoryError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Turns a unique-constraint name into the field it guards and a message.
fn conflict_message(constraint: &str) -> (&'static str, &'static str) {
    use crate::repository::constraints;
    match constraint {
        constraints::UNIQUE_REVIEW => (NON_FIELD_ERRORS, "You have already reviewed this title."),
        constraints::USERNAME => ("username", "A user with that username already exists."),
        constraints::EMAIL => ("email", "A user with that email already exists."),
        constraints::CATEGORY_SLUG => ("slug", "A category with this slug already exists."),
        constraints::GENRE_SLUG => ("slug", "A genre with this slug already exists."),
        _ => (NON_FIELD_ERRORS, "This object conflicts with an existing one."),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => (status, Json(errors)).into_response(),
            ApiError::Unauthenticated => {
                (status, Json(DetailBody { detail: UNAUTHENTICATED_MESSAGE })).into_response()
            }
            ApiError::Forbidden => {
                (status, Json(DetailBody { detail: FORBIDDEN_MESSAGE })).into_response()
            }
            ApiError::NotFound => {
                (status, Json(DetailBody { detail: NOT_FOUND_MESSAGE })).into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (status, Json(DetailBody { detail: "A server error occurred." })).into_response()
            }
        }
    }
}
