use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, CreateCommentRequest, CreateReviewRequest, CreateTermRequest, CreateTitleRequest,
    NewUser, Review, Term, Title, UpdateCommentRequest, UpdateReviewRequest, UpdateTitleRequest,
    User, UserChanges,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Names of the unique constraints declared in `migrations/`. The in-memory
/// repository reports violations under the same names.
pub mod constraints {
    pub const USERNAME: &str = "users_username_key";
    pub const EMAIL: &str = "users_email_key";
    pub const CATEGORY_SLUG: &str = "categories_slug_key";
    pub const GENRE_SLUG: &str = "genres_slug_key";
    pub const UNIQUE_REVIEW: &str = "unique_review";
}

/// Builds an `ILIKE` pattern matching `needle` as a literal substring, so `%`
/// and `_` typed by a client are not wildcards.
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// RepositoryError
///
/// Persistence failures the handlers care to tell apart. Everything else is
/// carried as `Database` and ends up as a 500.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("row not found")]
    NotFound,
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: String },
    #[error("no {field} with slug `{slug}`")]
    UnknownReference { field: &'static str, slug: String },
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                if let Some(constraint) = db.constraint() {
                    return RepositoryError::UniqueViolation {
                        constraint: constraint.to_string(),
                    };
                }
            }
        }
        if let sqlx::Error::RowNotFound = e {
            return RepositoryError::NotFound;
        }
        tracing::error!("database error: {:?}", e);
        RepositoryError::Database(e)
    }
}

/// Categories and genres share one table shape; `TermKind` picks the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Category,
    Genre,
}

impl TermKind {
    pub fn table(&self) -> &'static str {
        match self {
            TermKind::Category => "categories",
            TermKind::Genre => "genres",
        }
    }

    pub fn slug_constraint(&self) -> &'static str {
        match self {
            TermKind::Category => constraints::CATEGORY_SLUG,
            TermKind::Genre => constraints::GENRE_SLUG,
        }
    }
}

/// TitleFilter
///
/// Query parameters accepted by `GET /v1/titles`. All filters are optional and
/// combine with AND.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TitleFilter {
    /// Genre slug.
    pub genre: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive substring of the title name.
    pub name: Option<String>,
    pub year: Option<i32>,
}

/// Repository Trait
///
/// The persistence contract used by handlers and the auth extractor. Unique
/// constraints are enforced by the implementation and reported as
/// [`RepositoryError::UniqueViolation`]; callers never pre-check them.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    // Ordered by username; `search` matches a username substring.
    async fn list_users(&self, search: Option<String>) -> Result<Vec<User>, RepositoryError>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, RepositoryError>;
    // Cascades to the user's reviews and comments.
    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError>;
    // Sets `last_login` to `at` only while it still equals `previous`, which
    // retires the current confirmation code. False when another login won.
    async fn record_login(
        &self,
        id: Uuid,
        previous: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    // --- Categories & Genres ---
    async fn list_terms(
        &self,
        kind: TermKind,
        search: Option<String>,
    ) -> Result<Vec<Term>, RepositoryError>;
    async fn create_term(
        &self,
        kind: TermKind,
        req: CreateTermRequest,
    ) -> Result<Term, RepositoryError>;
    async fn delete_term(&self, kind: TermKind, slug: &str) -> Result<bool, RepositoryError>;

    // --- Titles ---
    async fn list_titles(&self, filter: TitleFilter) -> Result<Vec<Title>, RepositoryError>;
    async fn get_title(&self, id: i64) -> Result<Option<Title>, RepositoryError>;
    async fn create_title(&self, req: CreateTitleRequest) -> Result<Title, RepositoryError>;
    async fn update_title(&self, id: i64, req: UpdateTitleRequest)
    -> Result<Title, RepositoryError>;
    // Cascades to reviews and their comments.
    async fn delete_title(&self, id: i64) -> Result<bool, RepositoryError>;

    // --- Reviews ---
    async fn list_reviews(&self, title_id: i64) -> Result<Vec<Review>, RepositoryError>;
    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<Review>, RepositoryError>;
    /// Fails with `UniqueViolation { constraint: "unique_review" }` when the author
    /// already reviewed the title.
    async fn create_review(
        &self,
        title_id: i64,
        author_id: Uuid,
        req: CreateReviewRequest,
    ) -> Result<Review, RepositoryError>;
    async fn update_review(
        &self,
        review_id: i64,
        req: UpdateReviewRequest,
    ) -> Result<Review, RepositoryError>;
    async fn delete_review(&self, review_id: i64) -> Result<bool, RepositoryError>;

    // --- Comments ---
    async fn list_comments(&self, review_id: i64) -> Result<Vec<Comment>, RepositoryError>;
    async fn get_comment(
        &self,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, RepositoryError>;
    async fn create_comment(
        &self,
        review_id: i64,
        author_id: Uuid,
        req: CreateCommentRequest,
    ) -> Result<Comment, RepositoryError>;
    async fn update_comment(
        &self,
        comment_id: i64,
        req: UpdateCommentRequest,
    ) -> Result<Comment, RepositoryError>;
    async fn delete_comment(&self, comment_id: i64) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
