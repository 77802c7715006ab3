use crate::{
    AppState,
    handlers::{catalog, reviews},
};
use axum::{
    Router,
    routing::{delete, get},
};

/// Content Router Module
///
/// Categories, genres, titles and the reviews/comments nested under titles.
/// Mounted under `/v1`. Handlers take `Option<AuthUser>`: reads stay public,
/// writes are checked against `IsAdminOrReadOnly` (catalog) or
/// `ReadOnlyOrIsAdminOrModeratorOrAuthor` (reviews and comments).
pub fn content_routes() -> Router<AppState> {
    Router::new()
        // --- Catalog ---
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route("/categories/{slug}", delete(catalog::delete_category))
        .route(
            "/genres",
            get(catalog::list_genres).post(catalog::create_genre),
        )
        .route("/genres/{slug}", delete(catalog::delete_genre))
        .route("/titles", get(catalog::list_titles).post(catalog::create_title))
        .route(
            "/titles/{title_id}",
            get(catalog::get_title)
                .patch(catalog::update_title)
                .delete(catalog::delete_title),
        )
        // --- Reviews ---
        .route(
            "/titles/{title_id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        // --- Comments ---
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(reviews::list_comments).post(reviews::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(reviews::get_comment)
                .patch(reviews::update_comment)
                .delete(reviews::delete_comment),
        )
}
