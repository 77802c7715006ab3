//! Reviews of a title and comments on a review.
//!
//! Both are nested resources: the path parents must exist and match, otherwise
//! the request ends in 404. Changing an existing object is open to its author,
//! to moderators and to administrators.

use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::ValidatedJson,
    models::{
        Comment, CommentResponse, CreateCommentRequest, CreateReviewRequest, Review,
        ReviewResponse, UpdateCommentRequest, UpdateReviewRequest,
    },
    permissions::{Policy, authorize},
    repository::RepositoryError,
};

const POLICY: Policy = Policy::ReadOnlyOrIsAdminOrModeratorOrAuthor;

async fn ensure_title(state: &AppState, title_id: i64) -> Result<(), ApiError> {
    state
        .repo
        .get_title(title_id)
        .await?
        .map(|_| ())
        .ok_or(ApiError::NotFound)
}

async fn find_review(state: &AppState, title_id: i64, review_id: i64) -> Result<Review, ApiError> {
    state
        .repo
        .get_review(title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound)
}

async fn find_comment(
    state: &AppState,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, ApiError> {
    find_review(state, title_id, review_id).await?;
    state
        .repo
        .get_comment(review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound)
}

// --- Reviews ---

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews",
    tag = "reviews",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 200, description = "Reviews, newest first", body = [ReviewResponse]),
        (status = 404, description = "Title not found")
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> Result<Json<Vec<ReviewResponse>>, ApiError> {
    ensure_title(&state, title_id).await?;
    let reviews = state.repo.list_reviews(title_id).await?;
    Ok(Json(reviews.into_iter().map(ReviewResponse::from).collect()))
}

/// create_review
///
/// [Authenticated Route] One review per user and title. A second attempt is
/// rejected by the `unique_review` constraint and reported as a 400.
#[utoipa::path(
    post,
    path = "/v1/titles/{title_id}/reviews",
    tag = "reviews",
    params(("title_id" = i64, Path, description = "Title id")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Invalid score or already reviewed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Title not found")
    )
)]
pub async fn create_review(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    authorize(POLICY, actor.as_ref(), &Method::POST, None).into_result()?;
    let Some(actor) = actor else {
        return Err(ApiError::Unauthenticated);
    };
    ensure_title(&state, title_id).await?;

    let review = state
        .repo
        .create_review(title_id, actor.id, payload)
        .await
        .map_err(|e| {
            if matches!(e, RepositoryError::UniqueViolation { .. }) {
                tracing::warn!(title_id, username = %actor.username, "Duplicate review rejected");
            }
            ApiError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(review.into())))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Review", body = ReviewResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = find_review(&state, title_id, review_id).await?;
    Ok(Json(review.into()))
}

#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewResponse),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_review(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    ValidatedJson(payload): ValidatedJson<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    authorize(POLICY, actor.as_ref(), &Method::PATCH, None).into_result()?;
    let review = find_review(&state, title_id, review_id).await?;
    authorize(POLICY, actor.as_ref(), &Method::PATCH, Some(review.author_id)).into_result()?;

    let updated = state.repo.update_review(review.id, payload).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_review(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    authorize(POLICY, actor.as_ref(), &Method::DELETE, None).into_result()?;
    let review = find_review(&state, title_id, review_id).await?;
    authorize(POLICY, actor.as_ref(), &Method::DELETE, Some(review.author_id)).into_result()?;

    if state.repo.delete_review(review.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Comments ---

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Comments, newest first", body = [CommentResponse]),
        (status = 404, description = "Review not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    find_review(&state, title_id, review_id).await?;
    let comments = state.repo.list_comments(review_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn create_comment(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    authorize(POLICY, actor.as_ref(), &Method::POST, None).into_result()?;
    let Some(actor) = actor else {
        return Err(ApiError::Unauthenticated);
    };
    find_review(&state, title_id, review_id).await?;

    let comment = state
        .repo
        .create_comment(review_id, actor.id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Comment", body = CommentResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = find_comment(&state, title_id, review_id, comment_id).await?;
    Ok(Json(comment.into()))
}

#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_comment(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    ValidatedJson(payload): ValidatedJson<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    authorize(POLICY, actor.as_ref(), &Method::PATCH, None).into_result()?;
    let comment = find_comment(&state, title_id, review_id, comment_id).await?;
    authorize(POLICY, actor.as_ref(), &Method::PATCH, Some(comment.author_id)).into_result()?;

    let updated = state.repo.update_comment(comment.id, payload).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "reviews",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_comment(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<StatusCode, ApiError> {
    authorize(POLICY, actor.as_ref(), &Method::DELETE, None).into_result()?;
    let comment = find_comment(&state, title_id, review_id, comment_id).await?;
    authorize(POLICY, actor.as_ref(), &Method::DELETE, Some(comment.author_id)).into_result()?;

    if state.repo.delete_comment(comment.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
