use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};

use super::SearchQuery;
use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::ValidatedJson,
    models::{CreateTermRequest, CreateTitleRequest, TermResponse, TitleResponse, UpdateTitleRequest},
    permissions::{Policy, authorize},
    repository::{TermKind, TitleFilter},
};

// --- Categories & Genres ---
//
// Both resources behave identically; the handlers below differ only in the
// `TermKind` they pass on.

async fn list_terms(
    state: &AppState,
    kind: TermKind,
    search: Option<String>,
) -> Result<Json<Vec<TermResponse>>, ApiError> {
    let terms = state.repo.list_terms(kind, search).await?;
    Ok(Json(terms.into_iter().map(TermResponse::from).collect()))
}

async fn create_term(
    state: &AppState,
    actor: Option<AuthUser>,
    kind: TermKind,
    payload: CreateTermRequest,
) -> Result<(StatusCode, Json<TermResponse>), ApiError> {
    authorize(Policy::IsAdminOrReadOnly, actor.as_ref(), &Method::POST, None).into_result()?;

    let term = state.repo.create_term(kind, payload).await?;
    Ok((StatusCode::CREATED, Json(term.into())))
}

async fn delete_term(
    state: &AppState,
    actor: Option<AuthUser>,
    kind: TermKind,
    slug: &str,
) -> Result<StatusCode, ApiError> {
    authorize(Policy::IsAdminOrReadOnly, actor.as_ref(), &Method::DELETE, None).into_result()?;

    if state.repo.delete_term(kind, slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[utoipa::path(
    get,
    path = "/v1/categories",
    tag = "catalog",
    params(SearchQuery),
    responses((status = 200, description = "Categories ordered by name", body = [TermResponse]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<TermResponse>>, ApiError> {
    list_terms(&state, TermKind::Category, query.search).await
}

#[utoipa::path(
    post,
    path = "/v1/categories",
    tag = "catalog",
    request_body = CreateTermRequest,
    responses(
        (status = 201, description = "Category created", body = TermResponse),
        (status = 400, description = "Invalid or duplicate slug"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_category(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateTermRequest>,
) -> Result<(StatusCode, Json<TermResponse>), ApiError> {
    create_term(&state, actor, TermKind::Category, payload).await
}

/// delete_category
///
/// [Admin Route] Titles in the category keep existing with no category.
#[utoipa::path(
    delete,
    path = "/v1/categories/{slug}",
    tag = "catalog",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_category(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_term(&state, actor, TermKind::Category, &slug).await
}

#[utoipa::path(
    get,
    path = "/v1/genres",
    tag = "catalog",
    params(SearchQuery),
    responses((status = 200, description = "Genres ordered by name", body = [TermResponse]))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<TermResponse>>, ApiError> {
    list_terms(&state, TermKind::Genre, query.search).await
}

#[utoipa::path(
    post,
    path = "/v1/genres",
    tag = "catalog",
    request_body = CreateTermRequest,
    responses(
        (status = 201, description = "Genre created", body = TermResponse),
        (status = 400, description = "Invalid or duplicate slug"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_genre(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateTermRequest>,
) -> Result<(StatusCode, Json<TermResponse>), ApiError> {
    create_term(&state, actor, TermKind::Genre, payload).await
}

#[utoipa::path(
    delete,
    path = "/v1/genres/{slug}",
    tag = "catalog",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_genre(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_term(&state, actor, TermKind::Genre, &slug).await
}

// --- Titles ---

/// list_titles
///
/// [Public Route] Titles with their rating, filterable by genre slug,
/// category slug, name substring and year.
#[utoipa::path(
    get,
    path = "/v1/titles",
    tag = "catalog",
    params(TitleFilter),
    responses((status = 200, description = "Titles", body = [TitleResponse]))
)]
pub async fn list_titles(
    State(state): State<AppState>,
    Query(filter): Query<TitleFilter>,
) -> Result<Json<Vec<TitleResponse>>, ApiError> {
    let titles = state.repo.list_titles(filter).await?;
    Ok(Json(titles.into_iter().map(TitleResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}",
    tag = "catalog",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 200, description = "Title", body = TitleResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> Result<Json<TitleResponse>, ApiError> {
    let title = state
        .repo
        .get_title(title_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(title.into()))
}

/// create_title
///
/// [Admin Route] `category` and `genre` are given as slugs; the response uses
/// the nested read representation.
#[utoipa::path(
    post,
    path = "/v1/titles",
    tag = "catalog",
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Title created", body = TitleResponse),
        (status = 400, description = "Validation error or unknown slug")
    )
)]
pub async fn create_title(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateTitleRequest>,
) -> Result<(StatusCode, Json<TitleResponse>), ApiError> {
    authorize(Policy::IsAdminOrReadOnly, actor.as_ref(), &Method::POST, None).into_result()?;

    let title = state.repo.create_title(payload).await?;
    tracing::info!(title_id = title.id, name = %title.name, "Title created");
    Ok((StatusCode::CREATED, Json(title.into())))
}

#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}",
    tag = "catalog",
    params(("title_id" = i64, Path, description = "Title id")),
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Title updated", body = TitleResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_title(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateTitleRequest>,
) -> Result<Json<TitleResponse>, ApiError> {
    authorize(Policy::IsAdminOrReadOnly, actor.as_ref(), &Method::PATCH, None).into_result()?;

    let title = state.repo.update_title(title_id, payload).await?;
    Ok(Json(title.into()))
}

/// delete_title
///
/// [Admin Route] Also removes the title's reviews and their comments.
#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}",
    tag = "catalog",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_title(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(Policy::IsAdminOrReadOnly, actor.as_ref(), &Method::DELETE, None).into_result()?;

    if state.repo.delete_title(title_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
