use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod permissions;
pub mod repository;
pub mod tokens;
pub mod validators;

// Routers grouped by audience (public, content, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, content, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use mail::{ConsoleMailer, HttpMailRelay, MailState, MockMailer};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use tokens::TokenService;

/// ApiDoc
///
/// OpenAPI document for every `#[utoipa::path]` handler and the wire schemas.
/// Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup, handlers::auth::obtain_token,
        handlers::users::list_users, handlers::users::create_user, handlers::users::get_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::users::get_me, handlers::users::update_me,
        handlers::catalog::list_categories, handlers::catalog::create_category,
        handlers::catalog::delete_category, handlers::catalog::list_genres,
        handlers::catalog::create_genre, handlers::catalog::delete_genre,
        handlers::catalog::list_titles, handlers::catalog::get_title,
        handlers::catalog::create_title, handlers::catalog::update_title,
        handlers::catalog::delete_title,
        handlers::reviews::list_reviews, handlers::reviews::create_review,
        handlers::reviews::get_review, handlers::reviews::update_review,
        handlers::reviews::delete_review,
        handlers::reviews::list_comments, handlers::reviews::create_comment,
        handlers::reviews::get_comment, handlers::reviews::update_comment,
        handlers::reviews::delete_comment
    ),
    components(
        schemas(
            models::Role, models::SignupRequest, models::SignupResponse, models::TokenRequest,
            models::TokenResponse, models::CreateUserRequest, models::UpdateUserRequest,
            models::UpdateProfileRequest, models::UserResponse, models::CreateTermRequest,
            models::TermResponse, models::CreateTitleRequest, models::UpdateTitleRequest,
            models::TitleResponse, models::CreateReviewRequest, models::UpdateReviewRequest,
            models::ReviewResponse, models::CreateCommentRequest, models::UpdateCommentRequest,
            models::CommentResponse,
        )
    ),
    tags(
        (name = "auth", description = "Registration and access tokens"),
        (name = "users", description = "Accounts and profiles"),
        (name = "catalog", description = "Categories, genres and titles"),
        (name = "reviews", description = "Reviews and comments")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, immutable container of application services, cloned into every
/// request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Outbound mail for confirmation codes.
    pub mail: MailState,
    /// Confirmation codes and access tokens, keyed from `config`.
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, mail: MailState, config: AppConfig) -> Self {
        Self {
            repo,
            mail,
            tokens: TokenService::new(&config),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MailState {
    fn from_ref(app_state: &AppState) -> MailState {
        app_state.mail.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` can be extracted (valid JWT,
/// or the local `x-user-id` bypass, naming an existing user).
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles every route group under its prefix, applies scoped and global
/// middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Versioned API
    let v1 = Router::new()
        .merge(public::auth_routes())
        .merge(content::content_routes())
        .merge(
            authenticated::authenticated_routes()
                .merge(admin::admin_routes())
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    // 3. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::health_routes())
        .nest("/v1", v1)
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing, correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// create_service
///
/// The router wrapped so that `/v1/titles/` and `/v1/titles` hit the same route.
/// Path normalization has to run before routing, hence outside the `Router`.
pub fn create_service(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(create_router(state))
}

/// trace_span_logger
///
/// Builds the `TraceLayer` span with method, URI and the `x-request-id`, so
/// every log line of a request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
