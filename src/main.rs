use axum::{ServiceExt, extract::Request};
use review_portal::{
    AppState, ConsoleMailer, HttpMailRelay, MailState,
    config::{AppConfig, Env},
    create_service,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects and migrates the database,
/// picks the mail backend and serves the API.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup. RUST_LOG wins over the default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "review_portal=debug,tower_http=info".into());

    // 3. Initialize Logging: pretty locally, JSON in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let postgres = PostgresRepository::new(pool);
    postgres
        .migrate()
        .await
        .expect("FATAL: Failed to apply database migrations.");
    let repo = Arc::new(postgres) as RepositoryState;

    // 5. Mail Backend
    let mail = match &config.mail_relay_url {
        Some(url) => Arc::new(HttpMailRelay::new(
            url,
            config.mail_relay_key.as_deref(),
            &config.mail_from,
        )) as MailState,
        None => {
            tracing::warn!("MAIL_RELAY_URL not set, confirmation codes are only logged");
            Arc::new(ConsoleMailer) as MailState
        }
    };

    // 6. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(repo, mail, config);

    // 7. Router and Server Startup
    let app = create_service(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
