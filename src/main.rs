use auth_portal::{
    AppState, OAuth2Client, OAuthState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Asynchronous entry point: loads configuration, initializes logging, the
/// database pool and the OAuth2 client, then serves the router.
#[tokio::main]
async fn main() {
    // 1. Configuration and environment loading (fail-fast).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging filter: RUST_LOG wins, with sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_portal=debug,tower_http=info,axum=trace".into());

    // 3. Log format by environment: pretty for humans locally, JSON for
    // log aggregators in production.
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
    for provider in &config.providers {
        tracing::info!("OAuth2 provider registered: {}", provider.name);
    }
    if config.providers.is_empty() {
        tracing::warn!("No OAuth2 providers configured; login is disabled.");
    }

    // 4. Database initialization (Postgres).
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. OAuth2 client, sharing one outbound HTTP client across requests.
    let oauth = Arc::new(OAuth2Client::new(&config)) as OAuthState;

    // 6. Unified state assembly.
    let app_state = AppState {
        repo,
        oauth,
        config,
    };

    // 7. Router and server startup.
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("Login page available at: http://localhost:3000/views/login");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    axum::serve(listener, app).await.unwrap();
}
