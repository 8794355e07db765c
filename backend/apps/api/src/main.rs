//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `credential::AuthError`.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, http,
    http::{Method, header},
};
use chrono::Utc;
use credential::domain::repository::SessionRepository;
use credential::infra::{PgSessionStore, Repository};
use credential::{
    AuthAppState, PgDatabase, PgStack, RedisCache, TokenService, UserDirectory, credential_router,
};
use platform::password::Argon2Hasher;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,credential=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let database = PgDatabase::new(pool);
    let cache = RedisCache::open(&config.redis_url)?;

    // Startup cleanup: errors here should not prevent server startup
    let sessions = PgSessionStore::standalone(database.clone());
    if let Err(e) = sessions.purge_expired(Utc::now()).await {
        tracing::warn!(error = %e, "Session cleanup failed, continuing anyway");
    }

    tokio::spawn(sweep_expired(sessions, config.sweep_interval));

    let auth_config = Arc::new(config.auth);
    let hasher = Arc::new(Argon2Hasher::new(auth_config.password_pepper.clone()));
    let tokens = Arc::new(TokenService::<PgStack>::new(
        database.clone(),
        Arc::clone(&auth_config),
    )?);
    let users = Arc::new(UserDirectory::new(database, cache, hasher, Arc::clone(&tokens)));

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/v1", credential_router(AuthAppState::new(users, tokens)))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

/// Periodically drop expired sessions
async fn sweep_expired(sessions: PgSessionStore, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    // first tick fires immediately; startup already purged
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match sessions.purge_expired(Utc::now()).await {
            Ok(purged) => tracing::debug!(purged, "Purged expired sessions"),
            Err(e) => tracing::warn!(error = %e, "Periodic session cleanup failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
