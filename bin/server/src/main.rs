use integration_hub_access::RateLimiter;
use integration_hub_server::{
    auth::{AppState, db::PgSessionStore},
    config::ServerConfig,
    routes,
};
use integration_hub_vault::{Cipher, CredentialVault, EncryptionKey};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // The key is read once; a missing or malformed key stops startup
    let key =
        EncryptionKey::from_secret_store(&config).expect("invalid credential encryption key");
    let vault = CredentialVault::new(Cipher::new(&key));

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Cleanup expired sessions on startup
    let session_store = PgSessionStore::new(db_pool.clone());
    match session_store.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    let limiter = RateLimiter::new(config.rate_limit.limiter_config());

    // Spawn periodic cleanup of expired sessions and stale rate limit windows
    let sweep_limiter = limiter.clone();
    let sweep_interval_secs = config.rate_limit.sweep_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(sweep_interval_secs));
        loop {
            interval.tick().await;
            let evicted = sweep_limiter.sweep(chrono::Utc::now());
            if evicted > 0 {
                tracing::debug!(evicted_windows = evicted, "Periodic rate limit sweep");
            }
            match session_store.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    let app_state = AppState::new(db_pool, vault, limiter, config.access_deadline());
    let app = routes::router(Arc::new(app_state)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
