use anyhow::{Context, Result};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use store_api::config::Config;
use store_api::db::postgres::run_migrations;
use store_api::router::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    store_api::logging::init(false);

    info!("Starting store API server...");

    // --- Configuration ---
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());
    info!("Loading configuration from: {}", config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    let addr = config.socket_addr()?;

    // --- Database Setup ---
    info!(
        host = %config.database.host,
        database = %config.database.name,
        "Setting up database connection pool..."
    );
    let manager = ConnectionManager::<PgConnection>::new(config.database.connection_url());
    let pool = Pool::builder()
        .max_size(config.database.pool_size)
        .build(manager)
        .context("Failed to create database connection pool")?;
    let db_pool = Arc::new(pool);
    info!("Database pool created successfully.");

    if config.run_migrations {
        let migration_pool = db_pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = migration_pool
                .get()
                .context("Failed to get DB connection for migrations")?;
            run_migrations(&mut conn)
        })
        .await
        .context("Migration task failed")??;
        info!("Database migrations are up to date.");
    }

    // --- Setup Server ---
    let app = create_router(db_pool, Arc::new(config));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {}", addr))?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Axum server failed")?;

    info!("Application shut down.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down."),
        _ = terminate => info!("Received SIGTERM, shutting down."),
    }
}
