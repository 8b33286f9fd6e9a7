//! corebank - Core banking backend API
//!
//! Account ledger, card registry, transaction journal and transfer
//! engine over Postgres.

use std::net::SocketAddr;

use axum::{middleware, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use corebank::api::{self, AppState};
use corebank::{config::Config, db, jobs};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corebank=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router
fn build_router(pool: PgPool, history_page_size: i64) -> Router {
    let state = AppState {
        pool,
        history_page_size,
    };

    // Create API router with all routes
    let api_router = api::create_router();

    // Apply middleware to API routes
    // Note: Axum layers are applied in reverse order (last added = first executed)
    // Order: context -> logging -> handler, so request logs carry the
    // correlation id
    let api_routes = api_router
        .layer(middleware::from_fn(api::middleware::logging_middleware))
        .layer(middleware::from_fn(api::middleware::context_middleware));

    Router::new()
        // Health check (no principal needed)
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting corebank server");
    tracing::info!("Connecting to database...");

    // Create database pool
    let pool = db::create_pool(&config).await?;
    db::verify_connection(&pool).await?;

    // Apply pending migrations
    db::run_migrations(&pool).await?;

    tracing::info!("Database connected successfully");

    // Background maintenance (expired idempotency key cleanup)
    tokio::spawn(jobs::run_maintenance_loop(pool.clone()));

    tracing::info!("Listening on http://{}", addr);

    // Build router and start server
    let app = build_router(pool.clone(), config.history_page_size);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
