//! Scheduled Jobs
//!
//! Background maintenance tasks run on a fixed interval.

use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;

use crate::idempotency::IdempotencyRepository;

/// How often maintenance runs.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 10);

/// Job errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Idempotency(#[from] crate::idempotency::IdempotencyError),
}

/// Delete idempotency keys past their retention window. Expired keys
/// only cost a replay opportunity, never correctness.
pub async fn cleanup_idempotency_keys(pool: &PgPool) -> Result<u64, JobError> {
    let repo = IdempotencyRepository::new(pool.clone());
    let rows_deleted = repo.cleanup_expired().await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "Cleaned up expired idempotency keys");
    }

    Ok(rows_deleted)
}

/// Run the maintenance loop until the process shuts down. Spawned as a
/// background task from main; failures are logged and retried on the
/// next tick, never fatal.
pub async fn run_maintenance_loop(pool: PgPool) {
    let mut ticker = interval(MAINTENANCE_INTERVAL);

    loop {
        ticker.tick().await;

        if let Err(e) = cleanup_idempotency_keys(&pool).await {
            tracing::error!("Idempotency key cleanup failed: {}", e);
        }
    }
}
