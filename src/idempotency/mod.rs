//! Idempotency keys
//!
//! Caller-supplied keys that make the mutating engine operations safe to
//! retry. A key is registered and completed inside the same database
//! transaction as the balance mutation, so a rolled-back operation
//! leaves no trace and a committed one is replayable.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Idempotency key status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    Processing,
    Completed,
}

impl From<String> for IdempotencyStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => IdempotencyStatus::Completed,
            _ => IdempotencyStatus::Processing,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Key already exists and is being processed")]
    KeyInProgress,

    #[error("Request hash mismatch for key {0}")]
    HashMismatch(Uuid),

    #[error("Key not found: {0}")]
    NotFound(Uuid),

    #[error("Completed key {0} has no transaction reference")]
    MissingResult(Uuid),
}

const UNIQUE_VIOLATION: &str = "23505";

/// Repository for idempotency keys.
#[derive(Debug, Clone)]
pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claim a key at the start of a mutating operation.
    ///
    /// Returns `Ok(Some(transaction_id))` when the key was already
    /// completed: the caller must replay the stored result instead of
    /// re-executing. Returns `Ok(None)` when the key is now claimed by
    /// this transaction. A reused key with a different request body is a
    /// `HashMismatch`; a key held by a concurrent in-flight request is
    /// `KeyInProgress`.
    pub async fn begin(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: Uuid,
        request_hash: &str,
    ) -> Result<Option<Uuid>, IdempotencyError> {
        let existing: Option<(String, String, Option<Uuid>)> = sqlx::query_as(
            r#"
            SELECT request_hash, processing_status, transaction_id
            FROM idempotency_keys
            WHERE key = $1
            FOR UPDATE
            "#,
        )
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some((stored_hash, status, transaction_id)) = existing {
            if stored_hash != request_hash {
                return Err(IdempotencyError::HashMismatch(key));
            }
            return match IdempotencyStatus::from(status) {
                // A completed row always carries its result; a NULL
                // here is corruption, never a fresh claim.
                IdempotencyStatus::Completed => match transaction_id {
                    Some(id) => Ok(Some(id)),
                    None => Err(IdempotencyError::MissingResult(key)),
                },
                IdempotencyStatus::Processing => Err(IdempotencyError::KeyInProgress),
            };
        }

        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, request_hash, processing_status, processing_started_at)
            VALUES ($1, $2, 'processing', NOW())
            "#,
        )
        .bind(key)
        .bind(request_hash)
        .execute(&mut **tx)
        .await
        .map_err(|err| {
            if let sqlx::Error::Database(ref db) = err {
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    return IdempotencyError::KeyInProgress;
                }
            }
            IdempotencyError::Database(err)
        })?;

        Ok(None)
    }

    /// Mark the claimed key as completed, recording the journal entry
    /// that the operation produced. Runs in the commit transaction, so a
    /// rollback erases the claim along with everything else.
    pub async fn complete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), IdempotencyError> {
        let rows = sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET processing_status = 'completed', transaction_id = $2
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(transaction_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(IdempotencyError::NotFound(key));
        }
        Ok(())
    }

    /// Delete keys past their retention window.
    pub async fn cleanup_expired(&self) -> Result<u64, IdempotencyError> {
        let rows = sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows)
    }

    /// SHA-256 hash of a canonical request representation, used to
    /// detect a reused key carrying a different request.
    pub fn compute_request_hash(body: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(body);
        hex::encode(hasher.finalize())
    }
}
