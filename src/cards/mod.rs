//! Card Registry
//!
//! One active virtual card per account, issued at registration and used
//! as the authorization artifact for card payments.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// A virtual debit card. The CVV is stored as issued; this registry is
/// the system of record for the card, not a tokenization vault.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Card {
    pub id: Uuid,
    pub account_id: Uuid,
    pub card_number: String,
    pub cvv: String,
    pub expiry: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Generated card number collided")]
    CardNumberTaken,

    #[error("Card not found for account {0}")]
    NotFound(Uuid),
}

const UNIQUE_VIOLATION: &str = "23505";

/// Repository over the `cards` table.
#[derive(Debug, Clone)]
pub struct CardRegistry {
    pool: PgPool,
}

impl CardRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issue a card inside the registration transaction. A failure here
    /// aborts the whole registration: an account without a payment
    /// instrument is not a completed registration.
    pub async fn issue_card(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        card_number: &str,
        cvv: &str,
        expiry: &str,
    ) -> Result<Card, CardError> {
        sqlx::query_as::<_, Card>(
            r#"
            INSERT INTO cards (account_id, card_number, cvv, expiry)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, card_number, cvv, expiry, is_active, created_at
            "#,
        )
        .bind(account_id)
        .bind(card_number)
        .bind(cvv)
        .bind(expiry)
        .fetch_one(&mut **tx)
        .await
        .map_err(|err| {
            if let sqlx::Error::Database(ref db) = err {
                if db.code().as_deref() == Some(UNIQUE_VIOLATION)
                    && db.constraint() == Some("cards_card_number_key")
                {
                    return CardError::CardNumberTaken;
                }
            }
            CardError::Database(err)
        })
    }

    /// Look up an active card by the full credential triple.
    ///
    /// Matching all three fields in one query means a wrong CVV, a wrong
    /// expiry and an unknown number all produce the same `None` — no
    /// credential-guessing oracle.
    pub async fn find_active_by_credentials(
        &self,
        card_number: &str,
        cvv: &str,
        expiry: &str,
    ) -> Result<Option<Card>, CardError> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, account_id, card_number, cvv, expiry, is_active, created_at
            FROM cards
            WHERE card_number = $1 AND cvv = $2 AND expiry = $3 AND is_active
            "#,
        )
        .bind(card_number)
        .bind(cvv)
        .bind(expiry)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    /// The card belonging to an account.
    pub async fn get_by_account(&self, account_id: Uuid) -> Result<Card, CardError> {
        sqlx::query_as::<_, Card>(
            r#"
            SELECT id, account_id, card_number, cvv, expiry, is_active, created_at
            FROM cards
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CardError::NotFound(account_id))
    }

    /// Toggle the active flag. Not exercised by the payment flow itself;
    /// a deactivated card simply stops matching `find_active_by_credentials`.
    pub async fn set_active(&self, card_id: Uuid, active: bool) -> Result<(), CardError> {
        let rows = sqlx::query("UPDATE cards SET is_active = $2 WHERE id = $1")
            .bind(card_id)
            .bind(active)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(CardError::NotFound(card_id));
        }
        Ok(())
    }
}
