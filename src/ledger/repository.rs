//! Account Ledger Repository
//!
//! The authoritative store of account balances. Balance mutation happens
//! through a single conditional UPDATE so that a concurrent writer can
//! never drive a balance negative or lose an update.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Account, AccountProfile, ProfileUpdate};

/// Ledger store errors. Constraint violations are mapped here so that
/// callers see domain outcomes, not Postgres error codes.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Account already exists with this email or national id")]
    DuplicateIdentity,

    #[error("Generated account number collided")]
    AccountNumberTaken,

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Insufficient funds")]
    InsufficientFunds,
}

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// Map an insert failure to the constraint that caused it.
fn map_unique_violation(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return match db.constraint() {
                Some("accounts_account_number_key") => LedgerError::AccountNumberTaken,
                Some("accounts_email_key") | Some("accounts_national_id_key") => {
                    LedgerError::DuplicateIdentity
                }
                _ => LedgerError::Database(err),
            };
        }
    }
    LedgerError::Database(err)
}

/// Repository over the `accounts` table.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account inside the caller's transaction.
    ///
    /// Fails with `DuplicateIdentity` when email or national id is taken
    /// and `AccountNumberTaken` when the generated number collided; the
    /// registration handler retries the latter with a fresh number.
    pub async fn create_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        profile: &AccountProfile,
        account_number: &str,
        starting_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (full_name, national_id, phone, email, address, account_number, balance)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, full_name, national_id, phone, email, address, account_number,
                      balance, created_at, updated_at
            "#,
        )
        .bind(&profile.full_name)
        .bind(&profile.national_id)
        .bind(&profile.phone)
        .bind(&profile.email)
        .bind(&profile.address)
        .bind(account_number)
        .bind(starting_balance)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_unique_violation)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Account, LedgerError> {
        self.fetch_by_id(&self.pool, id).await
    }

    /// Same lookup, but observing the caller's in-flight transaction.
    pub async fn get_by_id_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Account, LedgerError> {
        self.fetch_by_id(&mut **tx, id).await
    }

    async fn fetch_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Account, LedgerError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, full_name, national_id, phone, email, address, account_number,
                   balance, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    pub async fn get_by_account_number(&self, account_number: &str) -> Result<Account, LedgerError> {
        self.fetch_by_account_number(&self.pool, account_number).await
    }

    pub async fn get_by_account_number_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_number: &str,
    ) -> Result<Account, LedgerError> {
        self.fetch_by_account_number(&mut **tx, account_number).await
    }

    async fn fetch_by_account_number<'e, E>(
        &self,
        executor: E,
        account_number: &str,
    ) -> Result<Account, LedgerError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, full_name, national_id, phone, email, address, account_number,
                   balance, created_at, updated_at
            FROM accounts
            WHERE account_number = $1
            "#,
        )
        .bind(account_number)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| LedgerError::NotFound(account_number.to_string()))
    }

    /// Atomically apply a signed delta to a balance.
    ///
    /// The WHERE clause re-evaluates against the latest committed row
    /// after any lock wait, so the non-negativity check and the write are
    /// one atomic step. Returns the new balance.
    pub async fn adjust_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        delta: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let new_balance: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1 AND balance + $2 >= 0
            RETURNING balance
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut **tx)
        .await?;

        match new_balance {
            Some(balance) => Ok(balance),
            None => {
                // Zero rows: either the account is gone or the debit
                // would go negative. Distinguish with one more lookup.
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
                        .bind(id)
                        .fetch_one(&mut **tx)
                        .await?;
                if exists {
                    Err(LedgerError::InsufficientFunds)
                } else {
                    Err(LedgerError::NotFound(id.to_string()))
                }
            }
        }
    }

    /// Update non-financial profile fields. Balance and account number
    /// are not reachable from here.
    pub async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Account, LedgerError> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET full_name = COALESCE($2, full_name),
                phone     = COALESCE($3, phone),
                address   = COALESCE($4, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, full_name, national_id, phone, email, address, account_number,
                      balance, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.full_name.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.address.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::NotFound("123456789012".to_string());
        assert!(err.to_string().contains("123456789012"));

        let err = LedgerError::InsufficientFunds;
        assert_eq!(err.to_string(), "Insufficient funds");
    }
}
