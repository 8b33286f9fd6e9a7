//! Query/Read Service
//!
//! Derives balance, history and lookup views from the ledger and
//! journal. Never mutates; calling any of these twice with no
//! intervening write returns identical results.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::cards::{Card, CardRegistry};
use crate::error::AppError;
use crate::journal::{JournalEntry, JournalRepository};
use crate::ledger::{Account, LedgerRepository};

/// Public view of a receiver, shown to a sender before a transfer.
/// Never includes balance or card data.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverInfo {
    pub name: String,
    pub email: String,
}

/// Read-only service over the ledger and journal.
#[derive(Clone)]
pub struct QueryService {
    ledger: LedgerRepository,
    cards: CardRegistry,
    journal: JournalRepository,
    history_page_size: i64,
}

impl QueryService {
    pub fn new(pool: PgPool, history_page_size: i64) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            cards: CardRegistry::new(pool.clone()),
            journal: JournalRepository::new(pool),
            history_page_size,
        }
    }

    /// Latest committed balance for an account.
    pub async fn balance(&self, account_id: Uuid) -> Result<Decimal, AppError> {
        let account = self.ledger.get_by_id(account_id).await?;
        Ok(account.balance)
    }

    /// The account's journal view, newest first.
    pub async fn history(&self, account_id: Uuid) -> Result<Vec<JournalEntry>, AppError> {
        // Reject unknown accounts rather than answering with an empty list
        self.ledger.get_by_id(account_id).await?;
        let entries = self.journal.history(account_id, self.history_page_size).await?;
        Ok(entries)
    }

    /// Full profile of the principal's own account.
    pub async fn account(&self, account_id: Uuid) -> Result<Account, AppError> {
        Ok(self.ledger.get_by_id(account_id).await?)
    }

    /// The principal's own card.
    pub async fn card(&self, account_id: Uuid) -> Result<Card, AppError> {
        Ok(self.cards.get_by_account(account_id).await?)
    }

    /// Display name and contact email for a receiving account number.
    pub async fn receiver_info(&self, account_number: &str) -> Result<ReceiverInfo, AppError> {
        let account = self.ledger.get_by_account_number(account_number).await?;
        Ok(ReceiverInfo {
            name: account.full_name,
            email: account.email,
        })
    }
}
