//! Payment Handler
//!
//! Card-authorized, single-party debit. Authenticates via the card
//! registry instead of a principal, debits the owning account and writes
//! one `payment` journal entry with no counterparty account.

use sqlx::PgPool;
use uuid::Uuid;

use crate::cards::CardRegistry;
use crate::domain::{Amount, DomainError, OperationContext};
use crate::error::AppError;
use crate::idempotency::IdempotencyRepository;
use crate::journal::{JournalRepository, NewEntry};
use crate::ledger::{LedgerError, LedgerRepository};

use super::{PaymentCommand, PaymentResult, PAYMENT_DESCRIPTION};

/// Handler for card payments
pub struct PaymentHandler {
    ledger: LedgerRepository,
    cards: CardRegistry,
    journal: JournalRepository,
    idempotency: IdempotencyRepository,
    pool: PgPool,
}

impl PaymentHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            cards: CardRegistry::new(pool.clone()),
            journal: JournalRepository::new(pool.clone()),
            idempotency: IdempotencyRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(
        &self,
        command: PaymentCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<PaymentResult, AppError> {
        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()))?;

        // Card numbers arrive formatted in groups of four; match on the
        // bare digits.
        let card_number: String = command
            .card_number
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        // One lookup over the full credential triple. Whatever part was
        // wrong, the caller learns only "invalid card".
        let card = self
            .cards
            .find_active_by_credentials(&card_number, &command.cvv, &command.expiry)
            .await?
            .ok_or(DomainError::InvalidCard)?;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        if let Some(key) = idempotency_key {
            let hash = request_hash(&card_number, &command);
            if let Some(entry_id) = self.idempotency.begin(&mut tx, key, &hash).await? {
                tx.rollback().await.map_err(AppError::Database)?;
                return self.replay(card.account_id, entry_id).await;
            }
        }

        let payer = match self.ledger.get_by_id_in_tx(&mut tx, card.account_id).await {
            Ok(account) => account,
            // A card pointing at a missing account reads the same as a
            // bad card from outside.
            Err(LedgerError::NotFound(_)) => return Err(DomainError::InvalidCard.into()),
            Err(e) => return Err(e.into()),
        };

        if payer.balance < amount.value() {
            return Err(DomainError::insufficient_funds(amount.value(), payer.balance).into());
        }

        let remaining_balance = self
            .ledger
            .adjust_balance(&mut tx, payer.id, amount.negated())
            .await?;

        let entry = self
            .journal
            .append(&mut tx, &NewEntry::payment(&payer, &amount, PAYMENT_DESCRIPTION))
            .await?;

        if let Some(key) = idempotency_key {
            self.idempotency.complete(&mut tx, key, entry.id).await?;
        }

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            account_id = %payer.id,
            amount = %amount,
            correlation_id = ?context.correlation_id,
            "Payment committed"
        );

        Ok(PaymentResult {
            transaction_id: entry.id,
            remaining_balance,
        })
    }

    async fn replay(&self, account_id: Uuid, entry_id: Uuid) -> Result<PaymentResult, AppError> {
        let entry = self.journal.get(entry_id).await?;
        let payer = self.ledger.get_by_id(account_id).await?;

        tracing::info!(entry_id = %entry_id, "Replayed idempotent payment");

        Ok(PaymentResult {
            transaction_id: entry.id,
            remaining_balance: payer.balance,
        })
    }
}

fn request_hash(card_number: &str, command: &PaymentCommand) -> String {
    IdempotencyRepository::compute_request_hash(
        format!("payment:{}:{}", card_number, command.amount).as_bytes(),
    )
}
