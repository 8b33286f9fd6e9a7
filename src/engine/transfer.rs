//! Transfer Handler
//!
//! Validated, atomic movement of funds between two accounts. Debit,
//! credit and both journal legs commit in one database transaction;
//! any failed guard rolls the whole operation back, so no partial state
//! is ever observable.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Amount, DomainError, OperationContext};
use crate::error::AppError;
use crate::idempotency::IdempotencyRepository;
use crate::journal::{JournalRepository, NewEntry};
use crate::ledger::LedgerRepository;

use super::{TransferCommand, TransferResult, DEFAULT_TRANSFER_MEMO};

/// Handler for account-to-account transfers
pub struct TransferHandler {
    ledger: LedgerRepository,
    journal: JournalRepository,
    idempotency: IdempotencyRepository,
    pool: PgPool,
}

impl TransferHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            journal: JournalRepository::new(pool.clone()),
            idempotency: IdempotencyRepository::new(pool.clone()),
            pool,
        }
    }

    /// Execute the transfer command on behalf of the context's principal.
    pub async fn execute(
        &self,
        command: TransferCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<TransferResult, AppError> {
        let principal_id = context
            .principal_id
            .ok_or_else(|| AppError::MissingHeader("X-Principal-Id".to_string()))?;

        // Guard 1: amount. Rejected before any storage access.
        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()))?;

        let memo = command
            .memo
            .clone()
            .unwrap_or_else(|| DEFAULT_TRANSFER_MEMO.to_string());

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // Idempotent replay: a completed key short-circuits to the
        // stored result without touching any balance.
        if let Some(key) = idempotency_key {
            let hash = request_hash(principal_id, &command);
            if let Some(entry_id) = self.idempotency.begin(&mut tx, key, &hash).await? {
                tx.rollback().await.map_err(AppError::Database)?;
                return self.replay(principal_id, entry_id).await;
            }
        }

        // Guards 2-4: resolve both parties, reject self-transfer.
        let sender = self.ledger.get_by_id_in_tx(&mut tx, principal_id).await?;
        let receiver = self
            .ledger
            .get_by_account_number_in_tx(&mut tx, &command.receiver_account_number)
            .await?;

        if sender.id == receiver.id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        // Guard 5: funds. A fast pre-check with a precise error; the
        // conditional update below is the authoritative one.
        if sender.balance < amount.value() {
            return Err(
                DomainError::insufficient_funds(amount.value(), sender.balance).into(),
            );
        }

        // Guard 6: commit both legs. Rows are always touched in
        // ascending account-id order so two opposing transfers cannot
        // deadlock each other.
        let mut legs = [
            (sender.id, amount.negated()),
            (receiver.id, amount.value()),
        ];
        legs.sort_by_key(|(id, _)| *id);

        let mut new_sender_balance = sender.balance;
        for (account_id, delta) in legs {
            let balance = self.ledger.adjust_balance(&mut tx, account_id, delta).await?;
            if account_id == sender.id {
                new_sender_balance = balance;
            }
        }

        // Step 7: journal both legs in the same transaction, so a
        // committed balance change can never lack its audit trail.
        let send_entry = self
            .journal
            .append(&mut tx, &NewEntry::send_leg(&sender, &receiver, &amount, &memo))
            .await?;
        self.journal
            .append(&mut tx, &NewEntry::receive_leg(&sender, &receiver, &amount, &memo))
            .await?;

        if let Some(key) = idempotency_key {
            self.idempotency.complete(&mut tx, key, send_entry.id).await?;
        }

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            sender_id = %sender.id,
            receiver_id = %receiver.id,
            amount = %amount,
            correlation_id = ?context.correlation_id,
            "Transfer committed"
        );

        Ok(TransferResult {
            new_balance: new_sender_balance,
            transaction: send_entry,
        })
    }

    /// Rebuild the result of an already-committed transfer.
    async fn replay(&self, principal_id: Uuid, entry_id: Uuid) -> Result<TransferResult, AppError> {
        let transaction = self.journal.get(entry_id).await?;
        let sender = self.ledger.get_by_id(principal_id).await?;

        tracing::info!(entry_id = %entry_id, "Replayed idempotent transfer");

        Ok(TransferResult {
            new_balance: sender.balance,
            transaction,
        })
    }
}

/// Fingerprint of a transfer request. A reused idempotency key whose
/// fingerprint differs is a conflict, not a replay.
fn request_hash(principal_id: Uuid, command: &TransferCommand) -> String {
    IdempotencyRepository::compute_request_hash(
        format!(
            "transfer:{}:{}:{}:{}",
            principal_id,
            command.receiver_account_number,
            command.amount,
            command.memo.as_deref().unwrap_or(DEFAULT_TRANSFER_MEMO),
        )
        .as_bytes(),
    )
}
