//! Transaction Journal
//!
//! Append-only, immutable log of monetary movements. A two-party
//! transfer writes two legs (send and receive), a card payment writes
//! one. Rows are never updated or deleted; the journal is the audit
//! trail.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Amount, BANK_ACCOUNT_NUMBER, BANK_NAME, MERCHANT_NAME};
use crate::ledger::Account;

/// Journal leg type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Send,
    Receive,
    Payment,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Send => "send",
            EntryKind::Receive => "receive",
            EntryKind::Payment => "payment",
        }
    }
}

/// A committed journal entry. Names and account numbers are denormalized
/// at write time on purpose: history stays accurate even if a party
/// later renames.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JournalEntry {
    pub id: Uuid,
    pub sender_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub sender_name: String,
    pub receiver_name: Option<String>,
    pub sender_account_number: Option<String>,
    pub receiver_account_number: Option<String>,
    pub amount: Decimal,
    pub entry_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// An entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub sender_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub sender_name: String,
    pub receiver_name: Option<String>,
    pub sender_account_number: Option<String>,
    pub receiver_account_number: Option<String>,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub description: String,
}

impl NewEntry {
    /// The sender's leg of a transfer. Amount is recorded negative so
    /// that an account's history is a single signed net-flow column.
    pub fn send_leg(sender: &Account, receiver: &Account, amount: &Amount, memo: &str) -> Self {
        Self {
            sender_id: Some(sender.id),
            receiver_id: Some(receiver.id),
            sender_name: sender.full_name.clone(),
            receiver_name: Some(receiver.full_name.clone()),
            sender_account_number: Some(sender.account_number.clone()),
            receiver_account_number: Some(receiver.account_number.clone()),
            amount: amount.negated(),
            kind: EntryKind::Send,
            description: memo.to_string(),
        }
    }

    /// The receiver's leg of a transfer, recorded positive.
    pub fn receive_leg(sender: &Account, receiver: &Account, amount: &Amount, memo: &str) -> Self {
        Self {
            amount: amount.value(),
            kind: EntryKind::Receive,
            ..Self::send_leg(sender, receiver, amount, memo)
        }
    }

    /// The single leg of a card payment: no counterparty account, the
    /// receiver is the symbolic merchant sink.
    pub fn payment(payer: &Account, amount: &Amount, memo: &str) -> Self {
        Self {
            sender_id: Some(payer.id),
            receiver_id: None,
            sender_name: payer.full_name.clone(),
            receiver_name: Some(MERCHANT_NAME.to_string()),
            sender_account_number: Some(payer.account_number.clone()),
            receiver_account_number: None,
            amount: amount.value(),
            kind: EntryKind::Payment,
            description: memo.to_string(),
        }
    }

    /// Bank-originated credit written at registration.
    pub fn signup_bonus(account: &Account, amount: Decimal) -> Self {
        Self {
            sender_id: None,
            receiver_id: Some(account.id),
            sender_name: BANK_NAME.to_string(),
            receiver_name: Some(account.full_name.clone()),
            sender_account_number: Some(BANK_ACCOUNT_NUMBER.to_string()),
            receiver_account_number: Some(account.account_number.clone()),
            amount,
            kind: EntryKind::Receive,
            description: "Welcome bonus".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Journal entry not found: {0}")]
    NotFound(Uuid),
}

/// Repository over the append-only `transactions` table.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: PgPool,
}

impl JournalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one entry inside the caller's transaction. Pure insert;
    /// the row is immutable afterward.
    pub async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &NewEntry,
    ) -> Result<JournalEntry, JournalError> {
        let row = sqlx::query_as::<_, JournalEntry>(
            r#"
            INSERT INTO transactions (
                sender_id, receiver_id, sender_name, receiver_name,
                sender_account_number, receiver_account_number,
                amount, entry_type, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, sender_id, receiver_id, sender_name, receiver_name,
                      sender_account_number, receiver_account_number,
                      amount, entry_type, description, created_at
            "#,
        )
        .bind(entry.sender_id)
        .bind(entry.receiver_id)
        .bind(&entry.sender_name)
        .bind(entry.receiver_name.as_deref())
        .bind(entry.sender_account_number.as_deref())
        .bind(entry.receiver_account_number.as_deref())
        .bind(entry.amount)
        .bind(entry.kind.as_str())
        .bind(&entry.description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row)
    }

    /// An account's history, newest first. An entry belongs to the
    /// account's view iff the account is the sender of a negative leg or
    /// the receiver of a positive leg, so each logical transfer shows
    /// exactly one leg per observer.
    pub async fn history(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        let rows = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, sender_id, receiver_id, sender_name, receiver_name,
                   sender_account_number, receiver_account_number,
                   amount, entry_type, description, created_at
            FROM transactions
            WHERE (sender_id = $1 AND amount < 0)
               OR (receiver_id = $1 AND amount > 0)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Fetch a single entry, used when replaying an idempotent request.
    pub async fn get(&self, id: Uuid) -> Result<JournalEntry, JournalError> {
        sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, sender_id, receiver_id, sender_name, receiver_name,
                   sender_account_number, receiver_account_number,
                   amount, entry_type, description, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(JournalError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(name: &str, number: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            national_id: format!("{number}-nid"),
            phone: "0300".to_string(),
            email: format!("{name}@example.com"),
            address: "somewhere".to_string(),
            account_number: number.to_string(),
            balance: dec!(500),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_transfer_legs_sum_to_zero() {
        let sender = account("Alice", "111111111111");
        let receiver = account("Bob", "222222222222");
        let amount = Amount::from_integer(200).unwrap();

        let send = NewEntry::send_leg(&sender, &receiver, &amount, "rent");
        let receive = NewEntry::receive_leg(&sender, &receiver, &amount, "rent");

        assert_eq!(send.amount + receive.amount, dec!(0));
        assert_eq!(send.amount, dec!(-200));
        assert_eq!(receive.amount, dec!(200));
        assert_eq!(send.kind, EntryKind::Send);
        assert_eq!(receive.kind, EntryKind::Receive);
    }

    #[test]
    fn test_transfer_legs_share_identities() {
        let sender = account("Alice", "111111111111");
        let receiver = account("Bob", "222222222222");
        let amount = Amount::from_integer(50).unwrap();

        let send = NewEntry::send_leg(&sender, &receiver, &amount, "lunch");
        let receive = NewEntry::receive_leg(&sender, &receiver, &amount, "lunch");

        for leg in [&send, &receive] {
            assert_eq!(leg.sender_id, Some(sender.id));
            assert_eq!(leg.receiver_id, Some(receiver.id));
            assert_eq!(leg.sender_name, "Alice");
            assert_eq!(leg.receiver_name.as_deref(), Some("Bob"));
            assert_eq!(leg.sender_account_number.as_deref(), Some("111111111111"));
            assert_eq!(leg.receiver_account_number.as_deref(), Some("222222222222"));
            assert_eq!(leg.description, "lunch");
        }
    }

    #[test]
    fn test_payment_has_no_counterparty_account() {
        let payer = account("Carol", "333333333333");
        let amount = Amount::from_integer(50).unwrap();

        let entry = NewEntry::payment(&payer, &amount, "Online payment");

        assert_eq!(entry.kind, EntryKind::Payment);
        assert_eq!(entry.amount, dec!(50));
        assert_eq!(entry.receiver_id, None);
        assert_eq!(entry.receiver_account_number, None);
        assert_eq!(entry.receiver_name.as_deref(), Some(MERCHANT_NAME));
    }

    #[test]
    fn test_signup_bonus_comes_from_bank() {
        let acct = account("Dave", "444444444444");
        let entry = NewEntry::signup_bonus(&acct, dec!(500));

        assert_eq!(entry.sender_id, None);
        assert_eq!(entry.sender_name, BANK_NAME);
        assert_eq!(entry.sender_account_number.as_deref(), Some(BANK_ACCOUNT_NUMBER));
        assert_eq!(entry.receiver_id, Some(acct.id));
        assert_eq!(entry.amount, dec!(500));
        assert_eq!(entry.kind, EntryKind::Receive);
    }

    #[test]
    fn test_entry_kind_as_str() {
        assert_eq!(EntryKind::Send.as_str(), "send");
        assert_eq!(EntryKind::Receive.as_str(), "receive");
        assert_eq!(EntryKind::Payment.as_str(), "payment");
    }
}
