//! Command definitions
//!
//! Commands represent intentions to change the system state; results are
//! what the engine hands back on commit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::journal::JournalEntry;
use crate::ledger::{Account, AccountProfile};

/// Memo recorded on transfer legs when the caller supplies none.
pub const DEFAULT_TRANSFER_MEMO: &str = "Money transfer";

/// Description recorded on card payment entries.
pub const PAYMENT_DESCRIPTION: &str = "Online payment";

/// Command to register a new account (with its card and signup bonus).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCommand {
    pub profile: AccountProfile,
}

impl RegisterCommand {
    pub fn new(profile: AccountProfile) -> Self {
        Self { profile }
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResult {
    pub account: Account,
    pub card: Card,
}

/// Command to move money from the principal's account to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    /// Account number of the receiving party
    pub receiver_account_number: String,
    /// Amount to transfer (as string for precise decimal)
    pub amount: String,
    /// Optional memo, defaulted to [`DEFAULT_TRANSFER_MEMO`]
    pub memo: Option<String>,
}

impl TransferCommand {
    pub fn new(receiver_account_number: String, amount: String) -> Self {
        Self {
            receiver_account_number,
            amount,
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: String) -> Self {
        self.memo = Some(memo);
        self
    }
}

/// Result of a successful transfer: the sender's new balance and their
/// (send) leg of the journal.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub new_balance: Decimal,
    pub transaction: JournalEntry,
}

/// Command to pay a merchant, authorized by card credentials rather than
/// a principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCommand {
    pub card_number: String,
    pub cvv: String,
    pub expiry: String,
    pub amount: String,
}

impl PaymentCommand {
    pub fn new(card_number: String, cvv: String, expiry: String, amount: String) -> Self {
        Self {
            card_number,
            cvv,
            expiry,
            amount,
        }
    }
}

/// Result of a successful payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResult {
    pub transaction_id: uuid::Uuid,
    pub remaining_balance: Decimal,
}
