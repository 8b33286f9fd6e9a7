//! Domain module
//!
//! Value types and business errors shared by the ledger, journal and engine.

mod amount;
mod context;
mod error;

pub use amount::{Amount, AmountError};
pub use context::OperationContext;
pub use error::DomainError;

/// Signup bonus credited to every newly registered account.
pub const SIGNUP_BONUS: rust_decimal::Decimal = rust_decimal::Decimal::from_parts(500, 0, 0, false, 0);

/// Display name used on bank-originated journal legs.
pub const BANK_NAME: &str = "Bank";

/// Synthetic account number used on bank-originated journal legs.
pub const BANK_ACCOUNT_NUMBER: &str = "BANK-0000";

/// Display name recorded as the counterparty of card payments.
pub const MERCHANT_NAME: &str = "Merchant";
