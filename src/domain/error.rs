//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Business rule violations and domain invariant failures.
/// Independent of the web/storage layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Insufficient balance for a debit
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// Invalid amount (zero, negative, bad scale, exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Account not found by id or account number
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Card credentials did not match any active card.
    /// Deliberately carries no detail: a wrong CVV and an unknown card
    /// number must be indistinguishable to the caller.
    #[error("Invalid card details")]
    InvalidCard,

    /// Transfer where sender and receiver are the same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Registration identity (email or national id) already taken
    #[error("Account already exists with this email or national id")]
    DuplicateIdentity,

    /// Ran out of attempts generating a unique identifier
    #[error("Could not allocate a unique {0} after repeated attempts")]
    IdentifierExhausted(&'static str),
}

impl DomainError {
    pub fn insufficient_funds(
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    ) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Check if this is a client error (caller's fault, not a system fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::IdentifierExhausted(_))
    }
}
