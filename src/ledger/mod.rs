//! Account Ledger Store
//!
//! Durable record of accounts with atomic balance mutation.

mod account;
mod repository;

pub use account::{Account, AccountProfile, ProfileUpdate};
pub use repository::{LedgerError, LedgerRepository};
