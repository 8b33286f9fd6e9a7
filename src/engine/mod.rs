//! Transfer Engine
//!
//! Stateless coordinators over the ledger, card registry and journal.
//! Each handler orchestrates one mutating operation as a sequence of
//! guarded steps inside a single database transaction.

mod commands;
mod payment;
mod register;
mod transfer;

pub use commands::*;
pub use payment::PaymentHandler;
pub use register::RegistrationHandler;
pub use transfer::TransferHandler;
