//! corebank Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod cards;
pub mod domain;
pub mod engine;
pub mod idempotency;
pub mod idgen;
pub mod jobs;
pub mod journal;
pub mod ledger;
pub mod query;

// Private modules (used only by main.rs binary)
pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{Amount, AmountError, DomainError, OperationContext};
