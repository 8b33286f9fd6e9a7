//! Error handling module
//!
//! Centralized error types and HTTP response conversion. Every guard the
//! engine can trip maps to a distinct, stable `error_code` so the caller
//! always knows which one fired.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::cards::CardError;
use crate::domain::DomainError;
use crate::idempotency::IdempotencyError;
use crate::journal::JournalError;
use crate::ledger::LedgerError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Idempotency conflict: same key with different request")]
    IdempotencyConflict,

    #[error("Request with this idempotency key is already in progress")]
    IdempotencyInProgress,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(e) => AppError::Database(e),
            LedgerError::DuplicateIdentity => AppError::Domain(DomainError::DuplicateIdentity),
            LedgerError::AccountNumberTaken => {
                // Only reachable if the registration retry loop gave up
                AppError::Domain(DomainError::IdentifierExhausted("account number"))
            }
            LedgerError::NotFound(id) => AppError::Domain(DomainError::AccountNotFound(id)),
            LedgerError::InsufficientFunds => AppError::InsufficientFunds,
        }
    }
}

impl From<CardError> for AppError {
    fn from(err: CardError) -> Self {
        match err {
            CardError::Database(e) => AppError::Database(e),
            CardError::CardNumberTaken => {
                AppError::Domain(DomainError::IdentifierExhausted("card number"))
            }
            // The registry never names the missing card to payment
            // callers; this variant only surfaces on the owner's own
            // card view.
            CardError::NotFound(id) => AppError::InvalidRequest(format!("No card for account {id}")),
        }
    }
}

impl From<JournalError> for AppError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Database(e) => AppError::Database(e),
            JournalError::NotFound(id) => {
                AppError::Internal(format!("Journal entry {id} missing"))
            }
        }
    }
}

impl From<IdempotencyError> for AppError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::Database(e) => AppError::Database(e),
            IdempotencyError::KeyInProgress => AppError::IdempotencyInProgress,
            IdempotencyError::HashMismatch(_) => AppError::IdempotencyConflict,
            IdempotencyError::NotFound(key) => {
                AppError::Internal(format!("Idempotency key {key} vanished mid-transaction"))
            }
            IdempotencyError::MissingResult(key) => {
                AppError::Internal(format!("Completed idempotency key {key} has no result"))
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::InsufficientFunds => {
                (StatusCode::BAD_REQUEST, "insufficient_funds", None)
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 409 Conflict
            AppError::IdempotencyConflict => {
                (StatusCode::CONFLICT, "idempotency_conflict", None)
            }
            AppError::IdempotencyInProgress => {
                (StatusCode::CONFLICT, "idempotency_in_progress", None)
            }

            // Domain errors - map each guard to its outward shape
            AppError::Domain(ref domain_err) => match domain_err {
                DomainError::InsufficientFunds { .. } => {
                    (StatusCode::BAD_REQUEST, "insufficient_funds", Some(domain_err.to_string()))
                }
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::AccountNotFound(id) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(id.clone()))
                }
                DomainError::InvalidCard => {
                    // No details on purpose
                    (StatusCode::BAD_REQUEST, "invalid_card", None)
                }
                DomainError::SameAccountTransfer => {
                    (StatusCode::BAD_REQUEST, "same_account_transfer", None)
                }
                DomainError::DuplicateIdentity => {
                    (StatusCode::CONFLICT, "duplicate_identity", None)
                }
                DomainError::IdentifierExhausted(_) => {
                    tracing::error!("Identifier generation exhausted: {}", domain_err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
            },

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        // 5xx detail is logged above, never sent to the caller: sqlx
        // messages carry SQLSTATE text and constraint names.
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
