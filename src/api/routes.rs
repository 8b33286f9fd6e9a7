//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::cards::Card;
use crate::domain::OperationContext;
use crate::engine::{
    PaymentCommand, PaymentHandler, RegisterCommand, RegistrationHandler, TransferCommand,
    TransferHandler,
};
use crate::error::AppError;
use crate::journal::JournalEntry;
use crate::ledger::{Account, AccountProfile, ProfileUpdate};
use crate::query::QueryService;

use super::middleware::Principal;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub history_page_size: i64,
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub full_name: String,
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub account_number: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            full_name: account.full_name,
            national_id: account.national_id,
            phone: account.phone,
            email: account.email,
            address: account.address,
            account_number: account.account_number,
            balance: account.balance,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub card_number: String,
    pub cvv: String,
    pub expiry: String,
    pub is_active: bool,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            card_number: card.card_number,
            cvv: card.cvv,
            expiry: card.expiry,
            is_active: card.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub account: AccountResponse,
    pub card: CardResponse,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCardRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub account_id: Uuid,
    pub entries: Vec<JournalEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub receiver_account_number: String,
    pub amount: String,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub transaction_id: Uuid,
    pub new_balance: Decimal,
    pub transaction: JournalEntry,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub card_number: String,
    pub cvv: String,
    pub expiry: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub transaction_id: Uuid,
    pub remaining_balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ReceiverResponse {
    pub name: String,
    pub email: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Registration
        .route("/accounts", post(register))
        // Own-account views
        .route("/accounts/me", get(get_profile))
        .route("/accounts/me", patch(update_profile))
        .route("/accounts/me/balance", get(get_balance))
        .route("/accounts/me/history", get(get_history))
        .route("/accounts/me/card", get(get_card))
        .route("/accounts/me/card", patch(update_card))
        // Pre-transfer receiver lookup
        .route("/receivers/:account_number", get(get_receiver))
        // Money movement
        .route("/transfers", post(transfer))
        .route("/payments", post(payment))
}

fn require_principal(principal: Option<Extension<Principal>>) -> Result<Uuid, AppError> {
    principal
        .map(|Extension(p)| p.account_id)
        .ok_or_else(|| AppError::MissingHeader("X-Principal-Id".to_string()))
}

/// Extract the optional Idempotency-Key header. A present-but-malformed
/// key is rejected rather than dropped: executing without the retry
/// protection the caller asked for would be worse than failing.
fn idempotency_key(headers: &axum::http::HeaderMap) -> Result<Option<Uuid>, AppError> {
    match headers.get("Idempotency-Key") {
        None => Ok(None),
        Some(value) => {
            let key = value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| {
                    AppError::InvalidRequest("Idempotency-Key must be a UUID".to_string())
                })?;
            Ok(Some(key))
        }
    }
}

// =========================================================================
// POST /accounts
// =========================================================================

/// Open a new account with its first card and signup bonus
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let handler = RegistrationHandler::new(state.pool);

    let command = RegisterCommand::new(AccountProfile {
        full_name: request.full_name,
        national_id: request.national_id,
        phone: request.phone,
        email: request.email,
        address: request.address,
    });

    let result = handler.execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account: result.account.into(),
            card: result.card.into(),
        }),
    ))
}

// =========================================================================
// GET /accounts/me
// =========================================================================

async fn get_profile(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> Result<Json<AccountResponse>, AppError> {
    let account_id = require_principal(principal)?;

    let query = QueryService::new(state.pool, state.history_page_size);
    let account = query.account(account_id).await?;

    Ok(Json(account.into()))
}

// =========================================================================
// PATCH /accounts/me
// =========================================================================

async fn update_profile(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let account_id = require_principal(principal)?;

    let update = ProfileUpdate {
        full_name: request.full_name,
        phone: request.phone,
        address: request.address,
    };

    let ledger = crate::ledger::LedgerRepository::new(state.pool);
    let account = ledger.update_profile(account_id, &update).await?;

    Ok(Json(account.into()))
}

// =========================================================================
// GET /accounts/me/balance
// =========================================================================

async fn get_balance(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> Result<Json<BalanceResponse>, AppError> {
    let account_id = require_principal(principal)?;

    let query = QueryService::new(state.pool, state.history_page_size);
    let balance = query.balance(account_id).await?;

    Ok(Json(BalanceResponse {
        account_id,
        balance,
    }))
}

// =========================================================================
// GET /accounts/me/history
// =========================================================================

async fn get_history(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> Result<Json<HistoryResponse>, AppError> {
    let account_id = require_principal(principal)?;

    let query = QueryService::new(state.pool, state.history_page_size);
    let entries = query.history(account_id).await?;

    Ok(Json(HistoryResponse {
        account_id,
        entries,
    }))
}

// =========================================================================
// GET /accounts/me/card
// =========================================================================

async fn get_card(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> Result<Json<CardResponse>, AppError> {
    let account_id = require_principal(principal)?;

    let query = QueryService::new(state.pool, state.history_page_size);
    let card = query.card(account_id).await?;

    Ok(Json(card.into()))
}

// =========================================================================
// PATCH /accounts/me/card
// =========================================================================

/// Freeze or unfreeze the principal's card. A frozen card stops
/// matching payment credentials.
async fn update_card(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    Json(request): Json<UpdateCardRequest>,
) -> Result<Json<CardResponse>, AppError> {
    let account_id = require_principal(principal)?;

    // Ownership check resolves the principal's own card only
    let query = QueryService::new(state.pool.clone(), state.history_page_size);
    let card = query.card(account_id).await?;

    let registry = crate::cards::CardRegistry::new(state.pool);
    registry.set_active(card.id, request.is_active).await?;

    Ok(Json(CardResponse {
        is_active: request.is_active,
        ..card.into()
    }))
}

// =========================================================================
// GET /receivers/:account_number
// =========================================================================

/// Look up a receiver's display name before sending money
async fn get_receiver(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<ReceiverResponse>, AppError> {
    let query = QueryService::new(state.pool, state.history_page_size);
    let info = query.receiver_info(&account_number).await?;

    Ok(Json(ReceiverResponse {
        name: info.name,
        email: info.email,
    }))
}

// =========================================================================
// POST /transfers
// =========================================================================

/// Move money from the principal's account to another account
async fn transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    headers: axum::http::HeaderMap,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    let idem_key = idempotency_key(&headers)?;

    let handler = TransferHandler::new(state.pool);

    let command = TransferCommand::new(request.receiver_account_number, request.amount);
    let command = if let Some(memo) = request.memo {
        command.with_memo(memo)
    } else {
        command
    };

    let result = handler.execute(command, idem_key, &context).await?;

    Ok(Json(TransferResponse {
        transaction_id: result.transaction.id,
        new_balance: result.new_balance,
        transaction: result.transaction,
    }))
}

// =========================================================================
// POST /payments
// =========================================================================

/// Pay a merchant out of the account behind the presented card
async fn payment(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    headers: axum::http::HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let idem_key = idempotency_key(&headers)?;

    let handler = PaymentHandler::new(state.pool);

    let command = PaymentCommand::new(
        request.card_number,
        request.cvv,
        request.expiry,
        request.amount,
    );

    let result = handler.execute(command, idem_key, &context).await?;

    Ok(Json(PaymentResponse {
        transaction_id: result.transaction_id,
        remaining_balance: result.remaining_balance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_request_memo_defaults_to_none() {
        let request: TransferRequest = serde_json::from_str(
            r#"{"receiver_account_number": "123456789012", "amount": "50.00"}"#,
        )
        .unwrap();

        assert_eq!(request.receiver_account_number, "123456789012");
        assert_eq!(request.amount, "50.00");
        assert!(request.memo.is_none());
    }

    #[test]
    fn test_update_profile_request_partial() {
        let request: UpdateProfileRequest =
            serde_json::from_str(r#"{"phone": "555-0100"}"#).unwrap();

        assert!(request.full_name.is_none());
        assert_eq!(request.phone.as_deref(), Some("555-0100"));
        assert!(request.address.is_none());
    }

    #[test]
    fn test_idempotency_key_header_parsing() {
        let mut headers = axum::http::HeaderMap::new();
        assert!(idempotency_key(&headers).unwrap().is_none());

        headers.insert("Idempotency-Key", "not-a-uuid".parse().unwrap());
        assert!(matches!(
            idempotency_key(&headers),
            Err(AppError::InvalidRequest(_))
        ));

        let key = Uuid::new_v4();
        headers.insert("Idempotency-Key", key.to_string().parse().unwrap());
        assert_eq!(idempotency_key(&headers).unwrap(), Some(key));
    }

    #[test]
    fn test_payment_request_deserializes() {
        let request: PaymentRequest = serde_json::from_str(
            r#"{"card_number": "4016 0000 1111 2222", "cvv": "123", "expiry": "08/31", "amount": "25"}"#,
        )
        .unwrap();

        assert_eq!(request.card_number, "4016 0000 1111 2222");
        assert_eq!(request.cvv, "123");
    }
}
