//! Account record and profile types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A ledger account. `balance` is authoritative and only ever mutated by
/// the transfer engine through conditional updates; the store's CHECK
/// constraint keeps it non-negative even against buggy callers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
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

/// Profile captured at registration. The uniqueness keys are `email`
/// and `national_id`; both are enforced by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub full_name: String,
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// Non-financial fields a principal may change after registration.
/// Balance, account number and identity keys are deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none() && self.address.is_none()
    }
}
