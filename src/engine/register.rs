//! Registration Handler
//!
//! Creates an account, issues its card and credits the signup bonus as
//! one atomic unit. An account without a card is not a completed
//! registration, so a card issuance failure rolls everything back.

use chrono::Utc;
use sqlx::PgPool;

use crate::cards::{CardError, CardRegistry};
use crate::domain::{DomainError, SIGNUP_BONUS};
use crate::error::AppError;
use crate::idgen;
use crate::journal::{JournalRepository, NewEntry};
use crate::ledger::{LedgerError, LedgerRepository};

use super::{RegisterCommand, RegisterResult};

/// Attempts before giving up on generated-identifier collisions.
const MAX_ATTEMPTS: u32 = 5;

/// Handler for account registration
pub struct RegistrationHandler {
    ledger: LedgerRepository,
    cards: CardRegistry,
    journal: JournalRepository,
    pool: PgPool,
}

impl RegistrationHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerRepository::new(pool.clone()),
            cards: CardRegistry::new(pool.clone()),
            journal: JournalRepository::new(pool.clone()),
            pool,
        }
    }

    /// Execute the registration command.
    ///
    /// Generated account and card numbers are only probabilistically
    /// unique; the store's unique constraints catch collisions and the
    /// whole attempt is retried with fresh values, bounded by
    /// [`MAX_ATTEMPTS`].
    pub async fn execute(&self, command: RegisterCommand) -> Result<RegisterResult, AppError> {
        let profile = command.profile;
        validate_profile(&profile)?;

        for attempt in 1..=MAX_ATTEMPTS {
            let account_number = idgen::account_number(&mut rand::thread_rng());
            let card_number = idgen::card_number(&mut rand::thread_rng());
            let cvv = idgen::cvv(&mut rand::thread_rng());
            let expiry = idgen::expiry(Utc::now());

            let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

            let account = match self
                .ledger
                .create_account(&mut tx, &profile, &account_number, SIGNUP_BONUS)
                .await
            {
                Ok(account) => account,
                Err(LedgerError::AccountNumberTaken) => {
                    tracing::warn!(attempt, "Account number collided, retrying with a fresh one");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let card = match self
                .cards
                .issue_card(&mut tx, account.id, &card_number, &cvv, &expiry)
                .await
            {
                Ok(card) => card,
                Err(CardError::CardNumberTaken) => {
                    tracing::warn!(attempt, "Card number collided, retrying with a fresh one");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            // The bonus credit is part of the account's balance already;
            // this leg makes it visible in the journal.
            self.journal
                .append(&mut tx, &NewEntry::signup_bonus(&account, SIGNUP_BONUS))
                .await?;

            tx.commit().await.map_err(AppError::Database)?;

            tracing::info!(
                account_id = %account.id,
                account_number = %account.account_number,
                "Account registered"
            );

            return Ok(RegisterResult { account, card });
        }

        Err(DomainError::IdentifierExhausted("account or card number").into())
    }
}

fn validate_profile(profile: &crate::ledger::AccountProfile) -> Result<(), AppError> {
    let fields = [
        ("full_name", &profile.full_name),
        ("national_id", &profile.national_id),
        ("phone", &profile.phone),
        ("email", &profile.email),
        ("address", &profile.address),
    ];

    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(AppError::InvalidRequest(format!("{name} must not be empty")));
        }
    }

    if !profile.email.contains('@') {
        return Err(AppError::InvalidRequest("email is not valid".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AccountProfile;

    fn profile() -> AccountProfile {
        AccountProfile {
            full_name: "Alice Example".to_string(),
            national_id: "35202-1234567-1".to_string(),
            phone: "03001234567".to_string(),
            email: "alice@example.com".to_string(),
            address: "1 Example Street".to_string(),
        }
    }

    #[test]
    fn test_validate_profile_ok() {
        assert!(validate_profile(&profile()).is_ok());
    }

    #[test]
    fn test_validate_profile_blank_field() {
        let mut p = profile();
        p.full_name = "   ".to_string();
        let err = validate_profile(&p).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn test_validate_profile_bad_email() {
        let mut p = profile();
        p.email = "not-an-email".to_string();
        let err = validate_profile(&p).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
