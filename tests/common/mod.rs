//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use corebank::engine::{RegisterCommand, RegistrationHandler, RegisterResult};
use corebank::ledger::AccountProfile;

/// Setup test database - apply migrations and truncate tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE transactions, cards, accounts, idempotency_keys CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

/// Register an account with a unique-per-run identity; returns the new
/// account (balance = signup bonus) and its card.
#[allow(dead_code)]
pub async fn register_account(pool: &PgPool, tag: &str) -> RegisterResult {
    let run_id = uuid::Uuid::new_v4().simple().to_string();

    let handler = RegistrationHandler::new(pool.clone());
    handler
        .execute(RegisterCommand::new(AccountProfile {
            full_name: format!("Test {tag}"),
            national_id: format!("NID-{tag}-{run_id}"),
            phone: "555-0100".to_string(),
            email: format!("{tag}-{run_id}@example.com"),
            address: "42 Test Street".to_string(),
        }))
        .await
        .expect("Failed to register test account")
}
