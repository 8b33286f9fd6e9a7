//! Load Testing Tool
//!
//! Registers a pool of accounts, then fires transfers between them and
//! reports throughput and the final balance sum (which must equal the
//! signup bonuses handed out).
//!
//! Run with: cargo run --bin load_test --release -- --transfers 1000

use std::time::Instant;

use rust_decimal::Decimal;

use corebank::domain::{OperationContext, SIGNUP_BONUS};
use corebank::engine::{
    RegisterCommand, RegistrationHandler, TransferCommand, TransferHandler,
};
use corebank::ledger::{AccountProfile, LedgerRepository};
use corebank::{db, Config};

const ACCOUNT_POOL: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let transfer_count: u64 = args
        .iter()
        .position(|a| a == "--transfers")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    let config = Config::from_env()?;

    println!("Load Test - {} transfers across {} accounts", transfer_count, ACCOUNT_POOL);
    println!("Connecting to database...");

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let registration = RegistrationHandler::new(pool.clone());

    let mut accounts = Vec::with_capacity(ACCOUNT_POOL);
    for i in 0..ACCOUNT_POOL {
        let result = registration
            .execute(RegisterCommand::new(AccountProfile {
                full_name: format!("Load Tester {i}"),
                national_id: format!("LT-{run_id}-{i}"),
                phone: format!("555-{i:04}"),
                email: format!("load-{run_id}-{i}@example.com"),
                address: "1 Benchmark Way".to_string(),
            }))
            .await?;
        accounts.push(result.account);
    }

    println!("Registered {} accounts, starting transfers...", accounts.len());

    let transfers = TransferHandler::new(pool.clone());
    let start = Instant::now();
    let mut success_count = 0u64;

    for i in 0..transfer_count {
        let sender = &accounts[(i as usize) % ACCOUNT_POOL];
        let receiver = &accounts[(i as usize + 1) % ACCOUNT_POOL];

        let context = OperationContext::new().with_principal(sender.id);
        let command = TransferCommand::new(receiver.account_number.clone(), "1.00".to_string());

        if transfers.execute(command, None, &context).await.is_ok() {
            success_count += 1;
        }

        if (i + 1) % 1000 == 0 {
            println!("Executed {} transfers...", i + 1);
        }
    }

    let elapsed = start.elapsed();
    let rate = success_count as f64 / elapsed.as_secs_f64();

    // Money must be conserved: the sum of final balances equals the
    // bonuses minted at registration.
    let ledger = LedgerRepository::new(pool.clone());
    let mut total = Decimal::ZERO;
    for account in &accounts {
        total += ledger.get_by_id(account.id).await?.balance;
    }
    let expected = SIGNUP_BONUS * Decimal::from(ACCOUNT_POOL as u64);

    println!("\n=== Load Test Results ===");
    println!("Total transfers: {}", transfer_count);
    println!("Successful: {}", success_count);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} transfers/sec", rate);
    println!("Balance sum: {} (expected {})", total, expected);

    if total != expected {
        anyhow::bail!("balance sum drifted: {} != {}", total, expected);
    }

    Ok(())
}
