use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use wagerd::escrow::{CreateParams, EscrowWager};
use wagerd::ingestion::normalizer::{DeadlineReader, NormalizerConfig};
use wagerd::models::{LogCoordinate, SchemaVersion};

/// Base USDC address seeded in the default asset registry.
#[allow(dead_code)]
pub const USDC: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";

/// Fresh in-memory database with all migrations applied. One connection so
/// the database lives exactly as long as the pool.
#[allow(dead_code)]
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

#[allow(dead_code)]
pub fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

#[allow(dead_code)]
pub fn coord(tx_hash: &str, log_index: u64) -> LogCoordinate {
    LogCoordinate::new(tx_hash, log_index)
}

/// Normalizer config with millisecond backoff so exhaustion paths stay fast.
#[allow(dead_code)]
pub fn test_normalizer_config() -> NormalizerConfig {
    NormalizerConfig {
        judging_window_secs: 7 * 24 * 60 * 60,
        deadline_read_attempts: 2,
        deadline_read_base_delay: std::time::Duration::from_millis(1),
    }
}

/// A live wager whose deadlines sit comfortably in the future, so the derived
/// phase depends only on the applied events.
#[allow(dead_code)]
pub fn live_wager(version: SchemaVersion, instance: u8) -> EscrowWager {
    let now = Utc::now().timestamp() as u64;
    build_wager(version, instance, now + 86_400, now + 30 * 86_400)
}

/// A wager whose accept deadline already passed without acceptance.
#[allow(dead_code)]
pub fn expired_wager(version: SchemaVersion, instance: u8) -> EscrowWager {
    let now = Utc::now().timestamp() as u64;
    // created well in the past, accept_by an hour ago
    let created = now - 86_400;
    build_wager_at(version, instance, now - 3_600, now + 30 * 86_400, created)
}

#[allow(dead_code)]
pub fn build_wager(
    version: SchemaVersion,
    instance: u8,
    accept_by: u64,
    deadline: u64,
) -> EscrowWager {
    let created = Utc::now().timestamp() as u64 - 60;
    build_wager_at(version, instance, accept_by, deadline, created)
}

#[allow(dead_code)]
pub fn build_wager_at(
    version: SchemaVersion,
    instance: u8,
    accept_by: u64,
    deadline: u64,
    created: u64,
) -> EscrowWager {
    let params = CreateParams {
        maker: addr(0x11),
        taker: addr(0x22),
        judge: addr(0x33),
        asset: USDC.parse().expect("bad asset address"),
        maker_stake: U256::from(1_500_000u64),
        taker_stake: U256::from(1_500_000u64),
        accept_by,
        deadline,
        description: "first to 21 wins".into(),
    };

    EscrowWager::create(addr(instance), version, params, created).expect("wager creation failed")
}

/// Reader that always answers with the same deadline.
#[allow(dead_code)]
pub struct FixedReader(pub DateTime<Utc>);

impl DeadlineReader for FixedReader {
    async fn read_judge_deadline(&self, _wager: Address) -> anyhow::Result<DateTime<Utc>> {
        Ok(self.0)
    }
}

/// Reader standing in for an unreachable chain data provider.
#[allow(dead_code)]
pub struct FailingReader;

impl DeadlineReader for FailingReader {
    async fn read_judge_deadline(&self, _wager: Address) -> anyhow::Result<DateTime<Utc>> {
        anyhow::bail!("rpc unavailable")
    }
}
