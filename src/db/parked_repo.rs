use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{addr_key, CanonicalEvent};
use alloy::primitives::Address;

/// A canonical event that could not be applied (missing predecessor).
pub const KIND_APPLY: &str = "apply";
/// A v2 wager whose judge deadline still needs an authoritative point read.
pub const KIND_DEADLINE_BACKFILL: &str = "deadline_backfill";

#[derive(Debug, Clone, FromRow)]
pub struct ParkedEvent {
    pub id: String,
    pub kind: String,
    pub contract_address: String,
    pub payload: String,
    pub reason: String,
    pub attempts: i64,
    pub parked_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Park a canonical event for later re-application. Parking the same event
/// twice (identical payload) is a no-op.
pub async fn park_apply(
    pool: &SqlitePool,
    event: &CanonicalEvent,
    reason: &str,
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(event)?;
    insert(pool, KIND_APPLY, &addr_key(event.contract), &payload, reason).await
}

/// Park a judge-deadline backfill task for a v2 wager whose point read
/// exhausted its retry budget during normalization.
pub async fn park_deadline_backfill(
    pool: &SqlitePool,
    wager: Address,
    reason: &str,
) -> anyhow::Result<()> {
    let address = addr_key(wager);
    insert(pool, KIND_DEADLINE_BACKFILL, &address, &address, reason).await
}

async fn insert(
    pool: &SqlitePool,
    kind: &str,
    contract_address: &str,
    payload: &str,
    reason: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO parked_events (id, kind, contract_address, payload, reason, attempts, parked_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        ON CONFLICT (kind, payload) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(kind)
    .bind(contract_address)
    .bind(payload)
    .bind(reason)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Oldest parked entries first, capped so one retry pass stays bounded.
pub async fn list_due(pool: &SqlitePool, limit: i64) -> anyhow::Result<Vec<ParkedEvent>> {
    let rows = sqlx::query_as::<_, ParkedEvent>(
        "SELECT * FROM parked_events ORDER BY parked_at ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn delete(pool: &SqlitePool, id: &str) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM parked_events WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn bump_attempt(pool: &SqlitePool, id: &str) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE parked_events SET attempts = attempts + 1, last_attempt_at = ? WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count(pool: &SqlitePool) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parked_events")
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}
