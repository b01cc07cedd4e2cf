use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{addr_key, CanonicalEvent, CanonicalKind, Wager, WatchedWager};

/// What an apply call did to the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new wager row was created.
    Inserted,
    /// An existing row gained its event's field(s).
    Updated,
    /// Redelivery: the coordinate was seen before, or the target field is
    /// already set. Stored state is unchanged.
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The event's causal predecessor has not been applied yet; the store
    /// rolls back and the caller parks the event for retry.
    #[error("missing causal predecessor for {kind} on {address}")]
    MissingPredecessor { address: String, kind: &'static str },

    /// The record already reached the other terminal outcome. Applying would
    /// violate cancellation/resolution mutual exclusion; stored state is
    /// left untouched.
    #[error("terminal conflict applying {kind} to {address}")]
    TerminalConflict { address: String, kind: &'static str },

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Idempotent upsert entry point for the reconciliation store.
///
/// The whole apply runs in one transaction: the event's log coordinate is
/// claimed in `applied_events` (primary key — redelivery is a no-op), then
/// the wager row is inserted or updated through guarded writes that only
/// touch still-unset fields. An error path rolls the claim back too, so a
/// parked event can be retried under the same coordinate. Concurrent calls
/// for different addresses are independent; same-address calls serialize on
/// the row via the transaction and the guarded updates.
pub async fn apply(pool: &SqlitePool, event: &CanonicalEvent) -> Result<ApplyOutcome, ApplyError> {
    let address = addr_key(event.contract);
    let kind = event.kind.name();

    let mut tx = pool.begin().await?;

    let claimed = sqlx::query(
        r#"
        INSERT INTO applied_events (log_id, contract_address, kind, applied_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (log_id) DO NOTHING
        "#,
    )
    .bind(event.coordinate.id())
    .bind(&address)
    .bind(kind)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if claimed == 0 {
        // Same coordinate as an earlier delivery; nothing to do.
        return Ok(ApplyOutcome::Duplicate);
    }

    let existing: Option<Wager> = sqlx::query_as("SELECT * FROM wagers WHERE address = ?")
        .bind(&address)
        .fetch_optional(&mut *tx)
        .await?;

    let outcome = match &event.kind {
        CanonicalKind::Created {
            description,
            maker,
            taker,
            judge,
            asset,
            maker_stake,
            taker_stake,
            accept_by,
            outcome_by,
            judge_deadline,
        } => {
            if existing.is_some() {
                ApplyOutcome::Duplicate
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO wagers (
                        address, schema_version, description,
                        maker, taker, judge, asset,
                        maker_stake, taker_stake,
                        accept_by, outcome_by, judge_deadline,
                        created_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&address)
                .bind(event.version.as_i64())
                .bind(description)
                .bind(addr_key(*maker))
                .bind(addr_key(*taker))
                .bind(addr_key(*judge))
                .bind(addr_key(*asset))
                .bind(maker_stake.to_string())
                .bind(taker_stake.to_string())
                .bind(accept_by)
                .bind(outcome_by)
                .bind(judge_deadline)
                .bind(event.block_time)
                .execute(&mut *tx)
                .await?;
                ApplyOutcome::Inserted
            }
        }

        CanonicalKind::Accepted => {
            let Some(wager) = existing else {
                return Err(ApplyError::MissingPredecessor { address, kind });
            };
            if wager.accepted_at.is_some() {
                ApplyOutcome::Duplicate
            } else {
                sqlx::query(
                    "UPDATE wagers SET accepted_at = ? WHERE address = ? AND accepted_at IS NULL",
                )
                .bind(event.block_time)
                .bind(&address)
                .execute(&mut *tx)
                .await?;
                ApplyOutcome::Updated
            }
        }

        CanonicalKind::Resolved { winner } => {
            let Some(wager) = existing else {
                return Err(ApplyError::MissingPredecessor { address, kind });
            };
            if wager.winner.is_some() {
                ApplyOutcome::Duplicate
            } else if wager.cancelled_at.is_some() {
                return Err(ApplyError::TerminalConflict { address, kind });
            } else if wager.accepted_at.is_none() {
                // Resolution implies acceptance; deriving status from this
                // partial record would be wrong.
                return Err(ApplyError::MissingPredecessor { address, kind });
            } else {
                sqlx::query(
                    r#"
                    UPDATE wagers SET winner = ?, resolved_at = ?
                    WHERE address = ? AND winner IS NULL AND cancelled_at IS NULL
                    "#,
                )
                .bind(addr_key(*winner))
                .bind(event.block_time)
                .bind(&address)
                .execute(&mut *tx)
                .await?;
                ApplyOutcome::Updated
            }
        }

        CanonicalKind::Cancelled => {
            let Some(wager) = existing else {
                return Err(ApplyError::MissingPredecessor { address, kind });
            };
            if wager.cancelled_at.is_some() {
                ApplyOutcome::Duplicate
            } else if wager.winner.is_some() {
                return Err(ApplyError::TerminalConflict { address, kind });
            } else {
                sqlx::query(
                    r#"
                    UPDATE wagers SET cancelled_at = ?
                    WHERE address = ? AND cancelled_at IS NULL AND winner IS NULL
                    "#,
                )
                .bind(event.block_time)
                .bind(&address)
                .execute(&mut *tx)
                .await?;
                ApplyOutcome::Updated
            }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Fill in a v2 judge deadline obtained after the creation event was applied
/// with a best-effort value.
pub async fn backfill_judge_deadline(
    pool: &SqlitePool,
    address: &str,
    judge_deadline: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE wagers SET judge_deadline = ? WHERE address = ?")
        .bind(judge_deadline)
        .bind(address)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_wager(pool: &SqlitePool, address: &str) -> anyhow::Result<Option<Wager>> {
    let row = sqlx::query_as::<_, Wager>("SELECT * FROM wagers WHERE address = ?")
        .bind(address.to_lowercase())
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn list_wagers(pool: &SqlitePool, limit: i64, offset: i64) -> anyhow::Result<Vec<Wager>> {
    let rows = sqlx::query_as::<_, Wager>(
        "SELECT * FROM wagers ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Register a factory-announced wager contract in the discovery set.
pub async fn register_watched(
    pool: &SqlitePool,
    address: &str,
    schema_version: i64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO watched_wagers (address, schema_version, registered_at)
        VALUES (?, ?, ?)
        ON CONFLICT (address) DO NOTHING
        "#,
    )
    .bind(address.to_lowercase())
    .bind(schema_version)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_watched(pool: &SqlitePool) -> anyhow::Result<Vec<WatchedWager>> {
    let rows = sqlx::query_as::<_, WatchedWager>("SELECT * FROM watched_wagers")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Read a single-value indexer state entry (e.g. the poller's block cursor).
pub async fn get_state(pool: &SqlitePool, key: &str) -> anyhow::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM indexer_state WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.0))
}

pub async fn set_state(pool: &SqlitePool, key: &str, value: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO indexer_state (key, value) VALUES (?, ?)
        ON CONFLICT (key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
