use sqlx::SqlitePool;
use tokio::time::{interval, Duration};

use crate::db::parked_repo::{self, ParkedEvent, KIND_APPLY, KIND_DEADLINE_BACKFILL};
use crate::db::wager_repo::{self, ApplyError};
use crate::ingestion::normalizer::DeadlineReader;
use crate::models::CanonicalEvent;

const RETRY_BATCH_SIZE: i64 = 100;

/// Periodically re-attempt parked work: out-of-order events whose
/// predecessor may have arrived by now, and judge-deadline backfills whose
/// point read previously failed. Successes are unparked; failures bump the
/// attempt counter and stay queued.
pub async fn run_parked_retry<R: DeadlineReader>(
    pool: SqlitePool,
    reader: R,
    interval_secs: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;

        let parked = match parked_repo::list_due(&pool, RETRY_BATCH_SIZE).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load parked events");
                continue;
            }
        };

        if parked.is_empty() {
            continue;
        }

        tracing::debug!(count = parked.len(), "Retrying parked events");

        for entry in &parked {
            let result = match entry.kind.as_str() {
                KIND_APPLY => retry_apply(&pool, entry).await,
                KIND_DEADLINE_BACKFILL => retry_backfill(&pool, &reader, entry).await,
                other => {
                    tracing::error!(id = %entry.id, kind = other, "Unknown parked kind");
                    Ok(false)
                }
            };

            match result {
                Ok(true) => {
                    if let Err(e) = parked_repo::delete(&pool, &entry.id).await {
                        tracing::error!(error = %e, id = %entry.id, "Failed to unpark event");
                    }
                }
                Ok(false) => {
                    if let Err(e) = parked_repo::bump_attempt(&pool, &entry.id).await {
                        tracing::error!(error = %e, id = %entry.id, "Failed to bump attempt");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, id = %entry.id, "Parked retry failed");
                    let _ = parked_repo::bump_attempt(&pool, &entry.id).await;
                }
            }
        }
    }
}

/// Returns Ok(true) when the entry is finished and can be removed.
async fn retry_apply(pool: &SqlitePool, entry: &ParkedEvent) -> anyhow::Result<bool> {
    let event: CanonicalEvent = match serde_json::from_str(&entry.payload) {
        Ok(e) => e,
        Err(e) => {
            // Malformed payloads can never succeed; drop them loudly.
            tracing::error!(id = %entry.id, error = %e, "Unparseable parked payload, removing");
            return Ok(true);
        }
    };

    match wager_repo::apply(pool, &event).await {
        Ok(outcome) => {
            tracing::info!(
                wager = %entry.contract_address,
                kind = event.kind.name(),
                attempts = entry.attempts,
                ?outcome,
                "Parked event applied"
            );
            Ok(true)
        }
        Err(ApplyError::MissingPredecessor { .. }) => Ok(false),
        Err(ApplyError::TerminalConflict { address, kind }) => {
            // Will never become applicable; remove but keep the trace.
            tracing::error!(wager = %address, kind, "Parked event conflicts terminally, removing");
            Ok(true)
        }
        Err(ApplyError::Db(e)) => Err(e.into()),
    }
}

async fn retry_backfill<R: DeadlineReader>(
    pool: &SqlitePool,
    reader: &R,
    entry: &ParkedEvent,
) -> anyhow::Result<bool> {
    let address = entry.payload.parse::<alloy::primitives::Address>()?;

    match reader.read_judge_deadline(address).await {
        Ok(deadline) => {
            wager_repo::backfill_judge_deadline(pool, &entry.contract_address, deadline).await?;
            tracing::info!(
                wager = %entry.contract_address,
                deadline = %deadline,
                attempts = entry.attempts,
                "Judge deadline backfilled"
            );
            Ok(true)
        }
        Err(e) => {
            tracing::warn!(
                wager = %entry.contract_address,
                error = %e,
                "Judge deadline still unreadable"
            );
            Ok(false)
        }
    }
}
