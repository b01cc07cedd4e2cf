use metrics::{counter, histogram};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::Instant;

use alloy::primitives::Address;
use futures_util::future::join_all;

use crate::db::wager_repo::{self, ApplyError, ApplyOutcome};
use crate::db::parked_repo;
use crate::models::{addr_key, RawWagerEvent};

use super::normalizer::{self, DeadlineReader, NormalizeError, NormalizerConfig};

/// Process one batch of raw chain events.
///
/// Factory registration messages update the watched set first so creations
/// for freshly announced contracts are decodable. The remaining events are
/// grouped per wager address: different addresses proceed concurrently,
/// events for one address strictly in arrival order. A failure on one wager
/// never stops the others.
pub async fn process_raw_batch<R: DeadlineReader>(
    batch: Vec<RawWagerEvent>,
    pool: &SqlitePool,
    reader: &R,
    config: &NormalizerConfig,
) -> anyhow::Result<()> {
    let mut groups: HashMap<Address, Vec<RawWagerEvent>> = HashMap::new();

    for event in batch {
        if let RawWagerEvent::Deployed { wager, schema_tag, .. } = &event {
            tracing::info!(wager = %wager, schema_tag, "Factory announced new wager contract");
            wager_repo::register_watched(pool, &addr_key(*wager), *schema_tag as i64).await?;
            continue;
        }
        groups.entry(event.contract()).or_default().push(event);
    }

    let tasks = groups.into_iter().map(|(wager, events)| async move {
        for event in &events {
            if let Err(e) = process_event(event, pool, reader, config).await {
                tracing::error!(
                    wager = %wager,
                    event = event.name(),
                    coordinate = %event.coordinate(),
                    error = %e,
                    "Event processing failed"
                );
            }
        }
    });
    join_all(tasks).await;

    Ok(())
}

/// Normalize and apply a single wager event.
///
/// Reconciliation errors never corrupt the store: unknown schemas are
/// rejected and logged, events missing their causal predecessor or hitting a
/// database fault are parked for retry, terminal conflicts are skipped with
/// the prior state intact. An error propagates only when parking itself
/// fails.
pub async fn process_event<R: DeadlineReader>(
    raw: &RawWagerEvent,
    pool: &SqlitePool,
    reader: &R,
    config: &NormalizerConfig,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let normalized = match normalizer::normalize(raw, reader, config).await {
        Ok(n) => n,
        Err(NormalizeError::UnknownSchema(tag)) => {
            counter!("schema_rejections_total").increment(1);
            tracing::error!(
                coordinate = %raw.coordinate(),
                wager = %raw.contract(),
                tag,
                "Rejected event with unknown schema version"
            );
            return Ok(());
        }
        Err(NormalizeError::NotAWagerEvent(wager)) => {
            tracing::error!(wager = %wager, "Registration event reached the normalizer");
            return Ok(());
        }
    };
    counter!("events_normalized_total").increment(1);

    let event = &normalized.event;
    match wager_repo::apply(pool, event).await {
        Ok(outcome) => {
            match outcome {
                ApplyOutcome::Inserted | ApplyOutcome::Updated => {
                    counter!("events_applied_total").increment(1);
                    tracing::info!(
                        wager = %event.contract,
                        kind = event.kind.name(),
                        version = %event.version,
                        "Applied wager event"
                    );
                }
                ApplyOutcome::Duplicate => {
                    counter!("events_duplicate_total").increment(1);
                    tracing::debug!(
                        wager = %event.contract,
                        coordinate = %event.coordinate,
                        "Duplicate delivery, no-op"
                    );
                }
            }

            // The record exists now but its deadline is best-effort; queue
            // the authoritative read.
            if normalized.deadline_backfill_needed && outcome == ApplyOutcome::Inserted {
                counter!("events_parked_total").increment(1);
                parked_repo::park_deadline_backfill(
                    pool,
                    event.contract,
                    "judge deadline read exhausted",
                )
                .await?;
            }
        }
        Err(ApplyError::MissingPredecessor { ref address, kind }) => {
            counter!("events_parked_total").increment(1);
            tracing::warn!(
                wager = %address,
                kind,
                coordinate = %event.coordinate,
                "Out-of-order event, parking for retry"
            );
            parked_repo::park_apply(pool, event, "missing causal predecessor").await?;
        }
        Err(ApplyError::TerminalConflict { ref address, kind }) => {
            counter!("terminal_conflicts_total").increment(1);
            tracing::error!(
                wager = %address,
                kind,
                coordinate = %event.coordinate,
                "Event conflicts with recorded terminal outcome, skipping"
            );
        }
        Err(ApplyError::Db(e)) => {
            // The poller's cursor has already moved past this block; parking
            // is the only way the event survives a transient database fault.
            counter!("events_parked_total").increment(1);
            tracing::error!(
                wager = %event.contract,
                coordinate = %event.coordinate,
                error = %e,
                "Database error applying event, parking for retry"
            );
            parked_repo::park_apply(pool, event, "database error").await?;
        }
    }

    histogram!("apply_latency_seconds").record(start.elapsed().as_secs_f64());
    Ok(())
}
