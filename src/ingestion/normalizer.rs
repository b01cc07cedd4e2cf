use alloy::primitives::Address;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tokio::time::sleep;

use crate::models::event::timestamp_from_secs;
use crate::models::{CanonicalEvent, CanonicalKind, RawWagerEvent, SchemaVersion};

/// Point read against a deployed wager contract's own state. Needed for v2
/// creations, whose event payload omits the judge deadline.
pub trait DeadlineReader: Send + Sync {
    fn read_judge_deadline(
        &self,
        wager: Address,
    ) -> impl Future<Output = anyhow::Result<DateTime<Utc>>> + Send;
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Fixed v2 judging window, used to recompute a best-effort judge
    /// deadline when the point read is exhausted.
    pub judging_window_secs: u64,
    /// Retry budget for the v2 deadline point read.
    pub deadline_read_attempts: u32,
    /// Base delay for the read's exponential backoff.
    pub deadline_read_base_delay: std::time::Duration,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            judging_window_secs: crate::escrow::JUDGING_WINDOW_SECS,
            deadline_read_attempts: 3,
            deadline_read_base_delay: std::time::Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// Future/unknown schema tag: rejected outright rather than guessed at.
    #[error("unknown schema version tag {0}")]
    UnknownSchema(u8),

    /// Factory registration messages have no canonical wager form; they are
    /// handled by the pipeline before normalization.
    #[error("registration event for {0} has no canonical form")]
    NotAWagerEvent(Address),
}

/// A canonical event plus whether its judge deadline still needs an
/// authoritative backfill read.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub event: CanonicalEvent,
    pub deadline_backfill_needed: bool,
}

/// Map a raw, version-specific event into the canonical shape.
///
/// v1 creations fold a single deadline into both canonical fields. v2
/// creations trigger the deadline point read, retried with bounded backoff;
/// if the budget is exhausted the event still normalizes with
/// `outcome_by + judging window` so the wager stays queryable, and the caller
/// is told to park a backfill.
pub async fn normalize<R: DeadlineReader>(
    raw: &RawWagerEvent,
    reader: &R,
    config: &NormalizerConfig,
) -> Result<Normalized, NormalizeError> {
    match raw {
        RawWagerEvent::Deployed { wager, .. } => Err(NormalizeError::NotAWagerEvent(*wager)),

        RawWagerEvent::CreatedV1 {
            coordinate,
            wager,
            maker,
            taker,
            judge,
            asset,
            maker_stake,
            taker_stake,
            accept_by,
            judge_deadline,
            description,
            block_time,
        } => Ok(Normalized {
            event: CanonicalEvent {
                coordinate: coordinate.clone(),
                contract: *wager,
                version: SchemaVersion::V1,
                block_time: timestamp_from_secs(*block_time),
                kind: CanonicalKind::Created {
                    description: description.clone(),
                    maker: *maker,
                    taker: *taker,
                    judge: *judge,
                    asset: *asset,
                    maker_stake: *maker_stake,
                    taker_stake: *taker_stake,
                    accept_by: timestamp_from_secs(*accept_by),
                    // v1 has no outcome-vs-judging split
                    outcome_by: timestamp_from_secs(*judge_deadline),
                    judge_deadline: Some(timestamp_from_secs(*judge_deadline)),
                },
            },
            deadline_backfill_needed: false,
        }),

        RawWagerEvent::CreatedV2 {
            coordinate,
            wager,
            maker,
            taker,
            judge,
            asset,
            maker_stake,
            taker_stake,
            accept_by,
            outcome_by,
            description,
            block_time,
        } => {
            let outcome_by_ts = timestamp_from_secs(*outcome_by);
            let (judge_deadline, backfill) = match read_deadline(reader, *wager, config).await {
                Some(deadline) => (deadline, false),
                None => {
                    // Best-effort recompute from the configured window; the
                    // authoritative read is parked for re-attempt.
                    let fallback =
                        outcome_by_ts + Duration::seconds(config.judging_window_secs as i64);
                    (fallback, true)
                }
            };

            Ok(Normalized {
                event: CanonicalEvent {
                    coordinate: coordinate.clone(),
                    contract: *wager,
                    version: SchemaVersion::V2,
                    block_time: timestamp_from_secs(*block_time),
                    kind: CanonicalKind::Created {
                        description: description.clone(),
                        maker: *maker,
                        taker: *taker,
                        judge: *judge,
                        asset: *asset,
                        maker_stake: *maker_stake,
                        taker_stake: *taker_stake,
                        accept_by: timestamp_from_secs(*accept_by),
                        outcome_by: outcome_by_ts,
                        judge_deadline: Some(judge_deadline),
                    },
                },
                deadline_backfill_needed: backfill,
            })
        }

        RawWagerEvent::Accepted {
            coordinate,
            wager,
            schema_tag,
            block_time,
            ..
        } => Ok(Normalized {
            event: CanonicalEvent {
                coordinate: coordinate.clone(),
                contract: *wager,
                version: parse_tag(*schema_tag)?,
                block_time: timestamp_from_secs(*block_time),
                kind: CanonicalKind::Accepted,
            },
            deadline_backfill_needed: false,
        }),

        RawWagerEvent::Resolved {
            coordinate,
            wager,
            winner,
            schema_tag,
            block_time,
        } => Ok(Normalized {
            event: CanonicalEvent {
                coordinate: coordinate.clone(),
                contract: *wager,
                version: parse_tag(*schema_tag)?,
                block_time: timestamp_from_secs(*block_time),
                kind: CanonicalKind::Resolved { winner: *winner },
            },
            deadline_backfill_needed: false,
        }),

        RawWagerEvent::Cancelled {
            coordinate,
            wager,
            schema_tag,
            block_time,
        } => Ok(Normalized {
            event: CanonicalEvent {
                coordinate: coordinate.clone(),
                contract: *wager,
                version: parse_tag(*schema_tag)?,
                block_time: timestamp_from_secs(*block_time),
                kind: CanonicalKind::Cancelled,
            },
            deadline_backfill_needed: false,
        }),
    }
}

fn parse_tag(tag: u8) -> Result<SchemaVersion, NormalizeError> {
    SchemaVersion::try_from(tag).map_err(NormalizeError::UnknownSchema)
}

/// The bounded, retried point read. Suspends only the event being normalized;
/// unrelated wagers keep processing on their own tasks.
async fn read_deadline<R: DeadlineReader>(
    reader: &R,
    wager: Address,
    config: &NormalizerConfig,
) -> Option<DateTime<Utc>> {
    for attempt in 0..config.deadline_read_attempts {
        match reader.read_judge_deadline(wager).await {
            Ok(deadline) => return Some(deadline),
            Err(e) => {
                tracing::warn!(
                    wager = %wager,
                    attempt,
                    error = %e,
                    "Judge deadline read failed"
                );
                if attempt + 1 < config.deadline_read_attempts {
                    let delay = config.deadline_read_base_delay * 2u32.saturating_pow(attempt);
                    sleep(delay).await;
                }
            }
        }
    }

    metrics::counter!("deadline_reads_exhausted_total").increment(1);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogCoordinate;
    use alloy::primitives::U256;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedReader(DateTime<Utc>);

    impl DeadlineReader for FixedReader {
        async fn read_judge_deadline(&self, _wager: Address) -> anyhow::Result<DateTime<Utc>> {
            Ok(self.0)
        }
    }

    struct FailingReader {
        calls: AtomicU32,
    }

    impl DeadlineReader for FailingReader {
        async fn read_judge_deadline(&self, _wager: Address) -> anyhow::Result<DateTime<Utc>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("rpc unavailable")
        }
    }

    fn fast_config() -> NormalizerConfig {
        NormalizerConfig {
            judging_window_secs: 3600,
            deadline_read_attempts: 2,
            deadline_read_base_delay: std::time::Duration::from_millis(1),
        }
    }

    fn v2_created(wager: Address) -> RawWagerEvent {
        RawWagerEvent::CreatedV2 {
            coordinate: LogCoordinate::new("0xabc", 0),
            wager,
            maker: Address::repeat_byte(1),
            taker: Address::repeat_byte(2),
            judge: Address::repeat_byte(3),
            asset: Address::repeat_byte(4),
            maker_stake: U256::from(100u64),
            taker_stake: U256::from(100u64),
            accept_by: 1_000,
            outcome_by: 10_000,
            description: "bet".into(),
            block_time: 500,
        }
    }

    #[tokio::test]
    async fn v1_created_folds_the_single_deadline() {
        let raw = RawWagerEvent::CreatedV1 {
            coordinate: LogCoordinate::new("0xabc", 0),
            wager: Address::repeat_byte(9),
            maker: Address::repeat_byte(1),
            taker: Address::repeat_byte(2),
            judge: Address::repeat_byte(3),
            asset: Address::repeat_byte(4),
            maker_stake: U256::from(100u64),
            taker_stake: U256::from(100u64),
            accept_by: 1_000,
            judge_deadline: 10_000,
            description: "bet".into(),
            block_time: 500,
        };

        let reader = FailingReader { calls: AtomicU32::new(0) };
        let normalized = normalize(&raw, &reader, &fast_config()).await.unwrap();

        assert_eq!(normalized.event.version, SchemaVersion::V1);
        assert!(!normalized.deadline_backfill_needed);
        // v1 never touches the reader
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
        match normalized.event.kind {
            CanonicalKind::Created { outcome_by, judge_deadline, .. } => {
                assert_eq!(outcome_by, timestamp_from_secs(10_000));
                assert_eq!(judge_deadline, Some(timestamp_from_secs(10_000)));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[tokio::test]
    async fn v2_created_reads_the_judge_deadline() {
        let deadline = timestamp_from_secs(99_999);
        let reader = FixedReader(deadline);

        let normalized = normalize(&v2_created(Address::repeat_byte(9)), &reader, &fast_config())
            .await
            .unwrap();

        assert_eq!(normalized.event.version, SchemaVersion::V2);
        assert!(!normalized.deadline_backfill_needed);
        match normalized.event.kind {
            CanonicalKind::Created { judge_deadline, .. } => {
                assert_eq!(judge_deadline, Some(deadline));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_read_recomputes_and_requests_backfill() {
        let reader = FailingReader { calls: AtomicU32::new(0) };
        let config = fast_config();

        let normalized = normalize(&v2_created(Address::repeat_byte(9)), &reader, &config)
            .await
            .unwrap();

        assert_eq!(reader.calls.load(Ordering::SeqCst), config.deadline_read_attempts);
        assert!(normalized.deadline_backfill_needed);
        match normalized.event.kind {
            CanonicalKind::Created { judge_deadline, .. } => {
                assert_eq!(
                    judge_deadline,
                    Some(timestamp_from_secs(10_000 + 3_600))
                );
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_schema_tag_is_fatal() {
        let raw = RawWagerEvent::Accepted {
            coordinate: LogCoordinate::new("0xabc", 1),
            wager: Address::repeat_byte(9),
            taker: Address::repeat_byte(2),
            schema_tag: 7,
            block_time: 500,
        };
        let reader = FixedReader(timestamp_from_secs(0));

        match normalize(&raw, &reader, &fast_config()).await {
            Err(NormalizeError::UnknownSchema(7)) => {}
            other => panic!("expected UnknownSchema, got {other:?}"),
        }
    }
}
