use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SchemaVersion;

// ---------------------------------------------------------------------------
// LogCoordinate — the idempotency key
// ---------------------------------------------------------------------------

/// Unique origin of an on-chain log entry. The event source may redeliver
/// the same log after a reorg or at-least-once delivery; the coordinate is
/// what makes reapplication a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCoordinate {
    pub tx_hash: String,
    pub log_index: u64,
}

impl LogCoordinate {
    pub fn new(tx_hash: impl Into<String>, log_index: u64) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            log_index,
        }
    }

    /// Stable string id used as the applied-events primary key.
    pub fn id(&self) -> String {
        format!("{}:{}", self.tx_hash, self.log_index)
    }
}

impl fmt::Display for LogCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.log_index)
    }
}

// ---------------------------------------------------------------------------
// RawWagerEvent — version-specific shapes as decoded off the chain
// ---------------------------------------------------------------------------

/// Events exactly as the two contract generations emit them, before
/// normalization. `Deployed` is the factory's registration message; the rest
/// are emitted by the wager contracts themselves. `schema_tag` on the
/// post-creation events comes from the watched-set registration and is
/// validated during normalization.
#[derive(Debug, Clone)]
pub enum RawWagerEvent {
    Deployed {
        coordinate: LogCoordinate,
        wager: Address,
        schema_tag: u8,
        block_time: u64,
    },
    CreatedV1 {
        coordinate: LogCoordinate,
        wager: Address,
        maker: Address,
        taker: Address,
        judge: Address,
        asset: Address,
        maker_stake: U256,
        taker_stake: U256,
        accept_by: u64,
        judge_deadline: u64,
        description: String,
        block_time: u64,
    },
    CreatedV2 {
        coordinate: LogCoordinate,
        wager: Address,
        maker: Address,
        taker: Address,
        judge: Address,
        asset: Address,
        maker_stake: U256,
        taker_stake: U256,
        accept_by: u64,
        outcome_by: u64,
        description: String,
        block_time: u64,
    },
    Accepted {
        coordinate: LogCoordinate,
        wager: Address,
        taker: Address,
        schema_tag: u8,
        block_time: u64,
    },
    Resolved {
        coordinate: LogCoordinate,
        wager: Address,
        winner: Address,
        schema_tag: u8,
        block_time: u64,
    },
    Cancelled {
        coordinate: LogCoordinate,
        wager: Address,
        schema_tag: u8,
        block_time: u64,
    },
}

impl RawWagerEvent {
    pub fn coordinate(&self) -> &LogCoordinate {
        match self {
            RawWagerEvent::Deployed { coordinate, .. }
            | RawWagerEvent::CreatedV1 { coordinate, .. }
            | RawWagerEvent::CreatedV2 { coordinate, .. }
            | RawWagerEvent::Accepted { coordinate, .. }
            | RawWagerEvent::Resolved { coordinate, .. }
            | RawWagerEvent::Cancelled { coordinate, .. } => coordinate,
        }
    }

    /// The wager contract the event concerns. For `Deployed` this is the
    /// child contract being announced, not the factory.
    pub fn contract(&self) -> Address {
        match self {
            RawWagerEvent::Deployed { wager, .. }
            | RawWagerEvent::CreatedV1 { wager, .. }
            | RawWagerEvent::CreatedV2 { wager, .. }
            | RawWagerEvent::Accepted { wager, .. }
            | RawWagerEvent::Resolved { wager, .. }
            | RawWagerEvent::Cancelled { wager, .. } => *wager,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RawWagerEvent::Deployed { .. } => "deployed",
            RawWagerEvent::CreatedV1 { .. } => "created_v1",
            RawWagerEvent::CreatedV2 { .. } => "created_v2",
            RawWagerEvent::Accepted { .. } => "accepted",
            RawWagerEvent::Resolved { .. } => "resolved",
            RawWagerEvent::Cancelled { .. } => "cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// CanonicalEvent — the one shape the store applies
// ---------------------------------------------------------------------------

/// Normalized, version-tagged event. Serializable so parked events can be
/// stored verbatim and retried later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub coordinate: LogCoordinate,
    pub contract: Address,
    pub version: SchemaVersion,
    pub block_time: DateTime<Utc>,
    pub kind: CanonicalKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CanonicalKind {
    Created {
        description: String,
        maker: Address,
        taker: Address,
        judge: Address,
        asset: Address,
        maker_stake: U256,
        taker_stake: U256,
        accept_by: DateTime<Utc>,
        outcome_by: DateTime<Utc>,
        /// `None` only transiently: a v2 creation whose point read was
        /// exhausted carries a best-effort recomputed value instead, so in
        /// practice this is always populated by the normalizer.
        judge_deadline: Option<DateTime<Utc>>,
    },
    Accepted,
    Resolved {
        winner: Address,
    },
    Cancelled,
}

impl CanonicalKind {
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalKind::Created { .. } => "created",
            CanonicalKind::Accepted => "accepted",
            CanonicalKind::Resolved { .. } => "resolved",
            CanonicalKind::Cancelled => "cancelled",
        }
    }
}

/// Convert epoch seconds from chain data into a wall-clock timestamp.
/// Out-of-range values clamp to the epoch rather than failing the event.
pub fn timestamp_from_secs(secs: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or_default()
}
