use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SchemaVersion;

/// Database row for the wagers projection — one row per deployed contract,
/// keyed by the contract's own address. Stake amounts are decimal strings of
/// integer base units; display-scale conversion happens only at the query
/// boundary. Nullable timestamps are each set at most once and never unset.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wager {
    pub address: String,
    pub schema_version: i64,
    pub description: String,
    pub maker: String,
    pub taker: String,
    pub judge: String,
    pub asset: String,
    pub maker_stake: String,
    pub taker_stake: String,
    pub accept_by: DateTime<Utc>,
    pub outcome_by: DateTime<Utc>,
    pub judge_deadline: Option<DateTime<Utc>>,
    pub winner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Wager {
    pub fn version(&self) -> Option<SchemaVersion> {
        u8::try_from(self.schema_version)
            .ok()
            .and_then(|tag| SchemaVersion::try_from(tag).ok())
    }
}

/// Row for the dynamic discovery set populated from factory announcements.
#[derive(Debug, Clone, FromRow)]
pub struct WatchedWager {
    pub address: String,
    pub schema_version: i64,
    pub registered_at: DateTime<Utc>,
}
