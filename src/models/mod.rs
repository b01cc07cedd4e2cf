pub mod event;
pub mod wager;

pub use event::{CanonicalEvent, CanonicalKind, LogCoordinate, RawWagerEvent};
pub use wager::{Wager, WatchedWager};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SchemaVersion
// ---------------------------------------------------------------------------

/// Contract schema generation. The two generations disagree on what the
/// judge deadline means and how it is obtained, so the tag travels with
/// every record and every canonical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Single deadline field covering both the outcome and the judge ruling.
    V1,
    /// Outcome deadline on the event; judging closes a fixed window later.
    V2,
}

impl SchemaVersion {
    pub fn as_u8(self) -> u8 {
        match self {
            SchemaVersion::V1 => 1,
            SchemaVersion::V2 => 2,
        }
    }

    pub fn as_i64(self) -> i64 {
        self.as_u8() as i64
    }
}

impl TryFrom<u8> for SchemaVersion {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        match tag {
            1 => Ok(SchemaVersion::V1),
            2 => Ok(SchemaVersion::V2),
            other => Err(other),
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Read-side lifecycle status, derived from a wager record and a reference
/// clock. Distinct from the contract's own state enum: `Judging` and the
/// expired-unaccepted flavour of `Cancelled` are purely time-driven and have
/// no corresponding event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Active,
    Judging,
    Resolved,
    Cancelled,
}

impl Phase {
    pub fn from_query_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Phase::Pending),
            "active" => Some(Phase::Active),
            "judging" => Some(Phase::Judging),
            "resolved" => Some(Phase::Resolved),
            "cancelled" => Some(Phase::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pending => write!(f, "pending"),
            Phase::Active => write!(f, "active"),
            Phase::Judging => write!(f, "judging"),
            Phase::Resolved => write!(f, "resolved"),
            Phase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Canonical lowercase hex form used as the database key for an address.
pub fn addr_key(address: Address) -> String {
    format!("{address:#x}")
}
