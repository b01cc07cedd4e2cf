use chrono::{DateTime, Utc};

use crate::models::{Phase, Wager};

/// Derive the externally visible lifecycle phase of a wager record at `now`.
///
/// Pure and clock-injected: several transitions (expired Pending, Active into
/// Judging) are time-driven with no corresponding event, so this must be
/// re-evaluated on every read and never persisted or cached.
///
/// The expired-unaccepted branch is a read-side approximation: on chain the
/// wager stays Pending until someone calls cancel, but no acceptance can ever
/// arrive past `accept_by`, so readers are shown Cancelled.
pub fn derive_phase(wager: &Wager, now: DateTime<Utc>) -> Phase {
    if wager.cancelled_at.is_some() {
        return Phase::Cancelled;
    }
    if wager.winner.is_some() {
        return Phase::Resolved;
    }
    if wager.accepted_at.is_some() {
        if now > wager.outcome_by {
            Phase::Judging
        } else {
            Phase::Active
        }
    } else if now > wager.accept_by {
        Phase::Cancelled
    } else {
        Phase::Pending
    }
}
