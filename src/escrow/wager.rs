use alloy::primitives::{Address, U256};
use std::fmt;

use crate::models::{LogCoordinate, RawWagerEvent, SchemaVersion};

/// Fixed judging window v2 contracts append to the outcome deadline.
/// Constant across all v2 instances; v1 has no equivalent.
pub const JUDGING_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// Errors surfaced verbatim to the caller of a contract operation. Every
/// failed call leaves the wager untouched and moves no escrowed funds.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EscrowError {
    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),

    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(&'static str),

    #[error("invalid status: {action} requires {required}, wager is {actual}")]
    InvalidStatus {
        action: &'static str,
        required: &'static str,
        actual: WagerState,
    },

    #[error("unauthorized: caller is not the {0}")]
    Unauthorized(&'static str),

    #[error("deployment failed: wager already exists at {0}")]
    FailedDeployment(Address),
}

/// The contract's internal state enum. `Judging` is never stored — it is the
/// time-derived face of `Active` once the outcome deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WagerState {
    Pending,
    Active,
    Judging,
    Resolved,
    Cancelled,
}

impl fmt::Display for WagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerState::Pending => write!(f, "Pending"),
            WagerState::Active => write!(f, "Active"),
            WagerState::Judging => write!(f, "Judging"),
            WagerState::Resolved => write!(f, "Resolved"),
            WagerState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Creation parameters. `deadline` is the single deadline field of the call:
/// under v1 rules it is the judge deadline, under v2 rules it is the outcome
/// deadline and the judge deadline is derived from the contract constant.
#[derive(Debug, Clone)]
pub struct CreateParams {
    pub maker: Address,
    pub taker: Address,
    pub judge: Address,
    pub asset: Address,
    pub maker_stake: U256,
    pub taker_stake: U256,
    pub accept_by: u64,
    pub deadline: u64,
    pub description: String,
}

/// A transfer out of escrow, produced by the terminal operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub to: Address,
    pub amount: U256,
}

/// One wager's authoritative lifecycle. Calls are atomic: they either fully
/// apply or return an error with no effect, mirroring transaction semantics
/// of the execution environment.
#[derive(Debug, Clone)]
pub struct EscrowWager {
    pub address: Address,
    pub version: SchemaVersion,
    pub description: String,
    pub maker: Address,
    pub taker: Address,
    pub judge: Address,
    pub asset: Address,
    pub maker_stake: U256,
    pub taker_stake: U256,
    pub accept_by: u64,
    pub outcome_by: u64,
    pub judge_deadline: u64,
    pub created_at: u64,
    state: WagerState,
    escrowed: U256,
    accepted_at: Option<u64>,
    resolved_at: Option<u64>,
    cancelled_at: Option<u64>,
    winner: Option<Address>,
}

impl EscrowWager {
    /// Deploy a wager under the given schema version. The maker's stake is
    /// locked immediately on success.
    pub fn create(
        address: Address,
        version: SchemaVersion,
        params: CreateParams,
        now: u64,
    ) -> Result<Self, EscrowError> {
        if params.maker == Address::ZERO {
            return Err(EscrowError::InvalidAddress("maker"));
        }
        if params.taker == Address::ZERO {
            return Err(EscrowError::InvalidAddress("taker"));
        }
        if params.judge == Address::ZERO {
            return Err(EscrowError::InvalidAddress("judge"));
        }
        if params.asset == Address::ZERO {
            return Err(EscrowError::InvalidAddress("asset"));
        }
        if params.maker_stake.is_zero() {
            return Err(EscrowError::InvalidAmount("maker stake is zero"));
        }
        if params.taker_stake.is_zero() {
            return Err(EscrowError::InvalidAmount("taker stake is zero"));
        }
        if params.accept_by <= now {
            return Err(EscrowError::InvalidTimestamp("accept_by is not in the future"));
        }

        let (outcome_by, judge_deadline) = match version {
            SchemaVersion::V1 => (params.deadline, params.deadline),
            SchemaVersion::V2 => (params.deadline, params.deadline + JUDGING_WINDOW_SECS),
        };
        if params.accept_by >= outcome_by {
            return Err(EscrowError::InvalidTimestamp(
                "accept_by is not before the outcome deadline",
            ));
        }

        let maker_stake = params.maker_stake;
        Ok(Self {
            address,
            version,
            description: params.description,
            maker: params.maker,
            taker: params.taker,
            judge: params.judge,
            asset: params.asset,
            maker_stake,
            taker_stake: params.taker_stake,
            accept_by: params.accept_by,
            outcome_by,
            judge_deadline,
            created_at: now,
            state: WagerState::Pending,
            escrowed: maker_stake,
            accepted_at: None,
            resolved_at: None,
            cancelled_at: None,
            winner: None,
        })
    }

    /// Taker locks their stake before the accept deadline.
    pub fn accept(&mut self, caller: Address, now: u64) -> Result<(), EscrowError> {
        if self.state != WagerState::Pending {
            return Err(EscrowError::InvalidStatus {
                action: "accept",
                required: "Pending",
                actual: self.state,
            });
        }
        if caller != self.taker {
            return Err(EscrowError::Unauthorized("taker"));
        }
        if now > self.accept_by {
            return Err(EscrowError::InvalidTimestamp("accept deadline has passed"));
        }

        self.escrowed += self.taker_stake;
        self.accepted_at = Some(now);
        self.state = WagerState::Active;
        Ok(())
    }

    /// Judge declares the winner; both stakes pay out to them.
    pub fn resolve(
        &mut self,
        caller: Address,
        winner: Address,
        now: u64,
    ) -> Result<Vec<Payout>, EscrowError> {
        if self.state != WagerState::Active {
            return Err(EscrowError::InvalidStatus {
                action: "resolve",
                required: "Active or Judging",
                actual: self.state,
            });
        }
        if caller != self.judge {
            return Err(EscrowError::Unauthorized("judge"));
        }
        if winner != self.maker && winner != self.taker {
            return Err(EscrowError::InvalidAddress("winner"));
        }

        let payout = Payout {
            to: winner,
            amount: self.escrowed,
        };
        self.escrowed = U256::ZERO;
        self.winner = Some(winner);
        self.resolved_at = Some(now);
        self.state = WagerState::Resolved;
        Ok(vec![payout])
    }

    /// Cancel the wager.
    ///
    /// While Pending: the maker may cancel at will, and once `accept_by` has
    /// passed without acceptance anyone may; the maker's stake is refunded.
    ///
    /// While Active: callable by anyone only after the judge deadline has
    /// lapsed without a ruling, in which case the pot is split evenly between
    /// maker and taker (an odd base unit stays with the maker). This fallback
    /// is an explicit policy here; the split replaces a maker-only refund.
    pub fn cancel(&mut self, caller: Address, now: u64) -> Result<Vec<Payout>, EscrowError> {
        match self.state {
            WagerState::Pending => {
                if caller != self.maker && now <= self.accept_by {
                    return Err(EscrowError::Unauthorized("maker"));
                }
                let payout = Payout {
                    to: self.maker,
                    amount: self.escrowed,
                };
                self.escrowed = U256::ZERO;
                self.cancelled_at = Some(now);
                self.state = WagerState::Cancelled;
                Ok(vec![payout])
            }
            WagerState::Active => {
                if now <= self.judge_deadline {
                    return Err(EscrowError::InvalidTimestamp(
                        "judge deadline has not lapsed",
                    ));
                }
                let taker_share = self.escrowed / U256::from(2);
                let maker_share = self.escrowed - taker_share;
                self.escrowed = U256::ZERO;
                self.cancelled_at = Some(now);
                self.state = WagerState::Cancelled;
                Ok(vec![
                    Payout {
                        to: self.maker,
                        amount: maker_share,
                    },
                    Payout {
                        to: self.taker,
                        amount: taker_share,
                    },
                ])
            }
            other => Err(EscrowError::InvalidStatus {
                action: "cancel",
                required: "Pending or Active",
                actual: other,
            }),
        }
    }

    pub fn state(&self) -> WagerState {
        self.state
    }

    /// State as an external observer sees it at `now`: an accepted wager past
    /// its outcome deadline reads as Judging even though nothing on chain
    /// moved.
    pub fn state_at(&self, now: u64) -> WagerState {
        match self.state {
            WagerState::Active if now > self.outcome_by => WagerState::Judging,
            s => s,
        }
    }

    /// Funds currently held by this contract instance.
    pub fn escrowed(&self) -> U256 {
        self.escrowed
    }

    pub fn accepted_at(&self) -> Option<u64> {
        self.accepted_at
    }

    pub fn resolved_at(&self) -> Option<u64> {
        self.resolved_at
    }

    pub fn cancelled_at(&self) -> Option<u64> {
        self.cancelled_at
    }

    pub fn winner(&self) -> Option<Address> {
        self.winner
    }

    // -- event shapes -------------------------------------------------------

    /// The creation event in the wire shape of this wager's schema version.
    /// v2 deliberately omits the judge deadline; indexers must read or
    /// recompute it.
    pub fn created_event(&self, coordinate: LogCoordinate) -> RawWagerEvent {
        match self.version {
            SchemaVersion::V1 => RawWagerEvent::CreatedV1 {
                coordinate,
                wager: self.address,
                maker: self.maker,
                taker: self.taker,
                judge: self.judge,
                asset: self.asset,
                maker_stake: self.maker_stake,
                taker_stake: self.taker_stake,
                accept_by: self.accept_by,
                judge_deadline: self.judge_deadline,
                description: self.description.clone(),
                block_time: self.created_at,
            },
            SchemaVersion::V2 => RawWagerEvent::CreatedV2 {
                coordinate,
                wager: self.address,
                maker: self.maker,
                taker: self.taker,
                judge: self.judge,
                asset: self.asset,
                maker_stake: self.maker_stake,
                taker_stake: self.taker_stake,
                accept_by: self.accept_by,
                outcome_by: self.outcome_by,
                description: self.description.clone(),
                block_time: self.created_at,
            },
        }
    }

    pub fn accepted_event(&self, coordinate: LogCoordinate) -> Option<RawWagerEvent> {
        self.accepted_at.map(|at| RawWagerEvent::Accepted {
            coordinate,
            wager: self.address,
            taker: self.taker,
            schema_tag: self.version.as_u8(),
            block_time: at,
        })
    }

    pub fn resolved_event(&self, coordinate: LogCoordinate) -> Option<RawWagerEvent> {
        match (self.resolved_at, self.winner) {
            (Some(at), Some(winner)) => Some(RawWagerEvent::Resolved {
                coordinate,
                wager: self.address,
                winner,
                schema_tag: self.version.as_u8(),
                block_time: at,
            }),
            _ => None,
        }
    }

    pub fn cancelled_event(&self, coordinate: LogCoordinate) -> Option<RawWagerEvent> {
        self.cancelled_at.map(|at| RawWagerEvent::Cancelled {
            coordinate,
            wager: self.address,
            schema_tag: self.version.as_u8(),
            block_time: at,
        })
    }
}
