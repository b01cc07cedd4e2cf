pub mod factory;
pub mod wager;

pub use factory::WagerFactory;
pub use wager::{CreateParams, EscrowError, EscrowWager, Payout, WagerState, JUDGING_WINDOW_SECS};
