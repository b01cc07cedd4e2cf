pub mod chain_poller;
pub mod identity;
pub mod parked_retry;
