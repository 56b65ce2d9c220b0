//! Tapcoin Engine - the reward-consistency core: ledger, daily windows,
//! streaks, referrals, tasks, deferred verification and mini-games

pub mod account;
pub mod deferred;
pub mod games;
pub mod ledger;
pub mod referral;
pub mod streak;
pub mod task;
pub mod window;

pub use deferred::DeferredWorkerHandle;

/// How many times optimistic per-user writes are retried before giving
/// up with `ConcurrentUpdate`
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;

#[cfg(test)]
pub(crate) mod testutil;
