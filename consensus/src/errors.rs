//! Consensus error types
//!
//! A [`VerificationError`] only ever drops one neighbor's candidate chain for
//! the current reconciliation round, it never reaches the tick boundary.

use halflife_core::{LedgerError, NeighborError, RegistryError};
use thiserror::Error;

/// Reasons a neighbor's candidate chain is rejected
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("neighbor's response timeout")]
    Timeout,

    #[error("failed to get neighbor's blockchain: {0}")]
    Fetch(#[from] NeighborError),

    #[error("failed to unmarshal neighbor's blockchain: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("neighbor's blockchain is too short")]
    TooShort,

    #[error("neighbor's blockchain is a fork")]
    Fork,

    #[error("failed to calculate block hash: {0}")]
    Hash(#[source] LedgerError),

    #[error("a previous neighbor block hash is invalid: block height {height}")]
    InvalidPreviousHash { height: usize },

    #[error("neighbor block timestamp is invalid: block timestamp {timestamp}, expected {expected}")]
    InvalidBlockTimestamp { timestamp: i64, expected: i64 },

    #[error("neighbor block timestamp is in the future: block timestamp {timestamp}, now {now}")]
    BlockInTheFuture { timestamp: i64, now: i64 },

    #[error("multiple rewards attempt for the same neighbor block: block height {height}")]
    MultipleRewards { height: usize },

    #[error("neighbor block has not been rewarded: block height {height}")]
    MissingReward { height: usize },

    #[error("a neighbor block transaction timestamp is too far in the future: transaction timestamp {timestamp}, id {id}")]
    TransactionTooNew { id: String, timestamp: i64 },

    #[error("a neighbor block transaction timestamp is too old: transaction timestamp {timestamp}, id {id}")]
    TransactionTooOld { id: String, timestamp: i64 },

    #[error("neighbor transaction is invalid: {0}")]
    InvalidTransaction(#[from] LedgerError),

    #[error("a neighbor block transaction yielding output address is not registered: {0}")]
    UnregisteredYieldingAddress(String),

    #[error("neighbor block reward exceeds the consented one: reward {reward}, fees {fees}")]
    RewardExceedsFees { reward: u64, fees: u64 },

    #[error("failed to verify registered addresses: {0}")]
    Registry(#[from] RegistryError),
}
