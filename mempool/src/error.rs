//! Transactions pool error types

use halflife_core::{ChainError, LedgerError, RegistryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("unable to unmarshal transaction request: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("unable to marshal transactions: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("the blockchain is empty")]
    EmptyBlockchain,

    #[error("transaction timestamp is too far in the future: transaction timestamp {timestamp}, limit {limit}")]
    TooFarInTheFuture { timestamp: i64, limit: i64 },

    #[error("transaction timestamp is too old: transaction timestamp {timestamp}, limit {limit}")]
    TooOld { timestamp: i64, limit: i64 },

    #[error("transaction is already in the transactions pool: {0}")]
    AlreadyInPool(String),

    #[error("transaction is invalid: {0}")]
    InvalidTransaction(#[from] LedgerError),

    #[error("a yielding output is sent to an unregistered address: {0}")]
    UnregisteredYieldingAddress(String),

    #[error("unable to check registered addresses: {0}")]
    Registry(#[from] RegistryError),

    #[error("unable to create block, a block with the same timestamp is already in the blockchain")]
    BlockAlreadyExists,

    #[error("unable to create block, a more recent block is already in the blockchain")]
    OutdatedTimestamp,

    #[error("unable to create block, a block is missing in the blockchain")]
    MissingBlock,

    #[error("unable to create reward transaction: {0}")]
    Reward(#[source] LedgerError),

    #[error("unable to replay the last block: {0}")]
    Replay(#[source] LedgerError),

    #[error("unable to add block: {0}")]
    Chain(#[from] ChainError),
}
