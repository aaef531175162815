//! Error types shared by the ledger, the registry and the chain seams

use halflife_crypto::CryptoError;
use thiserror::Error;

/// Transaction, UTXO and fee failures
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    Crypto(#[from] CryptoError),

    #[error("transaction id is invalid: expected {expected}, got {actual}")]
    InvalidTransactionId { expected: String, actual: String },

    #[error("multiple rewards attempt")]
    MultipleRewards,

    #[error("transaction has no output")]
    NoOutput,

    #[error("too many outputs in transaction {0}")]
    TooManyOutputs(String),

    #[error("transaction {0} has already been applied")]
    DuplicateTransaction(String),

    #[error("no UTXO found for transaction id {0}")]
    UnknownTransaction(String),

    #[error("no UTXO found at output index {output_index} of transaction {transaction_id}")]
    UnknownOutput {
        transaction_id: String,
        output_index: u16,
    },

    #[error("input public key does not own the UTXO: UTXO address {utxo_address}, input address {input_address}")]
    AddressMismatch {
        utxo_address: String,
        input_address: String,
    },

    #[error("fee is negative")]
    NegativeFee,

    #[error("fee is too low: fee {fee}, minimal fee {minimal}")]
    FeeTooLow { fee: u64, minimal: u64 },

    #[error("income requested for several UTXOs for address {0}")]
    MultipleIncomes(String),

    #[error("value overflow")]
    Overflow,
}

/// Proof-of-humanity lookups and registered-address consistency
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("failed to query the humanity registry: {0}")]
    Unavailable(String),

    #[error("an added address is not registered")]
    AddedNotRegistered(String),

    #[error("a removed address is registered")]
    RemovedIsRegistered(String),
}

/// Peer RPC failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NeighborError {
    #[error("neighbor {0} is unreachable")]
    Unreachable(String),

    #[error("request to neighbor {target} failed: {message}")]
    Request { target: String, message: String },
}

/// Protocol settings loading failures
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("unable to open file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to unmarshal: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Block append failures
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("ledger update failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("registered addresses refresh failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("block is outdated: block timestamp {timestamp}, last block timestamp {last}")]
    OutdatedBlock { timestamp: i64, last: i64 },
}
