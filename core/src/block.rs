//! Block structure
//!
//! A block hash is the SHA-256 of the block JSON. Each block carries the hash
//! of its predecessor, the genesis block carries a zero hash.

use crate::error::LedgerError;
use crate::transaction::Transaction;
use halflife_crypto::hash_sha256;
use serde::{Deserialize, Serialize};

pub type BlockHash = [u8; 32];

pub const GENESIS_PREVIOUS_HASH: BlockHash = [0; 32];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    previous_hash: BlockHash,
    added_registered_addresses: Vec<String>,
    removed_registered_addresses: Vec<String>,
    timestamp: i64,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        previous_hash: BlockHash,
        added_registered_addresses: Vec<String>,
        removed_registered_addresses: Vec<String>,
        timestamp: i64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            previous_hash,
            added_registered_addresses,
            removed_registered_addresses,
            timestamp,
            transactions,
        }
    }

    pub fn hash(&self) -> Result<BlockHash, LedgerError> {
        Ok(hash_sha256(&serde_json::to_vec(self)?))
    }

    pub fn previous_hash(&self) -> &BlockHash {
        &self.previous_hash
    }

    pub fn added_registered_addresses(&self) -> &[String] {
        &self.added_registered_addresses
    }

    pub fn removed_registered_addresses(&self) -> &[String] {
        &self.removed_registered_addresses
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Recipient of the block reward
    pub fn validator_address(&self) -> Option<&str> {
        self.transactions
            .iter()
            .rev()
            .find_map(Transaction::reward_recipient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(timestamp: i64) -> Block {
        let reward = Transaction::reward("V", true, timestamp, 1000).unwrap();
        Block::new(
            GENESIS_PREVIOUS_HASH,
            vec!["V".to_string()],
            Vec::new(),
            timestamp,
            vec![reward],
        )
    }

    #[test]
    fn test_hash_depends_on_content() {
        assert_eq!(block(1).hash().unwrap(), block(1).hash().unwrap());
        assert_ne!(block(1).hash().unwrap(), block(2).hash().unwrap());
    }

    #[test]
    fn test_validator_address() {
        assert_eq!(block(1).validator_address(), Some("V"));

        let empty = Block::new(GENESIS_PREVIOUS_HASH, Vec::new(), Vec::new(), 1, Vec::new());
        assert_eq!(empty.validator_address(), None);
    }

    #[test]
    fn test_serialized_block_keeps_its_hash() {
        let original = block(1);
        let json = serde_json::to_vec(&original).unwrap();

        let decoded: Block = serde_json::from_slice(&json).unwrap();

        assert_eq!(decoded.hash().unwrap(), original.hash().unwrap());
    }
}
