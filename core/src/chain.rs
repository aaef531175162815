use crate::error::ChainError;
use crate::ledger::UtxosLedger;
use crate::registry::AddressesRegistry;
use crate::transaction::Transaction;
use async_trait::async_trait;

/// Chain state the transactions pool validates against, read atomically
#[derive(Debug)]
pub struct ChainSnapshot {
    /// 0 when the chain is empty
    pub last_block_timestamp: i64,
    pub last_block_transactions: Vec<Transaction>,
    /// Copy of the live ledger, which does not include the last block yet
    pub utxos: UtxosLedger,
    /// Registered addresses including the last block's changes
    pub registry: AddressesRegistry,
}

/// Block production seam between the pool and the chain
#[async_trait]
pub trait BlocksManager: Send + Sync {
    async fn add_block(
        &self,
        timestamp: i64,
        transactions: Vec<Transaction>,
        new_addresses: Vec<String>,
    ) -> Result<(), ChainError>;

    async fn last_block_timestamp(&self) -> i64;

    async fn snapshot(&self) -> ChainSnapshot;
}
