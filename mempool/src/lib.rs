//! Transactions Pool - Pending transactions and block production
//!
//! Candidate transactions are checked against a copy of the ledger that
//! already includes the last block and every pending transaction still
//! valid on top of it. Yielding outputs must go to registered addresses or
//! to addresses the humanity oracle confirms. On each validation tick the
//! pending transactions are replayed in a seeded random order, the invalid
//! ones are dropped and the others are committed as the next block together
//! with the validator reward.

pub mod error;

pub use error::PoolError;

use halflife_core::{
    AddressesRegistry, BlocksManager, LedgerError, ProtocolSettings, RegistryError,
    SendersManager, Transaction, TransactionRequest, UtxosLedger,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::slice;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub struct TransactionsPool {
    /// Pending transactions, in arrival order
    transactions: RwLock<Vec<Transaction>>,
    blocks: Arc<dyn BlocksManager>,
    senders: Arc<dyn SendersManager>,
    settings: Arc<ProtocolSettings>,
    validator_address: String,
}

impl TransactionsPool {
    pub fn new(
        blocks: Arc<dyn BlocksManager>,
        senders: Arc<dyn SendersManager>,
        settings: Arc<ProtocolSettings>,
        validator_address: impl Into<String>,
    ) -> Self {
        Self {
            transactions: RwLock::new(Vec::new()),
            blocks,
            senders,
            settings,
            validator_address: validator_address.into(),
        }
    }

    /// Admit a serialized [`TransactionRequest`] and relay it to the other peers
    pub async fn add_transaction(
        &self,
        request_bytes: &[u8],
        host_target: &str,
    ) -> Result<(), PoolError> {
        let request = TransactionRequest::from_bytes(request_bytes).map_err(|error| {
            debug!(error = %error, "transaction request rejected");
            PoolError::Deserialization(error)
        })?;
        let TransactionRequest {
            transaction,
            transaction_broadcaster_target: broadcaster,
        } = request;
        if let Err(error) = self.add(transaction.clone()).await {
            warn!(transaction = %transaction.id(), error = %error, "transaction rejected");
            return Err(error);
        }
        debug!(transaction = %transaction.id(), broadcaster = %broadcaster, "transaction added");
        self.senders.incentive(&broadcaster);
        self.relay(transaction, &broadcaster, host_target);
        Ok(())
    }

    async fn add(&self, transaction: Transaction) -> Result<(), PoolError> {
        let snapshot = self.blocks.snapshot().await;
        let last_block_timestamp = snapshot.last_block_timestamp;
        if last_block_timestamp == 0 {
            return Err(PoolError::EmptyBlockchain);
        }
        let next_block_timestamp = last_block_timestamp.saturating_add(self.settings.block_period());
        if next_block_timestamp < transaction.timestamp() {
            return Err(PoolError::TooFarInTheFuture {
                timestamp: transaction.timestamp(),
                limit: next_block_timestamp,
            });
        }
        if transaction.timestamp() < last_block_timestamp {
            return Err(PoolError::TooOld {
                timestamp: transaction.timestamp(),
                limit: last_block_timestamp,
            });
        }
        transaction.verify_signatures()?;
        let unregistered =
            unregistered_yielding_addresses(&snapshot.registry, slice::from_ref(&transaction))
                .await?;
        if let Some(address) = unregistered.into_iter().next() {
            return Err(PoolError::UnregisteredYieldingAddress(address));
        }

        let mut transactions = self.transactions.write().await;
        if transactions.contains(&transaction) {
            return Err(PoolError::AlreadyInPool(transaction.id().to_string()));
        }
        let utxos = snapshot.utxos;
        utxos
            .update_utxos(&snapshot.last_block_transactions, last_block_timestamp)
            .map_err(PoolError::Replay)?;
        // Pending transactions a newer block already committed no longer apply
        for pending in transactions.iter() {
            if let Err(error) = utxos.update_utxos(slice::from_ref(pending), next_block_timestamp) {
                debug!(transaction = %pending.id(), error = %error, "stale pending transaction skipped");
            }
        }
        utxos.calculate_fee(&transaction, next_block_timestamp)?;
        utxos.verify_utxos(slice::from_ref(&transaction), next_block_timestamp)?;
        transactions.push(transaction);
        Ok(())
    }

    fn relay(&self, transaction: Transaction, broadcaster: &str, host_target: &str) {
        let request = match TransactionRequest::new(transaction, host_target).to_bytes() {
            Ok(request) => request,
            Err(error) => {
                error!(error = %error, "failed to serialize relayed transaction");
                return;
            }
        };
        for neighbor in self.senders.senders() {
            if neighbor.target() == broadcaster {
                continue;
            }
            let request = request.clone();
            tokio::spawn(async move {
                if let Err(error) = neighbor.add_transaction(request).await {
                    debug!(peer = %neighbor.target(), error = %error, "failed to relay transaction");
                }
            });
        }
    }

    /// Serialized pending transactions
    pub async fn transactions(&self) -> Result<Vec<u8>, PoolError> {
        let transactions = self.transactions.read().await;
        serde_json::to_vec(&*transactions).map_err(PoolError::Serialization)
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.transactions.read().await.clone()
    }

    /// Validation tick
    pub async fn validate(&self, timestamp: i64) {
        match self.try_validate(timestamp).await {
            Ok(count) => info!(timestamp, transactions = count, "block created"),
            Err(error) => error!(timestamp, error = %error, "validation failed"),
        }
    }

    /// Produce the block of `timestamp`, returning its transactions count
    pub async fn try_validate(&self, timestamp: i64) -> Result<usize, PoolError> {
        let snapshot = self.blocks.snapshot().await;
        let last_block_timestamp = snapshot.last_block_timestamp;
        let block_period = self.settings.block_period();
        let pending = self.transactions.read().await.clone();
        let processed: HashSet<String> = pending
            .iter()
            .map(|transaction| transaction.id().to_string())
            .collect();

        let mut accepted = Vec::new();
        let mut new_addresses = Vec::new();
        let (reward, is_yielding) = if last_block_timestamp == 0 {
            new_addresses.push(self.validator_address.clone());
            (self.settings.genesis_amount, true)
        } else {
            if timestamp == last_block_timestamp {
                return Err(PoolError::BlockAlreadyExists);
            }
            if timestamp < last_block_timestamp {
                return Err(PoolError::OutdatedTimestamp);
            }
            if timestamp > last_block_timestamp.saturating_add(block_period) {
                return Err(PoolError::MissingBlock);
            }
            let utxos = snapshot.utxos;
            utxos
                .update_utxos(&snapshot.last_block_transactions, last_block_timestamp)
                .map_err(PoolError::Replay)?;

            let unregistered = unregistered_yielding_addresses(&snapshot.registry, &pending).await?;

            let mut pending = pending;
            pending.shuffle(&mut ChaCha8Rng::seed_from_u64(timestamp as u64));
            let mut fees: u64 = 0;
            for transaction in pending {
                let accepted_fees = self.accept(
                    &utxos,
                    &transaction,
                    last_block_timestamp,
                    timestamp,
                    &unregistered,
                    fees,
                );
                match accepted_fees {
                    Ok(total) => {
                        fees = total;
                        accepted.push(transaction);
                    }
                    Err(error) => {
                        warn!(transaction = %transaction.id(), error = %error, "pending transaction rejected");
                    }
                }
            }
            for transaction in &accepted {
                for output in transaction.outputs() {
                    if output.is_yielding() && !new_addresses.iter().any(|a| a == output.address()) {
                        new_addresses.push(output.address().to_string());
                    }
                }
            }
            (fees, false)
        };

        let reward = Transaction::reward(&self.validator_address, is_yielding, timestamp, reward)
            .map_err(PoolError::Reward)?;
        accepted.push(reward);
        let count = accepted.len();
        self.blocks
            .add_block(timestamp, accepted, new_addresses)
            .await?;

        self.transactions
            .write()
            .await
            .retain(|transaction| !processed.contains(transaction.id()));
        Ok(count)
    }

    /// Fold `transaction` into `utxos` for a block at `timestamp` following
    /// the last block, returning the fees total including it
    fn accept(
        &self,
        utxos: &UtxosLedger,
        transaction: &Transaction,
        last_block_timestamp: i64,
        timestamp: i64,
        unregistered: &HashSet<String>,
        fees: u64,
    ) -> Result<u64, PoolError> {
        if timestamp < transaction.timestamp() {
            return Err(PoolError::TooFarInTheFuture {
                timestamp: transaction.timestamp(),
                limit: timestamp,
            });
        }
        if transaction.timestamp() < last_block_timestamp {
            return Err(PoolError::TooOld {
                timestamp: transaction.timestamp(),
                limit: last_block_timestamp,
            });
        }
        transaction.verify_signatures()?;
        if let Some(output) = transaction
            .outputs()
            .iter()
            .find(|output| output.is_yielding() && unregistered.contains(output.address()))
        {
            return Err(PoolError::UnregisteredYieldingAddress(
                output.address().to_string(),
            ));
        }
        let fee = utxos.calculate_fee(transaction, timestamp)?;
        let total = fees.checked_add(fee).ok_or(LedgerError::Overflow)?;
        utxos.update_utxos(slice::from_ref(transaction), timestamp)?;
        Ok(total)
    }
}

/// Yielding output addresses of `transactions` that are neither registered
/// nor confirmed by the humanity oracle
async fn unregistered_yielding_addresses(
    registry: &AddressesRegistry,
    transactions: &[Transaction],
) -> Result<HashSet<String>, RegistryError> {
    let yielding: Vec<String> = transactions
        .iter()
        .flat_map(Transaction::outputs)
        .filter(|output| output.is_yielding())
        .map(|output| output.address().to_string())
        .collect();
    let candidates = registry.filter(&yielding);
    let confirmed = registry.registered_candidates(&candidates).await?;
    Ok(candidates
        .into_iter()
        .filter(|address| !confirmed.contains(address))
        .collect())
}
