//! Blockchain - Block list, live ledger and chain reconciliation
//!
//! The live ledger and registered-address set always reflect every committed
//! block except the tip: appending block N applies block N-1 first. A tip that
//! loses the next reconciliation round can therefore be dropped without
//! unwinding any ledger state.
//!
//! Reconciliation fetches candidate chains from the neighbors, verifies each
//! one against a private copy of the host state, rejects minority forks, keeps
//! the longest chains and breaks ties on the longest trailing streak of the
//! tip's validator.

use crate::errors::VerificationError;
use async_trait::async_trait;
use futures::future::join_all;
use halflife_core::{
    AddressesRegistry, Block, BlocksManager, ChainError, ChainSnapshot, LedgerError, Neighbor,
    ProtocolSettings, SendersManager, Transaction, UtxoResponse, UtxosLedger,
    GENESIS_PREVIOUS_HASH,
};
use std::slice;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Outcome of one reconciliation round
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub replaced: bool,
    /// Neighbors whose candidate chain was dropped, with the reason
    pub rejected: Vec<(String, VerificationError)>,
}

struct Candidate {
    target: String,
    blocks: Vec<Block>,
}

/// Host state captured under one read lock at the start of a round
struct HostState {
    blocks: Vec<Block>,
    utxos: UtxosLedger,
    registry: AddressesRegistry,
}

pub struct Blockchain {
    blocks: RwLock<Vec<Block>>,
    registry: AddressesRegistry,
    utxos: UtxosLedger,
    settings: Arc<ProtocolSettings>,
    senders: Arc<dyn SendersManager>,
}

impl Blockchain {
    pub fn new(
        registry: AddressesRegistry,
        utxos: UtxosLedger,
        settings: Arc<ProtocolSettings>,
        senders: Arc<dyn SendersManager>,
    ) -> Self {
        Self {
            blocks: RwLock::new(Vec::new()),
            registry,
            utxos,
            settings,
            senders,
        }
    }

    pub fn registry(&self) -> &AddressesRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &UtxosLedger {
        &self.utxos
    }

    /// Append a block produced by this node
    pub async fn add_block(
        &self,
        timestamp: i64,
        transactions: Vec<Transaction>,
        new_addresses: Vec<String>,
    ) -> Result<(), ChainError> {
        // Oracle lookups are slow, keep them out of the write lock
        let removed = self.registry.removed_addresses().await?;
        let candidates = self.registry.registered_candidates(&new_addresses).await?;

        let mut blocks = self.blocks.write().await;
        let previous_hash = match blocks.last() {
            Some(last) if timestamp <= last.timestamp() => {
                return Err(ChainError::OutdatedBlock {
                    timestamp,
                    last: last.timestamp(),
                });
            }
            Some(last) => last.hash()?,
            None => GENESIS_PREVIOUS_HASH,
        };
        let added = self.registry.filter(&candidates);
        let removed: Vec<String> = removed
            .into_iter()
            .filter(|address| self.registry.is_registered(address))
            .collect();
        let block = Block::new(previous_hash, added, removed, timestamp, transactions);

        if let Some(last) = blocks.last() {
            self.utxos
                .update_utxos(last.transactions(), last.timestamp())?;
            self.registry.update(
                last.added_registered_addresses(),
                last.removed_registered_addresses(),
            );
        }
        debug!(height = blocks.len(), timestamp, "block added");
        blocks.push(block);
        Ok(())
    }

    /// Serialized blocks from `starting_height`, at most `blocks_count_limit` of them
    pub async fn blocks(&self, starting_height: u64) -> Result<Vec<u8>, serde_json::Error> {
        let blocks = self.blocks.read().await;
        let count = blocks.len() as u64;
        let limit = self.settings.blocks_count_limit;
        if starting_height >= count || limit == 0 {
            return serde_json::to_vec(&[] as &[Block]);
        }
        let end = starting_height.saturating_add(limit).min(count);
        serde_json::to_vec(&blocks[starting_height as usize..end as usize])
    }

    pub async fn height(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn first_block_timestamp(&self) -> i64 {
        self.blocks.read().await.first().map_or(0, Block::timestamp)
    }

    pub async fn last_block_timestamp(&self) -> i64 {
        self.blocks.read().await.last().map_or(0, Block::timestamp)
    }

    pub async fn last_block_transactions(&self) -> Vec<Transaction> {
        self.blocks
            .read()
            .await
            .last()
            .map(|block| block.transactions().to_vec())
            .unwrap_or_default()
    }

    /// Serialized UTXOs of `address`, valued at `now`
    pub fn utxos(&self, address: &str, now: i64) -> Result<Vec<u8>, serde_json::Error> {
        let responses: Vec<UtxoResponse> = self
            .utxos
            .utxos(address)
            .iter()
            .map(|utxo| UtxoResponse::new(utxo, now, &self.settings))
            .collect();
        serde_json::to_vec(&responses)
    }

    /// Verification tick
    pub async fn update(&self, now: i64) {
        match self.try_update(now).await {
            Ok(report) if report.replaced => {
                let height = self.height().await;
                info!(now, height, "verification done: blockchain replaced");
            }
            Ok(_) => debug!(now, "verification done: blockchain kept"),
            Err(error) => error!(now, error = %error, "verification failed"),
        }
    }

    /// Reconcile the host chain with the neighbors' chains
    pub async fn try_update(&self, now: i64) -> Result<UpdateReport, ChainError> {
        let host = self.host_state().await;
        let neighbors = self.senders.senders();
        let host_len = host.blocks.len();
        let mut report = UpdateReport::default();
        let mut candidates = Vec::new();

        if host_len > 2 {
            candidates.push(Candidate {
                target: self.senders.host_target(),
                blocks: host.blocks.clone(),
            });
            let (old_host, last_host) = host.blocks.split_at(host_len - 1);
            let results = self
                .verify_neighbors(now, &neighbors, (host_len - 1) as u64, last_host, old_host, &host)
                .await;
            for (target, result) in results {
                match result {
                    Ok(verified) => {
                        let mut blocks = old_host.to_vec();
                        blocks.extend(verified);
                        candidates.push(Candidate { target, blocks });
                    }
                    Err(error) => {
                        debug!(peer = %target, error = %error, "failed to verify last neighbor blocks");
                        report.rejected.push((target, error));
                    }
                }
            }
        }

        let is_fork = candidates.len() < 2 && !neighbors.is_empty();
        if is_fork {
            debug!("no neighbor agrees on the last blocks, verifying the whole blockchains");
            let last_host = &host.blocks[..host_len.saturating_sub(1)];
            let results = self
                .verify_neighbors(now, &neighbors, 0, last_host, &[], &host)
                .await;
            for (target, result) in results {
                match result {
                    Ok(blocks) => candidates.push(Candidate { target, blocks }),
                    Err(error) => {
                        debug!(peer = %target, error = %error, "failed to verify whole neighbor blocks");
                        report.rejected.push((target, error));
                    }
                }
            }
        }

        let Some(selected) = select(candidates) else {
            return Ok(report);
        };
        let selected_len = selected.blocks.len();
        let is_different = if host_len < selected_len {
            true
        } else if selected_len >= 2 {
            match (host.blocks.last(), selected.blocks.last()) {
                (Some(host_tip), Some(selected_tip)) => host_tip.hash()? != selected_tip.hash()?,
                _ => false,
            }
        } else {
            false
        };
        if !is_different {
            return Ok(report);
        }

        // The ledger excludes the tip, so replay up to the block before it
        let HostState {
            blocks: host_blocks,
            utxos,
            registry,
        } = host;
        let replayed: &[Block] = if is_fork {
            utxos.clear();
            registry.clear();
            &selected.blocks[..selected_len - 1]
        } else if host_len < selected_len {
            // fast path candidates share the host chain up to `host_len - 1`
            &selected.blocks[host_len - 1..selected_len - 1]
        } else {
            &[]
        };
        for block in replayed {
            utxos.update_utxos(block.transactions(), block.timestamp())?;
            registry.update(
                block.added_registered_addresses(),
                block.removed_registered_addresses(),
            );
        }

        let mut blocks = self.blocks.write().await;
        if blocks.len() != host_blocks.len() || blocks.last() != host_blocks.last() {
            debug!("blockchain changed during verification, replacement skipped");
            return Ok(report);
        }
        self.utxos.promote(utxos);
        self.registry.promote(registry);
        info!(
            peer = %selected.target,
            height = selected_len,
            "blockchain replaced"
        );
        *blocks = selected.blocks;
        report.replaced = true;
        Ok(report)
    }

    async fn host_state(&self) -> HostState {
        let blocks = self.blocks.read().await;
        HostState {
            blocks: blocks.clone(),
            utxos: self.utxos.copy(),
            registry: self.registry.copy(),
        }
    }

    async fn verify_neighbors(
        &self,
        now: i64,
        neighbors: &[Arc<dyn Neighbor>],
        starting_height: u64,
        last_host: &[Block],
        old_host: &[Block],
        host: &HostState,
    ) -> Vec<(String, Result<Vec<Block>, VerificationError>)> {
        let timeout = self.settings.validation_timeout();
        let verifications = neighbors.iter().map(|neighbor| async move {
            let result = match tokio::time::timeout(timeout, neighbor.get_blocks(starting_height)).await {
                Ok(Ok(bytes)) => match serde_json::from_slice::<Vec<Block>>(&bytes) {
                    Ok(blocks) => self.verify(now, last_host, blocks, old_host, host).await,
                    Err(error) => Err(VerificationError::Malformed(error)),
                },
                Ok(Err(error)) => Err(VerificationError::Fetch(error)),
                Err(_) => Err(VerificationError::Timeout),
            };
            (neighbor.target().to_string(), result)
        });
        join_all(verifications).await
    }

    /// Replay `neighbor_blocks` on top of `old_host` against a private copy of
    /// the host state. Blocks that differ from `last_host` are fully verified.
    async fn verify(
        &self,
        now: i64,
        last_host: &[Block],
        neighbor_blocks: Vec<Block>,
        old_host: &[Block],
        host: &HostState,
    ) -> Result<Vec<Block>, VerificationError> {
        if old_host.is_empty() && neighbor_blocks.len() < 2 {
            return Err(VerificationError::TooShort);
        }
        if !old_host.is_empty() {
            match (last_host.first(), neighbor_blocks.first()) {
                (Some(host_block), Some(neighbor_block))
                    if host_block.previous_hash() == neighbor_block.previous_hash() => {}
                _ => return Err(VerificationError::Fork),
            }
        }
        let Some(last_neighbor_block) = neighbor_blocks.last() else {
            return Err(VerificationError::TooShort);
        };
        // The validator of a block produced at this very tick must be confirmed
        if last_neighbor_block.timestamp() == now {
            if let Some(validator) = last_neighbor_block.validator_address() {
                host.registry.verify(&[validator.to_string()], &[]).await?;
            }
        }

        let utxos = host.utxos.copy();
        let registry = host.registry.copy();
        if old_host.is_empty() {
            utxos.clear();
            registry.clear();
        }
        let last_index = neighbor_blocks.len() - 1;
        let mut previous = old_host.last();
        for (index, block) in neighbor_blocks.iter().enumerate() {
            let height = old_host.len() + index;
            let expected_previous_hash = match previous {
                Some(previous_block) => previous_block.hash().map_err(VerificationError::Hash)?,
                None => GENESIS_PREVIOUS_HASH,
            };
            if block.previous_hash() != &expected_previous_hash {
                return Err(VerificationError::InvalidPreviousHash { height });
            }
            let is_new = last_host
                .get(index)
                .map_or(true, |host_block| host_block != block);
            // Older registrations may have been revoked since, so a whole
            // chain only has its last delta checked against the oracle
            if index == last_index || (is_new && !old_host.is_empty()) {
                host.registry
                    .verify(
                        block.added_registered_addresses(),
                        block.removed_registered_addresses(),
                    )
                    .await?;
            }
            match previous {
                Some(previous_block) if is_new => self.verify_block(
                    block,
                    height,
                    previous_block.timestamp(),
                    now,
                    &utxos,
                    &registry,
                )?,
                _ => utxos.update_utxos(block.transactions(), block.timestamp())?,
            }
            registry.update(
                block.added_registered_addresses(),
                block.removed_registered_addresses(),
            );
            previous = Some(block);
        }
        Ok(neighbor_blocks)
    }

    /// Check `block` and fold its transactions into `utxos`
    fn verify_block(
        &self,
        block: &Block,
        height: usize,
        previous_timestamp: i64,
        now: i64,
        utxos: &UtxosLedger,
        registry: &AddressesRegistry,
    ) -> Result<(), VerificationError> {
        let timestamp = block.timestamp();
        let expected = previous_timestamp.saturating_add(self.settings.block_period());
        if timestamp != expected {
            return Err(VerificationError::InvalidBlockTimestamp { timestamp, expected });
        }
        if timestamp > now {
            return Err(VerificationError::BlockInTheFuture { timestamp, now });
        }

        let mut rewards = Vec::new();
        let mut fees: u64 = 0;
        for transaction in block.transactions() {
            if transaction.is_reward() {
                if !rewards.is_empty() {
                    return Err(VerificationError::MultipleRewards { height });
                }
                rewards.push(transaction.clone());
                continue;
            }
            if timestamp < transaction.timestamp() {
                return Err(VerificationError::TransactionTooNew {
                    id: transaction.id().to_string(),
                    timestamp: transaction.timestamp(),
                });
            }
            if transaction.timestamp() < previous_timestamp {
                return Err(VerificationError::TransactionTooOld {
                    id: transaction.id().to_string(),
                    timestamp: transaction.timestamp(),
                });
            }
            transaction.verify_signatures()?;
            for output in transaction.outputs() {
                let is_newly_registered = block
                    .added_registered_addresses()
                    .iter()
                    .any(|address| address == output.address());
                if output.is_yielding()
                    && !is_newly_registered
                    && !registry.is_registered(output.address())
                {
                    return Err(VerificationError::UnregisteredYieldingAddress(
                        output.address().to_string(),
                    ));
                }
            }
            let fee = utxos.calculate_fee(transaction, timestamp)?;
            fees = fees.checked_add(fee).ok_or(LedgerError::Overflow)?;
            utxos.update_utxos(slice::from_ref(transaction), timestamp)?;
        }

        let reward = rewards
            .first()
            .and_then(Transaction::reward_value)
            .ok_or(VerificationError::MissingReward { height })?;
        if reward > fees {
            return Err(VerificationError::RewardExceedsFees { reward, fees });
        }
        utxos.update_utxos(&rewards, timestamp)?;
        Ok(())
    }
}

/// Pick the chain to adopt among the verified candidates
fn select(candidates: Vec<Candidate>) -> Option<Candidate> {
    let min_len = candidates.iter().map(|candidate| candidate.blocks.len()).min()?;
    if min_len == 0 {
        return None;
    }
    // A candidate survives only if a strict majority shares its previous hash
    // at the last height every candidate has
    let total = candidates.len();
    let agreements: Vec<usize> = candidates
        .iter()
        .map(|candidate| {
            let previous_hash = candidate.blocks[min_len - 1].previous_hash();
            candidates
                .iter()
                .filter(|other| other.blocks[min_len - 1].previous_hash() == previous_hash)
                .count()
        })
        .collect();
    let agreed: Vec<Candidate> = candidates
        .into_iter()
        .zip(agreements)
        .filter(|(_, agreeing)| agreeing * 2 > total)
        .map(|(candidate, _)| candidate)
        .collect();

    let max_len = agreed.iter().map(|candidate| candidate.blocks.len()).max()?;
    let mut selected: Option<(usize, Candidate)> = None;
    for candidate in agreed
        .into_iter()
        .filter(|candidate| candidate.blocks.len() == max_len)
    {
        let streak = validator_streak(&candidate.blocks);
        if selected.as_ref().map_or(true, |(best, _)| streak > *best) {
            selected = Some((streak, candidate));
        }
    }
    selected.map(|(_, candidate)| candidate)
}

/// Number of trailing blocks rewarded to the validator of the tip
fn validator_streak(blocks: &[Block]) -> usize {
    let Some(validator) = blocks.last().and_then(Block::validator_address) else {
        return 0;
    };
    blocks
        .iter()
        .rev()
        .take_while(|block| block.validator_address() == Some(validator))
        .count()
}

#[async_trait]
impl BlocksManager for Blockchain {
    async fn add_block(
        &self,
        timestamp: i64,
        transactions: Vec<Transaction>,
        new_addresses: Vec<String>,
    ) -> Result<(), ChainError> {
        Blockchain::add_block(self, timestamp, transactions, new_addresses).await
    }

    async fn last_block_timestamp(&self) -> i64 {
        Blockchain::last_block_timestamp(self).await
    }

    async fn snapshot(&self) -> ChainSnapshot {
        let blocks = self.blocks.read().await;
        let registry = self.registry.copy();
        if let Some(last) = blocks.last() {
            registry.update(
                last.added_registered_addresses(),
                last.removed_registered_addresses(),
            );
        }
        ChainSnapshot {
            last_block_timestamp: blocks.last().map_or(0, Block::timestamp),
            last_block_transactions: blocks
                .last()
                .map(|block| block.transactions().to_vec())
                .unwrap_or_default(),
            utxos: self.utxos.copy(),
            registry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(previous_hash: [u8; 32], timestamp: i64, validator: &str) -> Block {
        let reward = Transaction::reward(validator, false, timestamp, 0).unwrap();
        Block::new(previous_hash, Vec::new(), Vec::new(), timestamp, vec![reward])
    }

    fn chain(validators: &[&str]) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        for (index, validator) in validators.iter().enumerate() {
            let previous_hash = blocks
                .last()
                .map_or(GENESIS_PREVIOUS_HASH, |last| last.hash().unwrap());
            blocks.push(block(previous_hash, index as i64, validator));
        }
        blocks
    }

    fn candidate(target: &str, blocks: Vec<Block>) -> Candidate {
        Candidate {
            target: target.to_string(),
            blocks,
        }
    }

    #[test]
    fn test_validator_streak_counts_trailing_blocks() {
        assert_eq!(validator_streak(&chain(&["A", "B", "B", "B"])), 3);
        assert_eq!(validator_streak(&chain(&["A", "A", "B"])), 1);
        assert_eq!(validator_streak(&[]), 0);
    }

    #[test]
    fn test_select_minority_forks_are_rejected() {
        let selected = select(vec![
            candidate("a", chain(&["A", "A", "A"])),
            candidate("b", chain(&["B", "B", "B"])),
        ]);

        assert!(selected.is_none());
    }

    #[test]
    fn test_select_majority_keeps_longest_chain() {
        let long = chain(&["A", "A", "A", "A"]);
        let selected = select(vec![
            candidate("host", long[..3].to_vec()),
            candidate("a", long.clone()),
            candidate("b", chain(&["B", "B", "B", "B", "B"])),
        ])
        .unwrap();

        assert_eq!(selected.target, "a");
        assert_eq!(selected.blocks, long);
    }

    #[test]
    fn test_select_tie_broken_by_validator_streak() {
        let prefix = chain(&["A", "A"]);
        let tip_hash = prefix[1].hash().unwrap();
        let mut by_a = prefix.clone();
        by_a.push(block(tip_hash, 2, "A"));
        let mut by_b = prefix;
        by_b.push(block(tip_hash, 2, "B"));

        let selected = select(vec![candidate("b", by_b), candidate("a", by_a)]).unwrap();

        assert_eq!(selected.target, "a");
    }
}
