//! Peer collaborators consumed by the pool and the blockchain
//!
//! Payloads are opaque JSON buffers, the transport owns the wire format.

use crate::error::NeighborError;
use async_trait::async_trait;
use std::sync::Arc;

/// RPC client for one peer
#[async_trait]
pub trait Neighbor: Send + Sync {
    /// `ip:port` of the peer
    fn target(&self) -> &str;

    async fn get_blocks(&self, starting_block_height: u64) -> Result<Vec<u8>, NeighborError>;

    async fn get_first_block_timestamp(&self) -> Result<i64, NeighborError>;

    async fn get_settings(&self) -> Result<Vec<u8>, NeighborError>;

    async fn send_targets(&self, targets: Vec<String>) -> Result<(), NeighborError>;

    async fn add_transaction(&self, request: Vec<u8>) -> Result<(), NeighborError>;

    async fn get_transactions(&self) -> Result<Vec<u8>, NeighborError>;

    async fn get_utxos(&self, address: &str) -> Result<Vec<u8>, NeighborError>;
}

/// Source of the peers this node currently talks to
pub trait SendersManager: Send + Sync {
    fn host_target(&self) -> String;

    /// Reward a peer for relaying a valid transaction
    fn incentive(&self, target: &str);

    fn senders(&self) -> Vec<Arc<dyn Neighbor>>;
}
