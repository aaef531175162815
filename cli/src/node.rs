//! Node assembly
//!
//! Wires the ledger, the registered addresses, the blockchain, the
//! neighborhood and the transactions pool, and drives them with three tick
//! engines. The handlers after the accessors are what a transport calls on
//! behalf of peers.

use crate::config::{ConfigError, NodeConfig};
use halflife_consensus::Blockchain;
use halflife_core::tick::Engine;
use halflife_core::{
    AddressesRegistry, Clock, HumanityRegistry, Neighbor, NeighborError, ProtocolSettings,
    SendersManager, UtxosLedger,
};
use halflife_crypto::KeyPair;
use halflife_mempool::{PoolError, TransactionsPool};
use halflife_network::{NeighborFactory, Neighborhood, NetworkError, Target};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct Node {
    config: NodeConfig,
    settings: Arc<ProtocolSettings>,
    clock: Arc<dyn Clock>,
    validator_address: String,
    blockchain: Arc<Blockchain>,
    neighborhood: Arc<Neighborhood>,
    pool: Arc<TransactionsPool>,
}

impl Node {
    pub fn new(
        config: NodeConfig,
        settings: ProtocolSettings,
        humanity: Arc<dyn HumanityRegistry>,
        factory: Arc<dyn NeighborFactory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        config.validate()?;
        let validator = match &config.validator.private_key {
            Some(private_key) => KeyPair::from_private_key_hex(private_key)?,
            None => {
                warn!("no validator private key configured, using an ephemeral key");
                KeyPair::generate()
            }
        };
        let settings = Arc::new(settings);

        let host = Target::new(config.host.ip.clone(), config.host.port);
        let neighborhood = Arc::new(Neighborhood::new(
            factory,
            host,
            config.network.max_outbounds_count,
            &config.network.seeds,
        ));
        let blockchain = Arc::new(Blockchain::new(
            AddressesRegistry::new(humanity),
            UtxosLedger::new(settings.clone()),
            settings.clone(),
            neighborhood.clone(),
        ));
        let pool = Arc::new(TransactionsPool::new(
            blockchain.clone(),
            neighborhood.clone(),
            settings.clone(),
            validator.address(),
        ));

        Ok(Self {
            config,
            settings,
            clock,
            validator_address: validator.address(),
            blockchain,
            neighborhood,
            pool,
        })
    }

    /// Spawn the synchronization, validation and verification engines
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            host = %self.neighborhood.host_target(),
            validator = %self.validator_address,
            "starting node"
        );

        let neighborhood = self.neighborhood.clone();
        let synchronization = Engine::new(
            "synchronization",
            self.clock.clone(),
            self.config.synchronization_timer(),
            1,
            0,
        )
        .start(move |timestamp| {
            let neighborhood = neighborhood.clone();
            async move { neighborhood.synchronize(timestamp) }
        });

        let pool = self.pool.clone();
        let validation = Engine::new(
            "validation",
            self.clock.clone(),
            self.settings.validation_timer(),
            1,
            0,
        )
        .start(move |timestamp| {
            let pool = pool.clone();
            async move { pool.validate(timestamp).await }
        });

        // the first verification tick of a period is the validation tick
        let occurrences =
            u32::try_from(self.settings.verifications_count_per_validation).unwrap_or(1);
        let blockchain = self.blockchain.clone();
        let verification = Engine::new(
            "verification",
            self.clock.clone(),
            self.settings.validation_timer(),
            occurrences,
            1,
        )
        .start(move |timestamp| {
            let blockchain = blockchain.clone();
            async move { blockchain.update(timestamp).await }
        });

        vec![synchronization, validation, verification]
    }

    pub fn validator_address(&self) -> &str {
        &self.validator_address
    }

    pub fn blockchain(&self) -> &Arc<Blockchain> {
        &self.blockchain
    }

    pub fn neighborhood(&self) -> &Arc<Neighborhood> {
        &self.neighborhood
    }

    pub fn pool(&self) -> &Arc<TransactionsPool> {
        &self.pool
    }

    pub async fn blocks(&self, starting_block_height: u64) -> Result<Vec<u8>, serde_json::Error> {
        self.blockchain.blocks(starting_block_height).await
    }

    pub async fn first_block_timestamp(&self) -> i64 {
        self.blockchain.first_block_timestamp().await
    }

    pub fn settings(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.settings.to_bytes()
    }

    pub fn add_targets(&self, targets: &[String]) {
        self.neighborhood.add_targets(targets);
    }

    pub async fn add_transaction(&self, request: &[u8]) -> Result<(), PoolError> {
        let host_target = self.neighborhood.host_target();
        self.pool.add_transaction(request, &host_target).await
    }

    pub async fn transactions(&self) -> Result<Vec<u8>, PoolError> {
        self.pool.transactions().await
    }

    /// UTXOs of `address` valued at the current time
    pub fn utxos(&self, address: &str) -> Result<Vec<u8>, serde_json::Error> {
        self.blockchain.utxos(address, self.clock.now())
    }
}

/// Factory of a node without transport: no peer is ever reachable
#[derive(Debug, Default)]
pub struct StandaloneNeighborFactory;

impl NeighborFactory for StandaloneNeighborFactory {
    fn create(&self, target: &Target) -> Result<Arc<dyn Neighbor>, NetworkError> {
        Err(NeighborError::Unreachable(target.value()).into())
    }
}
