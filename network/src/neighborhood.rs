//! Neighborhood - Known peers and outbound selection
//!
//! Every known target carries a score, incremented each time the peer relays
//! a valid transaction. On each synchronization the best scored targets
//! become the outbound senders and the scores start over.

use crate::error::NetworkError;
use crate::target::Target;
use halflife_core::{Neighbor, SendersManager};
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Creates the RPC client of a peer
pub trait NeighborFactory: Send + Sync {
    fn create(&self, target: &Target) -> Result<Arc<dyn Neighbor>, NetworkError>;
}

pub struct Neighborhood {
    factory: Arc<dyn NeighborFactory>,
    host: Target,
    max_outbounds_count: usize,
    seed_scores: HashMap<String, u64>,
    scores: Mutex<HashMap<String, u64>>,
    senders: RwLock<Vec<Arc<dyn Neighbor>>>,
}

impl Neighborhood {
    pub fn new(
        factory: Arc<dyn NeighborFactory>,
        host: Target,
        max_outbounds_count: usize,
        seeds: &[String],
    ) -> Self {
        Self {
            factory,
            host,
            max_outbounds_count,
            seed_scores: seeds.iter().map(|seed| (seed.clone(), 0)).collect(),
            scores: Mutex::new(HashMap::new()),
            senders: RwLock::new(Vec::new()),
        }
    }

    /// Register unknown targets with a zero score
    pub fn add_targets(&self, targets: &[String]) {
        let mut scores = self.scores.lock();
        for value in targets {
            match Target::parse(value) {
                Ok(target) => {
                    scores.entry(target.value()).or_insert(0);
                }
                Err(error) => debug!(error = %error, "target ignored"),
            }
        }
    }

    /// Synchronization tick: select the outbounds and gossip the known targets
    pub fn synchronize(&self, _timestamp: i64) {
        let scores = {
            let mut scores = self.scores.lock();
            if scores.is_empty() {
                self.seed_scores.clone()
            } else {
                std::mem::take(&mut *scores)
            }
        };

        let host_value = self.host.value();
        let mut target_values = vec![host_value.clone()];
        let mut neighbors_by_score: BTreeMap<u64, Vec<Arc<dyn Neighbor>>> = BTreeMap::new();
        let mut neighbors_count = 0;
        for (value, score) in scores {
            if value == host_value {
                continue;
            }
            let neighbor = match Target::parse(&value)
                .and_then(|target| self.factory.create(&target))
            {
                Ok(neighbor) => neighbor,
                Err(error) => {
                    debug!(peer = %value, error = %error, "failed to create neighbor");
                    continue;
                }
            };
            neighbors_by_score.entry(score).or_default().push(neighbor);
            neighbors_count += 1;
            target_values.push(value);
        }

        let outbounds_count = neighbors_count.min(self.max_outbounds_count);
        let outbounds = select_outbounds(neighbors_by_score, outbounds_count);
        *self.senders.write() = outbounds.clone();
        debug!(outbounds = outbounds.len(), targets = target_values.len(), "neighborhood synchronized");

        for neighbor in outbounds {
            let targets: Vec<String> = target_values
                .iter()
                .filter(|value| value.as_str() != neighbor.target())
                .cloned()
                .collect();
            tokio::spawn(async move {
                if let Err(error) = neighbor.send_targets(targets).await {
                    debug!(peer = %neighbor.target(), error = %error, "failed to send targets");
                }
            });
        }
    }
}

/// Best scores first, the score group crossing the limit is sampled at random
fn select_outbounds(
    neighbors_by_score: BTreeMap<u64, Vec<Arc<dyn Neighbor>>>,
    outbounds_count: usize,
) -> Vec<Arc<dyn Neighbor>> {
    let mut outbounds = Vec::with_capacity(outbounds_count);
    for (_, mut group) in neighbors_by_score.into_iter().rev() {
        let missing = outbounds_count - outbounds.len();
        if group.len() >= missing {
            group.shuffle(&mut rand::rng());
            outbounds.extend(group.into_iter().take(missing));
            break;
        }
        outbounds.extend(group);
    }
    outbounds
}

impl SendersManager for Neighborhood {
    fn host_target(&self) -> String {
        self.host.value()
    }

    fn incentive(&self, target: &str) {
        *self.scores.lock().entry(target.to_string()).or_insert(0) += 1;
    }

    fn senders(&self) -> Vec<Arc<dyn Neighbor>> {
        self.senders.read().clone()
    }
}
