//! Registered addresses
//!
//! Only registered addresses may receive yielding outputs. Registration is
//! decided by an external proof-of-humanity oracle and recorded in blocks as
//! added and removed addresses.

use crate::error::RegistryError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Proof-of-humanity oracle
#[async_trait]
pub trait HumanityRegistry: Send + Sync {
    async fn is_registered(&self, address: &str) -> Result<bool, RegistryError>;
}

pub struct AddressesRegistry {
    humanity: Arc<dyn HumanityRegistry>,
    registered: RwLock<HashSet<String>>,
}

impl fmt::Debug for AddressesRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressesRegistry")
            .field("registered", &self.registered_addresses())
            .finish_non_exhaustive()
    }
}

impl AddressesRegistry {
    pub fn new(humanity: Arc<dyn HumanityRegistry>) -> Self {
        Self {
            humanity,
            registered: RwLock::new(HashSet::new()),
        }
    }

    pub fn humanity(&self) -> &Arc<dyn HumanityRegistry> {
        &self.humanity
    }

    pub fn clear(&self) {
        self.registered.write().clear();
    }

    pub fn copy(&self) -> AddressesRegistry {
        Self {
            humanity: Arc::clone(&self.humanity),
            registered: RwLock::new(self.registered.read().clone()),
        }
    }

    pub fn promote(&self, snapshot: AddressesRegistry) {
        *self.registered.write() = snapshot.registered.into_inner();
    }

    /// Addresses of `addresses` that are not registered yet
    pub fn filter(&self, addresses: &[String]) -> Vec<String> {
        let registered = self.registered.read();
        let mut seen = HashSet::new();
        addresses
            .iter()
            .filter(|address| !registered.contains(*address) && seen.insert(*address))
            .cloned()
            .collect()
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.registered.read().contains(address)
    }

    pub fn registered_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.registered.read().iter().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn update(&self, added: &[String], removed: &[String]) {
        let mut registered = self.registered.write();
        for address in removed {
            registered.remove(address);
        }
        registered.extend(added.iter().cloned());
    }

    /// Registered addresses the oracle no longer confirms
    pub async fn removed_addresses(&self) -> Result<Vec<String>, RegistryError> {
        let mut removed = Vec::new();
        for address in self.registered_addresses() {
            if !self.humanity.is_registered(&address).await? {
                removed.push(address);
            }
        }
        Ok(removed)
    }

    /// Unregistered `candidates` the oracle confirms
    pub async fn registered_candidates(
        &self,
        candidates: &[String],
    ) -> Result<Vec<String>, RegistryError> {
        let mut added = Vec::new();
        for address in self.filter(candidates) {
            if self.humanity.is_registered(&address).await? {
                added.push(address);
            }
        }
        Ok(added)
    }

    /// Check a registered-address delta against the oracle
    pub async fn verify(&self, added: &[String], removed: &[String]) -> Result<(), RegistryError> {
        for address in added {
            if !self.humanity.is_registered(address).await? {
                return Err(RegistryError::AddedNotRegistered(address.clone()));
            }
        }
        for address in removed {
            if self.humanity.is_registered(address).await? {
                return Err(RegistryError::RemovedIsRegistered(address.clone()));
            }
        }
        Ok(())
    }
}
