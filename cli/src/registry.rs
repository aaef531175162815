//! Built-in humanity registry
//!
//! Answers from a fixed allowlist, or confirms every address when none is
//! configured.

use async_trait::async_trait;
use halflife_core::{HumanityRegistry, RegistryError};
use std::collections::HashSet;
use tracing::warn;

pub enum StaticHumanityRegistry {
    Open,
    Allowlist(HashSet<String>),
}

impl StaticHumanityRegistry {
    pub fn new(registered_addresses: Option<&[String]>) -> Self {
        match registered_addresses {
            Some(addresses) => Self::Allowlist(addresses.iter().cloned().collect()),
            None => {
                warn!("no registered addresses configured, every address is considered registered");
                Self::Open
            }
        }
    }
}

#[async_trait]
impl HumanityRegistry for StaticHumanityRegistry {
    async fn is_registered(&self, address: &str) -> Result<bool, RegistryError> {
        Ok(match self {
            Self::Open => true,
            Self::Allowlist(addresses) => addresses.contains(address),
        })
    }
}
