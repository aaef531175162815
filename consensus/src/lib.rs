//! Halflife Consensus
//!
//! Block list ownership and reconciliation of the host chain with the chains
//! of its neighbors.

pub mod blockchain;
pub mod errors;

pub use blockchain::{Blockchain, UpdateReport};
pub use errors::VerificationError;
