//! Halflife node assembly
//!
//! Configuration, logging and the wiring of the node components.

pub mod config;
pub mod logging;
pub mod node;
pub mod registry;

pub use config::{ConfigError, NodeConfig};
pub use node::{Node, StandaloneNeighborFactory};
pub use registry::StaticHumanityRegistry;
