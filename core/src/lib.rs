//! Halflife Core Library
//!
//! Ledger entities, the UTXO ledger with decaying values, registered
//! addresses and the collaborator traits shared by the node crates.

pub mod block;
pub mod chain;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod neighbor;
pub mod output;
pub mod registry;
pub mod settings;
pub mod tick;
pub mod transaction;
pub mod utxo;

// Re-export main types
pub use block::{Block, BlockHash, GENESIS_PREVIOUS_HASH};
pub use chain::{BlocksManager, ChainSnapshot};
pub use clock::{Clock, SystemClock};
pub use error::{ChainError, LedgerError, NeighborError, RegistryError, SettingsError};
pub use ledger::UtxosLedger;
pub use neighbor::{Neighbor, SendersManager};
pub use output::Output;
pub use registry::{AddressesRegistry, HumanityRegistry};
pub use settings::ProtocolSettings;
pub use transaction::{Input, InputInfo, Transaction, TransactionRequest};
pub use utxo::{Utxo, UtxoResponse};
