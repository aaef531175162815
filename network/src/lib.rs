//! Halflife Network
//!
//! Peer bookkeeping: known targets and their scores, outbound selection and
//! target gossip. The wire transport plugs in through [`NeighborFactory`].

pub mod error;
pub mod neighborhood;
pub mod target;

pub use error::NetworkError;
pub use neighborhood::{NeighborFactory, Neighborhood};
pub use target::Target;
