use halflife_core::NeighborError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("target format is invalid, expected ip:port: {0}")]
    InvalidTarget(String),

    #[error("neighbor failure: {0}")]
    Neighbor(#[from] NeighborError),
}
