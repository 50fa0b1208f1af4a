//! Registry error types.

use thiserror::Error;
use tierstore_core::{NodeKey, TierId};

/// Per-request failures. None of these are fatal; "no block available" is
/// not an error at all and surfaces as `None`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node {node} is not registered in tier {tier}")]
    UnknownNode { tier: TierId, node: NodeKey },

    #[error("region {lba} is not known on node {node}")]
    UnknownRegion { node: NodeKey, lba: u64 },

    #[error("tier {tier} is outside the configured range 0..{tiers}")]
    InvalidTier { tier: TierId, tiers: u32 },

    #[error("node already registered: {0}")]
    AlreadyRegistered(NodeKey),

    #[error("allocation cancelled")]
    Cancelled,
}

pub type RegistryResult<T> = Result<T, RegistryError>;
