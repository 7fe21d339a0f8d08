//! Error types for the share-chain engine.

use sidepool_consensus::ConsensusError;
use sidepool_types::{Difficulty, Hash};
use thiserror::Error;

/// Errors from graph operations.
///
/// `MissingParent`/`MissingUncle` are transient: the block that triggered
/// them stays unverified and the missing ids can be requested from peers.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChainError {
    #[error("block {id} is already in the store")]
    AlreadyPresent { id: Hash },

    #[error("block {id} is not in the store")]
    UnknownBlock { id: Hash },

    #[error("missing parent {parent} of block at height {height}")]
    MissingParent { parent: Hash, height: u64 },

    #[error("missing uncle {uncle} of block at height {height}")]
    MissingUncle { uncle: Hash, height: u64 },

    #[error(transparent)]
    Consensus(#[from] ConsensusError),
}

/// Result type for graph operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Rejections of an external block before insertion.
///
/// All of these are grounds for the P2P layer to penalize the sender; none
/// of them leave any trace in the store.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngressError {
    #[error("difficulty {got} is below the pool minimum {min}")]
    DifficultyTooLow { got: Difficulty, min: Difficulty },

    #[error("wrong base chain height {got}, expected {expected}")]
    WrongAnchorHeight { got: u64, expected: u64 },

    #[error("no PoW seed for base chain height {height}")]
    SeedUnavailable { height: u64 },

    #[error("PoW hash could not be computed for share at height {height}")]
    PowUnavailable { height: u64 },

    #[error("not enough PoW for difficulty {difficulty} at height {height}")]
    PowTooWeak { difficulty: Difficulty, height: u64 },
}

/// What happened to an accepted (non-penalized) external block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    /// Inserted; `missing` lists referenced parent/uncle ids the store does
    /// not have yet, in case the caller wants to fetch them.
    Added { missing: Vec<Hash> },
    /// A block with this id is already in the store.
    AlreadyKnown,
    /// Difficulty is under half the window minimum: dropped as probable
    /// spam, but not worth penalizing (it may be an honest alternate).
    BelowWindowMinimum,
}
