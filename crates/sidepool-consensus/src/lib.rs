//! # sidepool-consensus
//!
//! Consensus rules for the sidepool share chain.
//!
//! This crate provides the pure (storage-free) half of the engine:
//! - PPLNS share merging and exact proportional reward splitting
//! - Difficulty retargeting over a trimmed window of samples
//! - The private consensus id binding a pool to its configuration
//! - Configuration validation
//!
//! Everything here is deterministic: two nodes with the same inputs produce
//! byte-identical outputs, which is what lets every honest node agree on
//! coinbase payouts without coordination.

mod config;
mod consensus_id;
mod error;
mod retarget;
mod shares;

pub use config::{ConfigError, SidechainConfig};
pub use consensus_id::ConsensusId;
pub use error::{ConsensusError, ConsensusResult};
pub use retarget::{next_difficulty, DifficultySample};
pub use shares::{merge_shares, split_reward, uncle_penalty, MinerShare};

/// Share-chain consensus constants.
pub mod params {
    /// How far back (in heights) a block may reference an uncle.
    pub const UNCLE_BLOCK_DEPTH: u64 = 3;

    /// Hard floor for any difficulty value on the chain.
    pub const MIN_DIFFICULTY: u64 = 1000;

    /// Upper bound for the configured minimum difficulty.
    pub const MAX_MIN_DIFFICULTY: u64 = 1_000_000_000;

    /// PPLNS window bounds (blocks).
    pub const MIN_CHAIN_WINDOW_SIZE: u64 = 60;
    pub const MAX_CHAIN_WINDOW_SIZE: u64 = 2160;

    /// Uncle penalty bounds (percent).
    pub const MIN_UNCLE_PENALTY: u64 = 1;
    pub const MAX_UNCLE_PENALTY: u64 = 99;

    /// Target block time bounds (seconds).
    pub const MIN_TARGET_BLOCK_TIME: u64 = 1;
    pub const MAX_TARGET_BLOCK_TIME: u64 = 120;

    /// Name/password length caps (bytes).
    pub const MAX_POOL_NAME_LEN: usize = 128;
    pub const MAX_POOL_PASSWORD_LEN: usize = 128;
}
