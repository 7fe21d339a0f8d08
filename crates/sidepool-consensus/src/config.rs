//! Sidechain configuration and validation.
//!
//! Two pools with different configurations are disjoint networks: every
//! field here feeds the consensus id. Ranges are enforced at construction
//! and out-of-range values are fatal.

use crate::params;
use serde::{Deserialize, Serialize};
use sidepool_types::Difficulty;
use thiserror::Error;
use tracing::info;

/// Pool-wide consensus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidechainConfig {
    /// Pool name, 1..=128 characters.
    #[serde(default = "default_pool_name")]
    pub pool_name: String,
    /// Pool password, up to 128 characters. Part of the consensus id, so a
    /// non-empty password makes the pool private.
    #[serde(default)]
    pub pool_password: String,
    /// Target seconds between share-chain blocks.
    #[serde(default = "default_target_block_time")]
    pub target_block_time: u64,
    /// Difficulty floor for every block on the chain.
    #[serde(default = "default_min_difficulty")]
    pub min_difficulty: u64,
    /// PPLNS window size in blocks (W).
    #[serde(default = "default_chain_window_size")]
    pub chain_window_size: u64,
    /// Percent of an uncle's weight handed to the block that includes it.
    #[serde(default = "default_uncle_penalty")]
    pub uncle_penalty: u64,
}

fn default_pool_name() -> String {
    "default".to_string()
}

fn default_target_block_time() -> u64 {
    1
}

fn default_min_difficulty() -> u64 {
    params::MIN_DIFFICULTY
}

fn default_chain_window_size() -> u64 {
    params::MAX_CHAIN_WINDOW_SIZE
}

fn default_uncle_penalty() -> u64 {
    20
}

impl Default for SidechainConfig {
    fn default() -> Self {
        Self {
            pool_name: default_pool_name(),
            pool_password: String::new(),
            target_block_time: default_target_block_time(),
            min_difficulty: default_min_difficulty(),
            chain_window_size: default_chain_window_size(),
            uncle_penalty: default_uncle_penalty(),
        }
    }
}

impl SidechainConfig {
    /// The configured difficulty floor as a [`Difficulty`].
    pub fn min_difficulty(&self) -> Difficulty {
        Difficulty::from(self.min_difficulty)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_name.is_empty() {
            return Err(ConfigError::EmptyPoolName);
        }
        if self.pool_name.len() > params::MAX_POOL_NAME_LEN {
            return Err(ConfigError::PoolNameTooLong {
                len: self.pool_name.len(),
            });
        }
        if self.pool_password.len() > params::MAX_POOL_PASSWORD_LEN {
            return Err(ConfigError::PoolPasswordTooLong {
                len: self.pool_password.len(),
            });
        }
        if self.target_block_time < params::MIN_TARGET_BLOCK_TIME
            || self.target_block_time > params::MAX_TARGET_BLOCK_TIME
        {
            return Err(ConfigError::TargetBlockTimeOutOfRange {
                got: self.target_block_time,
            });
        }
        if self.min_difficulty < params::MIN_DIFFICULTY
            || self.min_difficulty > params::MAX_MIN_DIFFICULTY
        {
            return Err(ConfigError::MinDifficultyOutOfRange {
                got: self.min_difficulty,
            });
        }
        if self.chain_window_size < params::MIN_CHAIN_WINDOW_SIZE
            || self.chain_window_size > params::MAX_CHAIN_WINDOW_SIZE
        {
            return Err(ConfigError::ChainWindowSizeOutOfRange {
                got: self.chain_window_size,
            });
        }
        if self.uncle_penalty < params::MIN_UNCLE_PENALTY
            || self.uncle_penalty > params::MAX_UNCLE_PENALTY
        {
            return Err(ConfigError::UnclePenaltyOutOfRange {
                got: self.uncle_penalty,
            });
        }

        info!(
            pool_name = %self.pool_name,
            block_time = self.target_block_time,
            min_difficulty = self.min_difficulty,
            pplns_window = self.chain_window_size,
            uncle_penalty = self.uncle_penalty,
            "sidechain config accepted"
        );
        Ok(())
    }
}

/// Configuration validation errors. All fatal at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pool name can't be empty")]
    EmptyPoolName,

    #[error("pool name is too long ({len} characters, max 128)")]
    PoolNameTooLong { len: usize },

    #[error("pool password is too long ({len} characters, max 128)")]
    PoolPasswordTooLong { len: usize },

    #[error("target block time {got} is out of range (must be 1..=120 seconds)")]
    TargetBlockTimeOutOfRange { got: u64 },

    #[error("minimum difficulty {got} is out of range (must be 1000..=1000000000)")]
    MinDifficultyOutOfRange { got: u64 },

    #[error("chain window size {got} is out of range (must be 60..=2160 blocks)")]
    ChainWindowSizeOutOfRange { got: u64 },

    #[error("uncle penalty {got}% is out of range (must be 1..=99)")]
    UnclePenaltyOutOfRange { got: u64 },
}
