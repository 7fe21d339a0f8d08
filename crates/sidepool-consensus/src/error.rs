//! Error types for consensus calculations.

use thiserror::Error;

/// Errors from the pure consensus math.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConsensusError {
    /// The retarget or share window produced no usable entries.
    #[error("empty window")]
    EmptyWindow,

    /// Total share weight is zero, so a reward cannot be split.
    #[error("total share weight is zero")]
    ZeroTotalWeight,

    /// The split did not hand out the exact reward. Indicates a weight
    /// overflow upstream; the math itself cannot produce this.
    #[error("reward split mismatch: distributed {distributed}, expected {expected}")]
    RewardMismatch { distributed: u64, expected: u64 },

    /// `delta_diff * target_block_time` exceeded 128 bits.
    #[error("retarget overflow: difficulty delta {delta_diff} over {target_block_time}s window")]
    RetargetOverflow {
        delta_diff: u128,
        target_block_time: u64,
    },
}

/// Result type for consensus calculations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
