//! Consensus verification of a single block against its ancestors.
//!
//! [`check_block`] is read-only: it inspects the candidate and the store
//! and returns a [`Verdict`]. The caller applies the verdict to the stored
//! block afterwards, which keeps the borrow story simple and makes
//! verification trivially idempotent — a verified block is never
//! re-checked.
//!
//! Rules run in a fixed order and the first failure decides the block.
//! A missing (or not-yet-verified) ancestor is not a failure: the verdict
//! is [`Verdict::Pending`] and the block waits for more data.

use crate::{store::BlockStore, window};
use sidepool_consensus::{params::UNCLE_BLOCK_DEPTH, split_reward, SidechainConfig};
use sidepool_types::{Difficulty, Hash, PoolBlock};
use thiserror::Error;

/// Outcome of checking one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Required ancestors are missing or unverified; try again later.
    Pending,
    /// All rules passed.
    Valid,
    /// A rule failed; the block is permanently invalid.
    Invalid(InvalidReason),
}

/// Why a block was found invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    #[error("genesis block has a parent, uncles, or non-minimum difficulty")]
    MalformedGenesis,

    #[error("non-genesis block has an empty parent hash")]
    EmptyParent,

    #[error("parent {parent} is invalid")]
    InvalidParent { parent: Hash },

    #[error("wrong height {got}, expected {expected}")]
    WrongHeight { got: u64, expected: u64 },

    #[error("uncle hashes are not strictly ascending")]
    UncleOrder,

    #[error("empty uncle hash")]
    EmptyUncle,

    #[error("uncle {uncle} has already been mined in this window")]
    UncleAlreadyMined { uncle: Hash },

    #[error("uncle {uncle} is invalid")]
    InvalidUncle { uncle: Hash },

    #[error("uncle {uncle} is at the wrong height {uncle_height}")]
    UncleWrongHeight { uncle: Hash, uncle_height: u64 },

    #[error("uncle {uncle} is from a different chain")]
    UncleForeignChain { uncle: Hash },

    #[error("wrong cumulative difficulty {got}, expected {expected}")]
    WrongCumulativeDifficulty { got: Difficulty, expected: Difficulty },

    #[error("wrong difficulty {got}, expected {expected}")]
    WrongDifficulty { got: Difficulty, expected: Difficulty },

    #[error("difficulty of the window could not be computed")]
    RetargetFailed,

    #[error("shares of the window could not be computed")]
    SharesUnavailable,

    #[error("wrong output count {got}, expected {expected}")]
    WrongOutputCount { got: usize, expected: usize },

    #[error("wrong reward {got} at output {index}, expected {expected}")]
    WrongReward { index: usize, got: u64, expected: u64 },

    #[error("output {index} pays an unexpected one-time key")]
    WrongOutputKey { index: usize },
}

/// Check `block` against the consensus rules.
pub(crate) fn check_block(
    store: &BlockStore,
    config: &SidechainConfig,
    block: &PoolBlock,
) -> Verdict {
    let min_difficulty = config.min_difficulty();
    let window = config.chain_window_size;

    // Genesis blocks carry fixed fields and nothing else.
    if block.sidechain_height == 0 {
        if !block.parent.is_zero()
            || !block.uncles.is_empty()
            || block.difficulty != min_difficulty
            || block.cumulative_difficulty != min_difficulty
        {
            return Verdict::Invalid(InvalidReason::MalformedGenesis);
        }
        return Verdict::Valid;
    }

    // A block buried deeper than twice the window can't influence any
    // payout and has the whole network mined on top of it; accept it as-is
    // so pruning can make progress below it.
    if block.depth >= window * 2 {
        return Verdict::Valid;
    }

    if block.parent.is_zero() {
        return Verdict::Invalid(InvalidReason::EmptyParent);
    }

    let Some(parent) = store.get(&block.parent) else {
        return Verdict::Pending;
    };
    if !parent.verified {
        return Verdict::Pending;
    }
    if parent.invalid {
        return Verdict::Invalid(InvalidReason::InvalidParent {
            parent: block.parent,
        });
    }

    let expected_height = parent.sidechain_height + 1;
    if block.sidechain_height != expected_height {
        return Verdict::Invalid(InvalidReason::WrongHeight {
            got: block.sidechain_height,
            expected: expected_height,
        });
    }

    // Ascending order with no duplicates, so the same uncle can't be
    // claimed twice in one block.
    if block.uncles.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Verdict::Invalid(InvalidReason::UncleOrder);
    }

    let mut expected_cumulative = parent.cumulative_difficulty + block.difficulty;

    // Blocks already paid out in the previous UNCLE_BLOCK_DEPTH heights
    // (as blocks or as uncles) can't be claimed again.
    let mut mined_in_window: Vec<Hash> = Vec::new();
    if !block.uncles.is_empty() {
        mined_in_window.reserve(UNCLE_BLOCK_DEPTH as usize * 2 + 1);
        let mut cur = Some(parent);
        for _ in 0..UNCLE_BLOCK_DEPTH.min(block.sidechain_height + 1) {
            let Some(ancestor) = cur else { break };
            mined_in_window.push(ancestor.sidechain_id);
            mined_in_window.extend_from_slice(&ancestor.uncles);
            cur = store.parent_of(ancestor);
        }
    }

    for uncle_id in &block.uncles {
        // The empty hash belongs to genesis parents only.
        if uncle_id.is_zero() {
            return Verdict::Invalid(InvalidReason::EmptyUncle);
        }

        if mined_in_window.contains(uncle_id) {
            return Verdict::Invalid(InvalidReason::UncleAlreadyMined { uncle: *uncle_id });
        }

        let Some(uncle) = store.get(uncle_id) else {
            return Verdict::Pending;
        };
        if !uncle.verified {
            return Verdict::Pending;
        }
        if uncle.invalid {
            return Verdict::Invalid(InvalidReason::InvalidUncle { uncle: *uncle_id });
        }

        if uncle.sidechain_height >= block.sidechain_height
            || uncle.sidechain_height + UNCLE_BLOCK_DEPTH < block.sidechain_height
        {
            return Verdict::Invalid(InvalidReason::UncleWrongHeight {
                uncle: *uncle_id,
                uncle_height: uncle.sidechain_height,
            });
        }

        if !shares_chain_with_parent(store, block, parent, uncle) {
            return Verdict::Invalid(InvalidReason::UncleForeignChain { uncle: *uncle_id });
        }

        expected_cumulative += uncle.difficulty;
    }

    if block.cumulative_difficulty != expected_cumulative {
        return Verdict::Invalid(InvalidReason::WrongCumulativeDifficulty {
            got: block.cumulative_difficulty,
            expected: expected_cumulative,
        });
    }

    // Difficulty and payout checks only matter inside the PPLNS window;
    // deeper blocks were witnessed by the network long ago.
    if block.depth >= window {
        return Verdict::Valid;
    }

    let expected_difficulty = match window::next_difficulty_for(store, config, parent) {
        Ok(difficulty) => difficulty,
        Err(_) => return Verdict::Invalid(InvalidReason::RetargetFailed),
    };
    if block.difficulty != expected_difficulty {
        return Verdict::Invalid(InvalidReason::WrongDifficulty {
            got: block.difficulty,
            expected: expected_difficulty,
        });
    }

    let Ok(shares) = window::get_shares(store, config, block) else {
        return Verdict::Invalid(InvalidReason::SharesUnavailable);
    };

    if shares.len() != block.outputs.len() {
        return Verdict::Invalid(InvalidReason::WrongOutputCount {
            got: block.outputs.len(),
            expected: shares.len(),
        });
    }

    let total_reward = block.total_reward();
    let Ok(rewards) = split_reward(total_reward, &shares) else {
        return Verdict::Invalid(InvalidReason::SharesUnavailable);
    };

    for (index, (output, (share, reward))) in block
        .outputs
        .iter()
        .zip(shares.iter().zip(rewards.iter()))
        .enumerate()
    {
        if output.reward != *reward {
            return Verdict::Invalid(InvalidReason::WrongReward {
                index,
                got: output.reward,
                expected: *reward,
            });
        }

        let expected_key = share
            .wallet
            .derive_ephemeral_pubkey(&block.txkey_sec, index as u64);
        if output.eph_public_key != expected_key {
            return Verdict::Invalid(InvalidReason::WrongOutputKey { index });
        }
    }

    Verdict::Valid
}

/// Whether `uncle` and `parent` reach a common ancestor within
/// `UNCLE_BLOCK_DEPTH` steps, i.e. the uncle forked off the same chain the
/// block extends.
pub(crate) fn shares_chain_with_parent(
    store: &BlockStore,
    block: &PoolBlock,
    parent: &PoolBlock,
    uncle: &PoolBlock,
) -> bool {
    // Walk the parent line down to the uncle's height first.
    let mut on_chain = parent;
    while on_chain.sidechain_height > uncle.sidechain_height {
        match store.parent_of(on_chain) {
            Some(ancestor) => on_chain = ancestor,
            None => return false,
        }
    }
    if on_chain.sidechain_height < uncle.sidechain_height {
        return false;
    }

    // Then walk both lines in lock-step looking for a shared parent.
    let mut side = uncle;
    for _ in 0..UNCLE_BLOCK_DEPTH {
        if on_chain.sidechain_height + UNCLE_BLOCK_DEPTH < block.sidechain_height {
            break;
        }
        if on_chain.parent == side.parent {
            return true;
        }
        match (store.parent_of(on_chain), store.parent_of(side)) {
            (Some(next_on_chain), Some(next_side)) => {
                on_chain = next_on_chain;
                side = next_side;
            }
            _ => break,
        }
    }
    false
}
