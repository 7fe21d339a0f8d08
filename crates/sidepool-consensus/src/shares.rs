//! PPLNS share accounting and exact reward splitting.

use crate::{ConsensusError, ConsensusResult};
use sidepool_types::WalletAddress;
use tracing::error;

/// One miner's weight inside a PPLNS window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinerShare {
    pub weight: u64,
    pub wallet: WalletAddress,
}

impl MinerShare {
    pub fn new(weight: u64, wallet: WalletAddress) -> Self {
        MinerShare { weight, wallet }
    }
}

/// The slice of an uncle's weight that goes to the block including it.
pub fn uncle_penalty(uncle_weight: u64, penalty_percent: u64) -> u64 {
    ((uncle_weight as u128 * penalty_percent as u128) / 100) as u64
}

/// Combine shares with the same wallet, leaving the list sorted by wallet.
///
/// The wallet ordering fixes the coinbase output order, so it must be
/// identical on every node.
pub fn merge_shares(shares: &mut Vec<MinerShare>) {
    shares.sort_by(|a, b| a.wallet.cmp(&b.wallet));
    shares.dedup_by(|cur, kept| {
        if cur.wallet == kept.wallet {
            kept.weight += cur.weight;
            true
        } else {
            false
        }
    });
}

/// Split `reward` across `shares` proportionally to weight, exactly.
///
/// Uses prefix allocations `A(k) = floor(prefix_weight_k * reward / total)`
/// and pays out the differences, so the amounts sum to `reward` with no
/// remainder regardless of rounding. Intermediates are 128-bit.
pub fn split_reward(reward: u64, shares: &[MinerShare]) -> ConsensusResult<Vec<u64>> {
    if shares.is_empty() {
        return Err(ConsensusError::EmptyWindow);
    }

    let total_weight: u64 = shares.iter().map(|share| share.weight).sum();
    if total_weight == 0 {
        return Err(ConsensusError::ZeroTotalWeight);
    }

    let mut rewards = Vec::with_capacity(shares.len());
    let mut prefix_weight: u64 = 0;
    let mut reward_given: u64 = 0;
    for share in shares {
        prefix_weight += share.weight;
        let allocated = ((prefix_weight as u128 * reward as u128) / total_weight as u128) as u64;
        rewards.push(allocated - reward_given);
        reward_given = allocated;
    }

    // Every unit must have been handed out; math says so, but check anyway.
    if reward_given != reward {
        error!(
            distributed = reward_given,
            expected = reward,
            "reward split mismatch"
        );
        return Err(ConsensusError::RewardMismatch {
            distributed: reward_given,
            expected: reward,
        });
    }

    Ok(rewards)
}
