//! PPLNS window walkers.
//!
//! Both walkers start at a tip (which need not be in the store — local
//! block templates are weighed before insertion) and follow parent links
//! for up to `chain_window_size` blocks, folding in uncles that are still
//! inside the window. A missing ancestor aborts the walk with a transient
//! error; the caller decides what that means.

use crate::{BlockStore, ChainError, ChainResult};
use sidepool_consensus::{
    merge_shares, next_difficulty, uncle_penalty, DifficultySample, MinerShare, SidechainConfig,
};
use sidepool_types::{Difficulty, PoolBlock};
use tracing::debug;

/// Collect the merged (wallet, weight) list for the window ending at `tip`.
///
/// Each visited block contributes its difficulty's low 64 bits. An uncle
/// still inside the window contributes its weight minus the penalty, which
/// is credited to the block that included it.
pub(crate) fn get_shares(
    store: &BlockStore,
    config: &SidechainConfig,
    tip: &PoolBlock,
) -> ChainResult<Vec<MinerShare>> {
    let window = config.chain_window_size;
    let mut shares: Vec<MinerShare> = Vec::with_capacity(window as usize * 2);

    let mut cur = tip;
    let mut block_depth = 0u64;
    loop {
        let mut cur_weight = cur.difficulty.lo64();

        for uncle_id in &cur.uncles {
            let Some(uncle) = store.get(uncle_id) else {
                debug!(
                    height = cur.sidechain_height,
                    uncle = %uncle_id,
                    tip = %tip.sidechain_id,
                    "get_shares: uncle not in store"
                );
                return Err(ChainError::MissingUncle {
                    uncle: *uncle_id,
                    height: cur.sidechain_height,
                });
            };

            // Uncles that fell out of the window earn nothing.
            if tip.sidechain_height - uncle.sidechain_height >= window {
                continue;
            }

            let penalty = uncle_penalty(uncle.difficulty.lo64(), config.uncle_penalty);
            cur_weight += penalty;
            shares.push(MinerShare::new(
                uncle.difficulty.lo64() - penalty,
                uncle.miner_wallet,
            ));
        }

        shares.push(MinerShare::new(cur_weight, cur.miner_wallet));

        block_depth += 1;
        if block_depth >= window || cur.sidechain_height == 0 {
            break;
        }

        cur = store.parent_of(cur).ok_or_else(|| {
            debug!(
                height = cur.sidechain_height - 1,
                parent = %cur.parent,
                tip = %tip.sidechain_id,
                "get_shares: parent not in store"
            );
            ChainError::MissingParent {
                parent: cur.parent,
                height: cur.sidechain_height,
            }
        })?;
    }

    merge_shares(&mut shares);
    debug!(wallets = shares.len(), "unique wallets in PPLNS window");
    Ok(shares)
}

/// Gather retarget samples for the window ending at `tip`.
pub(crate) fn difficulty_samples(
    store: &BlockStore,
    config: &SidechainConfig,
    tip: &PoolBlock,
) -> ChainResult<Vec<DifficultySample>> {
    let window = config.chain_window_size;
    let mut samples = Vec::with_capacity(window as usize);

    let mut cur = tip;
    let mut block_depth = 0u64;
    loop {
        samples.push(DifficultySample {
            timestamp: cur.timestamp,
            cumulative_difficulty: cur.cumulative_difficulty,
        });

        for uncle_id in &cur.uncles {
            let Some(uncle) = store.get(uncle_id) else {
                debug!(
                    height = cur.sidechain_height,
                    uncle = %uncle_id,
                    "difficulty_samples: uncle not in store"
                );
                return Err(ChainError::MissingUncle {
                    uncle: *uncle_id,
                    height: cur.sidechain_height,
                });
            };
            if tip.sidechain_height - uncle.sidechain_height < window {
                samples.push(DifficultySample {
                    timestamp: uncle.timestamp,
                    cumulative_difficulty: uncle.cumulative_difficulty,
                });
            }
        }

        block_depth += 1;
        if block_depth >= window || cur.sidechain_height == 0 {
            break;
        }

        cur = store.parent_of(cur).ok_or_else(|| {
            debug!(
                height = cur.sidechain_height - 1,
                parent = %cur.parent,
                "difficulty_samples: parent not in store"
            );
            ChainError::MissingParent {
                parent: cur.parent,
                height: cur.sidechain_height,
            }
        })?;
    }

    Ok(samples)
}

/// Difficulty required of the block after `tip`.
pub(crate) fn next_difficulty_for(
    store: &BlockStore,
    config: &SidechainConfig,
    tip: &PoolBlock,
) -> ChainResult<Difficulty> {
    let samples = difficulty_samples(store, config, tip)?;
    Ok(next_difficulty(
        &samples,
        config.target_block_time,
        config.min_difficulty(),
    )?)
}
