//! Chain selection between a current tip and a candidate.

use crate::collaborators::BaseChainClient;
use crate::params::STALE_ANCHOR_TOLERANCE;
use crate::store::BlockStore;
use sidepool_consensus::SidechainConfig;
use sidepool_types::{Difficulty, Hash, PoolBlock};
use tracing::{debug, info, warn};

/// Whether `candidate` carries a heavier chain than `current`.
///
/// Three stages, from cheap to paranoid:
/// 1. If both blocks trace to a common ancestor, cumulative difficulty
///    decides.
/// 2. Disjoint sub-graphs fall back to summing per-block difficulty over
///    the last window on each side.
/// 3. A heavier disjoint chain still loses unless its base-chain anchors
///    are near the current base-chain head, so a long-buried alternative
///    history can't displace the live chain.
///
/// Anything that fits none of the stages is "not longer".
pub(crate) fn is_longer_chain(
    store: &BlockStore,
    config: &SidechainConfig,
    base_chain: &dyn BaseChainClient,
    current: Option<&PoolBlock>,
    candidate: Option<&PoolBlock>,
) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    if !candidate.verified || candidate.invalid {
        return false;
    }
    let Some(current) = current else {
        return true;
    };

    // Equalize heights along the current line first.
    let mut current_ancestor = Some(current);
    while let Some(block) = current_ancestor {
        if block.sidechain_height <= candidate.sidechain_height {
            break;
        }
        current_ancestor = store.parent_of(block);
        if current_ancestor.is_none() {
            debug!(
                block = %block.parent,
                of = %current.sidechain_id,
                "fork choice: ancestor walk left the store"
            );
        }
    }

    if let Some(mut on_current) = current_ancestor {
        let mut candidate_ancestor = Some(candidate);
        while let Some(block) = candidate_ancestor {
            if block.sidechain_height <= on_current.sidechain_height {
                break;
            }
            candidate_ancestor = store.parent_of(block);
            if candidate_ancestor.is_none() {
                debug!(
                    block = %block.parent,
                    of = %candidate.sidechain_id,
                    "fork choice: ancestor walk left the store"
                );
            }
        }

        if let Some(mut on_candidate) = candidate_ancestor {
            loop {
                if on_current.parent == on_candidate.parent {
                    // Same chain: cumulative difficulty is comparable as-is.
                    return current.cumulative_difficulty < candidate.cumulative_difficulty;
                }
                match (store.parent_of(on_current), store.parent_of(on_candidate)) {
                    (Some(a), Some(b)) => {
                        on_current = a;
                        on_candidate = b;
                    }
                    _ => break,
                }
            }
        }
    }

    // Disjoint sub-graphs: total difficulty over the last window on each
    // side.
    let mut current_total = Difficulty::ZERO;
    let mut candidate_total = Difficulty::ZERO;

    let mut old_chain = Some(current);
    let mut new_chain = Some(candidate);

    let mut candidate_anchor_height = 0u64;
    let mut cached_prev_id = Hash::ZERO;

    for _ in 0..config.chain_window_size {
        if old_chain.is_none() && new_chain.is_none() {
            break;
        }
        if let Some(block) = old_chain {
            current_total += block.difficulty;
            old_chain = store.parent_of(block);
        }
        if let Some(block) = new_chain {
            candidate_total += block.difficulty;

            if block.prev_id != cached_prev_id {
                if let Some(header) = base_chain.header_by_hash(&block.prev_id) {
                    cached_prev_id = block.prev_id;
                    candidate_anchor_height = candidate_anchor_height.max(header.height);
                }
            }

            new_chain = store.parent_of(block);
        }
    }

    if current_total >= candidate_total {
        return false;
    }

    // Heavier, but is it built on anything recent?
    let base_height = base_chain.miner_data().height;
    if candidate_anchor_height + STALE_ANCHOR_TOLERANCE < base_height {
        warn!(
            anchor_height = candidate_anchor_height,
            base_height, "longer alternative chain is stale, ignoring it"
        );
        return false;
    }

    info!(
        from_height = current.sidechain_height,
        to_height = candidate.sidechain_height,
        from_cumulative = %current.cumulative_difficulty,
        to_cumulative = %candidate.cumulative_difficulty,
        "switching to a longer alternative chain"
    );
    true
}
