//! Property-based tests for the consensus invariants.
//!
//! The pure math (reward splitting, share merging, retargeting) gets
//! proptest strategies with shrinking; the graph-level invariants
//! (cumulative identity, insertion commutativity, prune safety) run over
//! deterministic generated chains with seeded shuffles.

use crate::generators::{init_test_logging, test_wallet, TestChain};
use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sidepool_consensus::{
    merge_shares, next_difficulty, split_reward, DifficultySample, MinerShare, SidechainConfig,
};
use sidepool_types::Difficulty;

// ============================================================================
// Proptest strategies
// ============================================================================

fn arb_shares() -> impl Strategy<Value = Vec<MinerShare>> {
    prop::collection::vec((1u64..=u32::MAX as u64, 0u8..=15), 1..50).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(weight, wallet_tag)| MinerShare::new(weight, test_wallet(wallet_tag)))
            .collect()
    })
}

fn arb_samples() -> impl Strategy<Value = Vec<DifficultySample>> {
    prop::collection::vec((0u64..=1_000_000_000, 1_000u128..=1u128 << 80), 1..200).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(timestamp, cumulative)| DifficultySample {
                    timestamp,
                    cumulative_difficulty: Difficulty(cumulative),
                })
                .collect()
        },
    )
}

proptest! {
    /// P1: the split hands out the reward exactly, never more, never less.
    #[test]
    fn reward_is_conserved(reward in any::<u64>(), shares in arb_shares()) {
        let rewards = split_reward(reward, &shares).unwrap();
        prop_assert_eq!(rewards.len(), shares.len());
        prop_assert_eq!(rewards.iter().sum::<u64>(), reward);
    }

    /// P1 corollary: nobody with a heavier share receives less on sorted
    /// equal-weight input (allocation is monotone in prefix weight).
    #[test]
    fn equal_weights_split_near_evenly(
        reward in any::<u64>(),
        count in 1usize..40,
        weight in 1u64..=u32::MAX as u64,
    ) {
        let shares: Vec<MinerShare> = (0..count)
            .map(|i| MinerShare::new(weight, test_wallet(i as u8)))
            .collect();
        let rewards = split_reward(reward, &shares).unwrap();
        let low = *rewards.iter().min().unwrap();
        let high = *rewards.iter().max().unwrap();
        prop_assert!(high - low <= 1, "equal weights must split within one unit");
    }

    /// P2 (merge half): merging is order-insensitive and wallet-sorted.
    #[test]
    fn share_merging_is_order_insensitive(shares in arb_shares(), seed in any::<u64>()) {
        let mut sorted = shares.clone();
        merge_shares(&mut sorted);

        let mut shuffled = shares;
        shuffled.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed));
        merge_shares(&mut shuffled);

        prop_assert_eq!(&sorted, &shuffled);
        prop_assert!(sorted.windows(2).all(|pair| pair[0].wallet < pair[1].wallet));
    }

    /// P6: retarget output never drops below the configured minimum.
    #[test]
    fn retarget_respects_difficulty_floor(samples in arb_samples()) {
        let min = Difficulty(1000);
        let next = next_difficulty(&samples, 10, min).unwrap();
        prop_assert!(next >= min);
    }
}

// ============================================================================
// Graph-level invariants
// ============================================================================

/// A chain shape with sibling forks and uncle references at several
/// heights, ending in a unique heaviest tip.
fn braided_chain() -> TestChain {
    let mut t = TestChain::new();
    let genesis = t.make_genesis(1).sidechain_id;

    let a1 = t.make_child(&genesis, &[], 1).sidechain_id;
    let b1 = t.make_child(&genesis, &[], 2).sidechain_id;

    let a2 = t.make_child(&a1, &[b1], 1).sidechain_id;
    let b2 = t.make_child(&a1, &[], 3).sidechain_id;

    let a3 = t.make_child(&a2, &[b2], 2).sidechain_id;
    let a4 = t.make_child(&a3, &[], 1).sidechain_id;
    t.make_child(&a4, &[], 3);

    t
}

/// P3: every verified valid block satisfies the cumulative-difficulty
/// identity.
#[test]
fn cumulative_difficulty_identity_holds() {
    let t = braided_chain();
    for id in t.build_order.clone() {
        let block = t.blocks[&id].clone();
        t.engine.chain.add_block(block);
    }

    let mut checked = 0;
    for id in &t.build_order {
        let stored = t.engine.chain.get_block(id).unwrap();
        if !stored.verified || stored.invalid {
            continue;
        }
        if stored.sidechain_height == 0 {
            continue;
        }
        let parent = t.engine.chain.get_block(&stored.parent).unwrap();
        let uncle_sum: Difficulty = stored
            .uncles
            .iter()
            .map(|uncle_id| t.engine.chain.get_block(uncle_id).unwrap().difficulty)
            .sum();
        assert_eq!(
            stored.cumulative_difficulty,
            parent.cumulative_difficulty + stored.difficulty + uncle_sum,
            "identity broken at {id}"
        );
        checked += 1;
    }
    assert!(checked >= 6, "the braid must actually get verified");
}

/// P4: verified valid blocks never carry out-of-range or duplicate uncles.
#[test]
fn uncle_constraints_hold_for_every_valid_block() {
    let mut t = braided_chain();

    // Sprinkle in hostile blocks: duplicate uncles, out-of-range uncles.
    // The oracle copies must match what gets inserted, so write the
    // corrupted versions back.
    let genesis = t.build_order[0];
    let a1 = t.build_order[1];
    let b1 = t.build_order[2];
    let a4 = t.build_order[6];
    let mut dup = t.make_child(&a1, &[b1], 4);
    dup.uncles = vec![b1, b1];
    t.blocks.insert(dup.sidechain_id, dup.clone());
    let mut far = t.make_child(&a4, &[genesis], 4);
    far.uncles = vec![genesis];
    t.blocks.insert(far.sidechain_id, far.clone());

    for id in t.build_order.clone() {
        let block = t.blocks[&id].clone();
        t.engine.chain.add_block(block);
    }

    assert!(t.engine.chain.get_block(&dup.sidechain_id).unwrap().invalid);
    assert!(t.engine.chain.get_block(&far.sidechain_id).unwrap().invalid);

    for id in &t.build_order {
        let stored = t.engine.chain.get_block(id).unwrap();
        if !stored.verified || stored.invalid {
            continue;
        }
        assert!(stored
            .uncles
            .windows(2)
            .all(|pair| pair[0] < pair[1]));
        for uncle_id in &stored.uncles {
            let uncle = t.engine.chain.get_block(uncle_id).unwrap();
            assert!(uncle.sidechain_height < stored.sidechain_height);
            assert!(uncle.sidechain_height + 3 >= stored.sidechain_height);
        }
    }
}

/// P8: re-adding every block (and re-running verification) changes nothing.
#[test]
fn verification_is_idempotent() {
    let t = braided_chain();
    for id in t.build_order.clone() {
        let block = t.blocks[&id].clone();
        t.engine.chain.add_block(block);
    }

    let tip_before = t.engine.chain.tip_id();
    let flags_before: Vec<_> = t
        .build_order
        .iter()
        .map(|id| {
            let b = t.engine.chain.get_block(id).unwrap();
            (b.verified, b.invalid, b.depth)
        })
        .collect();

    for id in t.build_order.clone() {
        let block = t.blocks[&id].clone();
        t.engine.chain.add_block(block);
    }

    let flags_after: Vec<_> = t
        .build_order
        .iter()
        .map(|id| {
            let b = t.engine.chain.get_block(id).unwrap();
            (b.verified, b.invalid, b.depth)
        })
        .collect();

    assert_eq!(tip_before, t.engine.chain.tip_id());
    assert_eq!(flags_before, flags_after);
}

/// P9 (+P2's engine half): any arrival order produces the same flags and
/// the same tip.
#[test]
fn insertion_order_does_not_matter() {
    let t = braided_chain();

    let reference = {
        let engine = t.fresh_engine();
        for id in &t.build_order {
            engine.chain.add_block(t.blocks[id].clone());
        }
        (
            engine.chain.tip_id(),
            t.build_order
                .iter()
                .map(|id| {
                    let b = engine.chain.get_block(id).unwrap();
                    (b.verified, b.invalid)
                })
                .collect::<Vec<_>>(),
        )
    };

    for seed in 0..8u64 {
        let mut order = t.build_order.clone();
        order.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed));

        let engine = t.fresh_engine();
        for id in &order {
            engine.chain.add_block(t.blocks[id].clone());
        }

        let tip = engine.chain.tip_id();
        let flags: Vec<_> = t
            .build_order
            .iter()
            .map(|id| {
                let b = engine.chain.get_block(id).unwrap();
                (b.verified, b.invalid)
            })
            .collect();

        assert_eq!(reference.0, tip, "tip diverged for seed {seed}");
        assert_eq!(reference.1, flags, "flags diverged for seed {seed}");
    }
}

/// P7: pruning never removes anything shallow, and what remains keeps its
/// references resolvable or below the horizon.
#[test]
fn pruning_is_safe() {
    init_test_logging();
    let config = SidechainConfig {
        chain_window_size: 60,
        ..SidechainConfig::default()
    };
    // prune_distance = 2*60 + 120/1 = 240.
    let mut t = TestChain::with_config(config);
    let genesis = t.make_genesis(1);
    let genesis_id = genesis.sidechain_id;
    t.engine.chain.add_block(genesis);
    t.extend(&genesis_id, 260, 1);

    let tip = t
        .engine
        .chain
        .get_block(&t.engine.chain.tip_id().unwrap())
        .unwrap();
    assert_eq!(tip.sidechain_height, 260);
    let cutoff = tip.sidechain_height - 240;

    for id in &t.build_order {
        let oracle = &t.blocks[id];
        let stored = t.engine.chain.get_block(id);
        if oracle.sidechain_height > cutoff {
            // Everything above the horizon survives, shallow blocks with it.
            let stored = stored.unwrap_or_else(|| {
                panic!("block at height {} was pruned", oracle.sidechain_height)
            });
            // References resolve or point below the horizon.
            if !stored.parent.is_zero() {
                let parent_present = t.engine.chain.has_block(&stored.parent);
                let parent_height = t.blocks[&stored.parent].sidechain_height;
                assert!(parent_present || parent_height <= cutoff);
            }
        } else {
            // Deep linear history (depth >= 2W by construction) qualifies
            // and must be gone.
            assert!(
                stored.is_none(),
                "block at height {} should have been pruned",
                oracle.sidechain_height
            );
        }
    }

    // Nothing shallow was removed: every pruned block sat at least
    // prune_distance below the tip, so its depth on this linear chain was
    // at least 240 > 2W.
    assert!(t.engine.chain.has_block(&t.build_order[cutoff as usize + 1]));
}
