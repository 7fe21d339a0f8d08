//! The share-chain orchestrator.
//!
//! All state lives behind one mutex; every public operation locks it for
//! its whole duration, so the engine behaves as if single-threaded. The
//! expensive proof-of-work check in [`SideChain::add_external_block`] runs
//! outside the lock on purpose.

use crate::collaborators::{BaseChainClient, BlockRelay, Clock, PowHasher, TemplateNotifier};
use crate::error::{ChainError, ChainResult, IngressError, IngressOutcome};
use crate::fork_choice::is_longer_chain;
use crate::params::{BASE_BLOCK_TIME, SYNC_SPARE_SECONDS};
use crate::store::BlockStore;
use crate::verifier::{check_block, shares_chain_with_parent, Verdict};
use crate::window;
use parking_lot::Mutex;
use sidepool_consensus::{
    params::UNCLE_BLOCK_DEPTH, split_reward, ConfigError, ConsensusId, MinerShare, SidechainConfig,
};
use sidepool_types::{
    write_varint, Difficulty, Hash, PoolBlock, TxOutput, WalletAddress, TXOUT_TO_KEY,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything the engine needs from the rest of the node.
#[derive(Clone)]
pub struct Collaborators {
    pub base_chain: Arc<dyn BaseChainClient>,
    pub pow: Arc<dyn PowHasher>,
    pub relay: Arc<dyn BlockRelay>,
    pub template: Arc<dyn TemplateNotifier>,
    pub clock: Arc<dyn Clock>,
}

/// Mutable chain state guarded by the sidechain lock.
struct ChainState {
    store: BlockStore,
    tip: Option<Hash>,
    cur_difficulty: Difficulty,
}

/// A point-in-time summary of the chain, for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideChainStatus {
    pub base_height: u64,
    pub base_hashrate: u64,
    /// Number of blocks on the main share-chain path (tip height + 1).
    pub side_height: u64,
    pub pool_hashrate: u64,
    pub window_blocks: u64,
    pub window_uncles: u64,
    pub our_blocks: u64,
    pub our_uncles: u64,
    pub orphans: u64,
    pub our_orphans: u64,
    pub tip_age_seconds: u64,
}

/// The share-chain engine.
pub struct SideChain {
    config: SidechainConfig,
    consensus_id: ConsensusId,
    collaborators: Collaborators,
    state: Mutex<ChainState>,
}

impl SideChain {
    /// Validate `config`, derive the consensus id, and start with an empty
    /// graph.
    pub fn new(config: SidechainConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;

        info!("generating consensus id");
        let consensus_id = ConsensusId::derive(&config);
        info!(consensus_id = %consensus_id, "consensus id ready");

        let cur_difficulty = config.min_difficulty();
        Ok(SideChain {
            config,
            consensus_id,
            collaborators,
            state: Mutex::new(ChainState {
                store: BlockStore::new(),
                tip: None,
                cur_difficulty,
            }),
        })
    }

    /// The private identifier of this pool. Never sent over the wire.
    pub fn consensus_id(&self) -> &ConsensusId {
        &self.consensus_id
    }

    pub fn config(&self) -> &SidechainConfig {
        &self.config
    }

    pub fn chain_window_size(&self) -> u64 {
        self.config.chain_window_size
    }

    /// Difficulty the next block must carry.
    pub fn current_difficulty(&self) -> Difficulty {
        self.state.lock().cur_difficulty
    }

    pub fn tip_id(&self) -> Option<Hash> {
        self.state.lock().tip
    }

    pub fn has_block(&self, id: &Hash) -> bool {
        self.state.lock().store.contains(id)
    }

    /// Snapshot of a stored block, flags included.
    pub fn get_block(&self, id: &Hash) -> Option<PoolBlock> {
        self.state.lock().store.get(id).cloned()
    }

    /// Number of blocks currently in the store.
    pub fn block_count(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Record the block id as seen; true when this is the first sighting.
    /// Lets the relay layer drop duplicates before doing any real work.
    pub fn block_seen(&self, block: &PoolBlock) -> bool {
        self.state.lock().store.mark_seen(block.sidechain_id)
    }

    /// Populate a locally built block template and return the shares its
    /// coinbase must pay.
    ///
    /// Sets parent, height, difficulty, cumulative difficulty, and picks
    /// every eligible uncle from the last [`UNCLE_BLOCK_DEPTH`] heights:
    /// verified, valid, not already paid in the window, and provably on the
    /// same chain as the tip.
    pub fn fill_sidechain_data(
        &self,
        block: &mut PoolBlock,
        wallet: &WalletAddress,
        txkey_sec: Hash,
    ) -> ChainResult<Vec<MinerShare>> {
        let state = self.state.lock();

        block.miner_wallet = *wallet;
        block.txkey_sec = txkey_sec;
        block.uncles.clear();

        let Some(tip_id) = state.tip else {
            block.parent = Hash::ZERO;
            block.sidechain_height = 0;
            block.difficulty = self.config.min_difficulty();
            block.cumulative_difficulty = self.config.min_difficulty();
            return window::get_shares(&state.store, &self.config, block);
        };
        let tip = state
            .store
            .get(&tip_id)
            .ok_or(ChainError::UnknownBlock { id: tip_id })?;

        block.parent = tip_id;
        block.sidechain_height = tip.sidechain_height + 1;

        // Ids already paid out in the uncle range: the chain tip line and
        // everything it claimed as uncles.
        let mut mined_in_window: Vec<Hash> =
            Vec::with_capacity(UNCLE_BLOCK_DEPTH as usize * 2 + 1);
        let mut cur = Some(tip);
        for _ in 0..UNCLE_BLOCK_DEPTH.min(tip.sidechain_height + 1) {
            let Some(ancestor) = cur else { break };
            mined_in_window.push(ancestor.sidechain_id);
            mined_in_window.extend_from_slice(&ancestor.uncles);
            cur = state.store.parent_of(ancestor);
        }

        for offset in 0..UNCLE_BLOCK_DEPTH.min(tip.sidechain_height + 1) {
            for uncle_id in state.store.at_height(tip.sidechain_height - offset) {
                let Some(uncle) = state.store.get(uncle_id) else {
                    continue;
                };
                if !uncle.verified || uncle.invalid {
                    continue;
                }
                if mined_in_window.contains(uncle_id) {
                    continue;
                }

                if shares_chain_with_parent(&state.store, block, tip, uncle) {
                    debug!(
                        template_height = block.sidechain_height,
                        uncle = %uncle_id,
                        uncle_height = uncle.sidechain_height,
                        "added uncle to block template"
                    );
                    block.uncles.push(*uncle_id);
                } else {
                    debug!(
                        template_height = block.sidechain_height,
                        uncle = %uncle_id,
                        uncle_height = uncle.sidechain_height,
                        "candidate uncle is not on our chain"
                    );
                }
            }
        }

        block.uncles.sort();
        block.uncles.dedup();

        block.difficulty = state.cur_difficulty;
        block.cumulative_difficulty = tip.cumulative_difficulty + block.difficulty;
        for uncle_id in &block.uncles {
            match state.store.get(uncle_id) {
                Some(uncle) => block.cumulative_difficulty += uncle.difficulty,
                None => error!(uncle = %uncle_id, "block template references an unknown uncle"),
            }
        }

        window::get_shares(&state.store, &self.config, block)
    }

    /// Vet and ingest a block received from a peer.
    ///
    /// The spam filters and the proof-of-work check run before insertion;
    /// an `Err` is grounds for penalizing the sender, while
    /// [`IngressOutcome::BelowWindowMinimum`] is a silent drop.
    pub fn add_external_block(&self, block: PoolBlock) -> Result<IngressOutcome, IngressError> {
        let min_difficulty = self.config.min_difficulty();
        if block.difficulty < min_difficulty {
            warn!(
                got = %block.difficulty,
                min = %min_difficulty,
                "external block difficulty below pool minimum"
            );
            return Err(IngressError::DifficultyTooLow {
                got: block.difficulty,
                min: min_difficulty,
            });
        }

        let min_accepted = {
            let state = self.state.lock();
            if state.store.contains(&block.sidechain_id) {
                debug!(id = %block.sidechain_id, "external block already in the store");
                return Ok(IngressOutcome::AlreadyKnown);
            }

            // Smallest difficulty across the current window, halved below to
            // leave room for honest alternative chains. Anti-spam only.
            let mut min_window = state.cur_difficulty;
            let tip_height = state
                .tip
                .and_then(|id| state.store.get(&id))
                .map_or(0, |tip| tip.sidechain_height);
            let mut cur = state.tip.and_then(|id| state.store.get(&id));
            while let Some(ancestor) = cur {
                if ancestor.sidechain_height + self.config.chain_window_size <= tip_height {
                    break;
                }
                min_window = min_window.min(ancestor.difficulty);
                cur = state.store.parent_of(ancestor);
            }
            min_window.halved()
        };

        debug!(
            height = block.sidechain_height,
            id = %block.sidechain_id,
            base_height = block.txin_gen_height,
            "add_external_block"
        );

        if block.difficulty < min_accepted {
            warn!(
                got = %block.difficulty,
                min = %min_accepted,
                "external block difficulty below window minimum, ignoring it"
            );
            return Ok(IngressOutcome::BelowWindowMinimum);
        }

        // The anchor may be unresolvable during a base-chain reorg; that's
        // not the sender's fault and the block may still serve as an uncle.
        match self.collaborators.base_chain.header_by_hash(&block.prev_id) {
            Some(header) => {
                if header.height + 1 != block.txin_gen_height {
                    warn!(
                        got = block.txin_gen_height,
                        expected = header.height + 1,
                        "external block has wrong base chain height"
                    );
                    return Err(IngressError::WrongAnchorHeight {
                        got: block.txin_gen_height,
                        expected: header.height + 1,
                    });
                }
            }
            None => {
                warn!(
                    prev = %block.prev_id,
                    "external block is built on an unknown base chain block, possible reorg"
                );
            }
        }

        let seed = self
            .collaborators
            .base_chain
            .pow_seed(block.txin_gen_height)
            .ok_or_else(|| {
                warn!(
                    base_height = block.txin_gen_height,
                    "no PoW seed for external block"
                );
                IngressError::SeedUnavailable {
                    height: block.txin_gen_height,
                }
            })?;

        let pow_hash = self
            .collaborators
            .pow
            .pow_hash(&block.main_chain_data, &seed)
            .ok_or_else(|| {
                warn!(
                    height = block.sidechain_height,
                    "could not compute PoW hash for external block"
                );
                IngressError::PowUnavailable {
                    height: block.sidechain_height,
                }
            })?;

        if !block.difficulty.check_pow(&pow_hash) {
            warn!(
                height = block.sidechain_height,
                difficulty = %block.difficulty,
                "not enough PoW in external block"
            );
            return Err(IngressError::PowTooWeak {
                difficulty: block.difficulty,
                height: block.sidechain_height,
            });
        }

        let missing = {
            let state = self.state.lock();
            let mut missing = Vec::new();
            if !block.parent.is_zero() && !state.store.contains(&block.parent) {
                missing.push(block.parent);
            }
            for uncle_id in &block.uncles {
                if !uncle_id.is_zero() && !state.store.contains(uncle_id) {
                    missing.push(*uncle_id);
                }
            }
            missing
        };

        self.add_block(block);
        Ok(IngressOutcome::Added { missing })
    }

    /// Insert a block (external, pre-vetted, or locally mined) and drive
    /// verification as far as it will go.
    pub fn add_block(&self, block: PoolBlock) {
        info!(
            height = block.sidechain_height,
            id = %block.sidechain_id,
            base_height = block.txin_gen_height,
            verified = block.verified,
            "add_block"
        );

        let mut state = self.state.lock();

        let id = block.sidechain_id;
        let preverified = block.verified && !block.invalid;
        if state.store.insert(block).is_err() {
            warn!(id = %id, "tried to add the same block twice");
            return;
        }

        self.update_depths(&mut state, id);

        if preverified {
            // Only locally produced blocks arrive verified.
            self.update_chain_tip(&mut state, id);
        } else {
            self.verify_loop(&mut state, id);
        }
    }

    /// Parent/uncle ids referenced by unverified blocks but absent from the
    /// store; these are what to request from peers.
    pub fn get_missing_blocks(&self) -> Vec<Hash> {
        let state = self.state.lock();
        let mut missing = Vec::new();
        for block in state.store.iter() {
            if block.verified {
                continue;
            }
            if !block.parent.is_zero() && !state.store.contains(&block.parent) {
                missing.push(block.parent);
            }
            for uncle_id in &block.uncles {
                if !uncle_id.is_zero() && !state.store.contains(uncle_id) {
                    missing.push(*uncle_id);
                }
            }
        }
        missing
    }

    /// Full relay blob for a block; the zero id means the current tip.
    pub fn get_block_blob(&self, id: &Hash) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let block = if id.is_zero() {
            state.tip.and_then(|tip_id| state.store.get(&tip_id))
        } else {
            state.store.get(id)
        }?;

        let mut blob =
            Vec::with_capacity(block.main_chain_data.len() + block.side_chain_data.len());
        blob.extend_from_slice(&block.main_chain_data);
        blob.extend_from_slice(&block.side_chain_data);
        Some(blob)
    }

    /// Compute the coinbase outputs for a block template and serialize them
    /// as `varint(N) ‖ (varint(reward) ‖ 0x02 ‖ one-time key)*`. The
    /// computed outputs are stored back on the block.
    pub fn get_outputs_blob(
        &self,
        block: &mut PoolBlock,
        total_reward: u64,
    ) -> ChainResult<Vec<u8>> {
        let state = self.state.lock();

        let shares = window::get_shares(&state.store, &self.config, block)?;
        let rewards = split_reward(total_reward, &shares)?;

        let count = shares.len();
        let mut blob = Vec::with_capacity(count * 38 + 8);
        write_varint(count as u64, &mut blob);

        block.outputs.clear();
        block.outputs.reserve(count);
        for (index, (share, reward)) in shares.iter().zip(rewards).enumerate() {
            write_varint(reward, &mut blob);
            blob.push(TXOUT_TO_KEY);
            let key = share
                .wallet
                .derive_ephemeral_pubkey(&block.txkey_sec, index as u64);
            blob.extend_from_slice(key.as_bytes());
            block.outputs.push(TxOutput {
                reward,
                eph_public_key: key,
            });
        }

        Ok(blob)
    }

    /// Operator-facing summary; `our_wallet` marks which shares are ours.
    pub fn status(&self, our_wallet: &WalletAddress) -> SideChainStatus {
        let state = self.state.lock();
        let window = self.config.chain_window_size;

        let miner_data = self.collaborators.base_chain.miner_data();
        let pool_hashrate =
            (state.cur_difficulty.0 / self.config.target_block_time as u128) as u64;
        let base_hashrate = (miner_data.difficulty.0 / BASE_BLOCK_TIME as u128) as u64;

        let tip = state.tip.and_then(|id| state.store.get(&id));
        let tip_height = tip.map_or(0, |block| block.sidechain_height);
        let tip_age_seconds = tip.map_or(0, |block| {
            self.collaborators
                .clock
                .now_seconds()
                .saturating_sub(block.timestamp)
        });

        let mut window_blocks = 0u64;
        let mut window_uncles = 0u64;
        let mut our_blocks = 0u64;
        let mut our_uncles = 0u64;
        let mut in_window: Vec<Hash> = Vec::with_capacity(window as usize * 9 / 8);

        let mut cur = tip;
        let mut block_depth = 0u64;
        while let Some(block) = cur {
            in_window.push(block.sidechain_id);
            window_blocks += 1;
            if block.miner_wallet == *our_wallet {
                our_blocks += 1;
            }

            block_depth += 1;
            if block_depth >= window {
                break;
            }

            for uncle_id in &block.uncles {
                in_window.push(*uncle_id);
                if let Some(uncle) = state.store.get(uncle_id) {
                    if tip_height - uncle.sidechain_height < window {
                        window_uncles += 1;
                        if uncle.miner_wallet == *our_wallet {
                            our_uncles += 1;
                        }
                    }
                }
            }

            cur = state.store.parent_of(block);
        }

        let mut orphans = 0u64;
        let mut our_orphans = 0u64;
        if tip.is_some() {
            in_window.sort();
            for offset in 0..window.min(tip_height + 1) {
                for id in state.store.at_height(tip_height - offset) {
                    if in_window.binary_search(id).is_err() {
                        orphans += 1;
                        if state
                            .store
                            .get(id)
                            .is_some_and(|block| block.miner_wallet == *our_wallet)
                        {
                            our_orphans += 1;
                        }
                    }
                }
            }
        }

        SideChainStatus {
            base_height: miner_data.height,
            base_hashrate,
            side_height: tip.map_or(0, |block| block.sidechain_height + 1),
            pool_hashrate,
            window_blocks,
            window_uncles,
            our_blocks,
            our_uncles,
            orphans,
            our_orphans,
            tip_age_seconds,
        }
    }

    /// Log the status summary at info level.
    pub fn log_status(&self, our_wallet: &WalletAddress) {
        let status = self.status(our_wallet);
        info!(
            base_height = status.base_height,
            base_hashrate = status.base_hashrate,
            side_height = status.side_height,
            pool_hashrate = status.pool_hashrate,
            "chain status"
        );
        info!(
            window_blocks = status.window_blocks,
            window_uncles = status.window_uncles,
            orphans = status.orphans,
            "PPLNS window"
        );
        info!(
            our_blocks = status.our_blocks,
            our_uncles = status.our_uncles,
            our_orphans = status.our_orphans,
            tip_age_seconds = status.tip_age_seconds,
            "our shares"
        );
    }

    /// Verify `root` and then everything that might build on it, until no
    /// more progress is possible. The best surviving candidate becomes the
    /// tip.
    fn verify_loop(&self, state: &mut ChainState, root: Hash) {
        // PoW was already checked before insertion.
        let mut to_verify = vec![root];
        let mut highest: Option<Hash> = None;

        while let Some(id) = to_verify.pop() {
            let Some(block) = state.store.get(&id) else {
                continue;
            };
            if block.verified {
                continue;
            }

            match check_block(&state.store, &self.config, block) {
                Verdict::Pending => {
                    debug!(
                        height = block.sidechain_height,
                        id = %id,
                        "not enough data to verify block"
                    );
                }
                Verdict::Invalid(reason) => {
                    warn!(
                        height = block.sidechain_height,
                        id = %id,
                        %reason,
                        "block is invalid"
                    );
                    if let Some(block) = state.store.get_mut(&id) {
                        block.verified = true;
                        block.invalid = true;
                    }
                }
                Verdict::Valid => {
                    let height = block.sidechain_height;
                    if let Some(block) = state.store.get_mut(&id) {
                        block.verified = true;
                        block.invalid = false;
                    }
                    let depth = state.store.get(&id).map_or(0, |block| block.depth);
                    info!(height, depth, id = %id, "verified block");

                    let candidate = state.store.get(&id);
                    let best = highest.and_then(|best_id| state.store.get(&best_id));
                    if is_longer_chain(
                        &state.store,
                        &self.config,
                        self.collaborators.base_chain.as_ref(),
                        best,
                        candidate,
                    ) {
                        highest = Some(id);
                    }

                    self.broadcast_once(state, id);

                    // Anything within uncle range above this block may be
                    // verifiable now.
                    for offset in 1..=UNCLE_BLOCK_DEPTH {
                        to_verify.extend_from_slice(state.store.at_height(height + offset));
                    }
                }
            }
        }

        if let Some(best_id) = highest {
            self.update_chain_tip(state, best_id);
        }
    }

    /// Make `id` the tip if it carries a longer chain, then broadcast and
    /// prune.
    fn update_chain_tip(&self, state: &mut ChainState, id: Hash) {
        let Some(block) = state.store.get(&id) else {
            error!(id = %id, "chain tip candidate vanished from the store");
            return;
        };
        if !block.verified || block.invalid {
            error!(id = %id, "chain tip candidate is unverified or invalid");
            return;
        }
        if block.depth >= self.config.chain_window_size {
            debug!(depth = block.depth, "chain tip candidate is too deep, ignoring it");
            return;
        }

        let tip = state.tip.and_then(|tip_id| state.store.get(&tip_id));
        let tip_height = tip.map_or(0, |tip| tip.sidechain_height);

        if is_longer_chain(
            &state.store,
            &self.config,
            self.collaborators.base_chain.as_ref(),
            tip,
            Some(block),
        ) {
            match window::next_difficulty_for(&state.store, &self.config, block) {
                Ok(difficulty) => {
                    let next_height = block.sidechain_height + 1;
                    let base_height = block.txin_gen_height;
                    state.tip = Some(id);
                    state.cur_difficulty = difficulty;
                    info!(
                        next_height,
                        next_difficulty = %difficulty,
                        base_height,
                        "new chain tip"
                    );

                    if let Some(block) = state.store.get_mut(&id) {
                        block.want_broadcast = true;
                    }
                    self.collaborators.template.refresh();
                    self.prune_old_blocks(state);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "could not retarget for new tip, keeping the old one");
                }
            }
        } else if let Some(block) = state.store.get(&id) {
            if block.sidechain_height > tip_height {
                debug!(
                    id = %id,
                    height = block.sidechain_height,
                    tip_height,
                    "higher block does not carry a longer chain"
                );
            } else if block.sidechain_height + UNCLE_BLOCK_DEPTH > tip_height {
                debug!(id = %id, height = block.sidechain_height, "possible uncle block");
                self.collaborators.template.refresh();
            }
        }

        self.broadcast_once(state, id);
    }

    /// Relay a block exactly once, the first time it is both wanted and
    /// verified.
    fn broadcast_once(&self, state: &mut ChainState, id: Hash) {
        let Some(block) = state.store.get_mut(&id) else {
            return;
        };
        if block.want_broadcast && !block.broadcasted {
            block.broadcasted = true;
            let snapshot = block.clone();
            self.collaborators.relay.broadcast(&snapshot);
        }
    }

    /// Seed a new block's depth from its already-known children, then push
    /// the raised depth down to ancestors and uncles until nothing changes.
    fn update_depths(&self, state: &mut ChainState, id: Hash) {
        let Some(block) = state.store.get(&id) else {
            return;
        };
        let height = block.sidechain_height;
        let mut depth = block.depth;

        for offset in 1..=UNCLE_BLOCK_DEPTH {
            let child_ids = state.store.at_height(height + offset).to_vec();
            for child_id in child_ids {
                let Some(child) = state.store.get(&child_id) else {
                    continue;
                };
                if offset == 1 && child.parent == id {
                    depth = depth.max(child.depth + 1);
                }
                if child.uncles.contains(&id) {
                    depth = depth.max(child.depth + offset);
                }
            }
        }
        if let Some(block) = state.store.get_mut(&id) {
            block.depth = depth;
        }

        let mut to_update = vec![id];
        while let Some(cur_id) = to_update.pop() {
            let Some(cur) = state.store.get(&cur_id) else {
                continue;
            };
            let cur_height = cur.sidechain_height;
            let cur_depth = cur.depth;
            let parent_id = cur.parent;
            let uncles = cur.uncles.clone();

            if let Some(parent) = state.store.get(&parent_id) {
                debug_assert_eq!(parent.sidechain_height + 1, cur_height);
                if parent.depth < cur_depth + 1 {
                    if let Some(parent) = state.store.get_mut(&parent_id) {
                        parent.depth = cur_depth + 1;
                    }
                    to_update.push(parent_id);
                }
            }

            for uncle_id in uncles {
                let Some(uncle) = state.store.get(&uncle_id) else {
                    continue;
                };
                // Unverified blocks may claim absurd uncle heights; depth
                // bookkeeping must not trust them.
                if uncle.sidechain_height >= cur_height
                    || uncle.sidechain_height + UNCLE_BLOCK_DEPTH < cur_height
                {
                    warn!(
                        height = cur_height,
                        uncle = %uncle_id,
                        uncle_height = uncle.sidechain_height,
                        "uncle reference at inconsistent height"
                    );
                    continue;
                }
                let distance = cur_height - uncle.sidechain_height;
                if uncle.depth < cur_depth + distance {
                    if let Some(uncle) = state.store.get_mut(&uncle_id) {
                        uncle.depth = cur_depth + distance;
                    }
                    to_update.push(uncle_id);
                }
            }
        }
    }

    /// Drop blocks far enough below the tip that nothing in the window can
    /// reference them, keeping a sync margin for lagging peers.
    fn prune_old_blocks(&self, state: &mut ChainState) {
        let window = self.config.chain_window_size;
        let prune_distance = window * 2 + SYNC_SPARE_SECONDS / self.config.target_block_time;

        let Some(tip) = state.tip.and_then(|tip_id| state.store.get(&tip_id)) else {
            return;
        };
        if tip.sidechain_height < prune_distance {
            return;
        }
        let cutoff = tip.sidechain_height - prune_distance;

        let mut pruned = 0u64;
        for height in state.store.heights_up_to(cutoff) {
            for id in state.store.at_height(height).to_vec() {
                let deep = state
                    .store
                    .get(&id)
                    .is_some_and(|block| block.depth >= window * 2);
                if deep {
                    state.store.remove(&id);
                    pruned += 1;
                }
            }
        }

        if pruned > 0 {
            info!(pruned, cutoff, "pruned old blocks");
        }
    }
}
