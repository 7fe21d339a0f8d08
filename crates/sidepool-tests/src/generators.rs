//! Deterministic test data builders and mock collaborators.
//!
//! [`TestChain`] wraps a [`SideChain`] together with an oracle copy of every
//! block it builds. The oracle recomputes difficulty, cumulative difficulty,
//! and coinbase outputs from the pure consensus functions, so the engine
//! under test verifies blocks it had no hand in constructing.

use parking_lot::Mutex;
use sidepool_chain::collaborators::{
    BaseChainClient, BaseHeader, BlockRelay, Clock, MinerData, PowHasher, TemplateNotifier,
};
use sidepool_chain::{Collaborators, SideChain};
use sidepool_consensus::{
    merge_shares, next_difficulty, split_reward, uncle_penalty, DifficultySample, MinerShare,
    SidechainConfig,
};
use sidepool_types::{Difficulty, Hash, PoolBlock, TxOutput, WalletAddress};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Base-chain height every generated block anchors to.
pub const BASE_HEIGHT: u64 = 100;

/// Install a tracing subscriber honoring `RUST_LOG`, once. Lets failing
/// tests be rerun with engine logs visible.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reward distributed by every generated coinbase.
pub const TEST_REWARD: u64 = 600_000_000_000;

/// A base-chain anchor hash carrying its height in-band.
pub fn anchor(height: u64) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_le_bytes());
    bytes[31] = 0xbc;
    Hash(bytes)
}

pub fn test_wallet(tag: u8) -> WalletAddress {
    WalletAddress([tag; 32])
}

/// Base-chain stub: anchors resolve to the height they carry.
pub struct TestBaseChain {
    pub head_height: u64,
}

impl BaseChainClient for TestBaseChain {
    fn header_by_hash(&self, id: &Hash) -> Option<BaseHeader> {
        if id.0[31] != 0xbc {
            return None;
        }
        let mut height_bytes = [0u8; 8];
        height_bytes.copy_from_slice(&id.0[..8]);
        Some(BaseHeader {
            height: u64::from_le_bytes(height_bytes),
        })
    }

    fn pow_seed(&self, height: u64) -> Option<Hash> {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&height.to_le_bytes());
        Some(Hash(seed))
    }

    fn miner_data(&self) -> MinerData {
        MinerData {
            height: self.head_height,
            difficulty: Difficulty(1_000_000),
        }
    }
}

/// Proof-of-work stub whose hash meets every difficulty.
pub struct AlwaysPow;

impl PowHasher for AlwaysPow {
    fn pow_hash(&self, _blob: &[u8], _seed: &Hash) -> Option<Hash> {
        Some(Hash::ZERO)
    }
}

/// Records every broadcast block id.
#[derive(Default)]
pub struct RecordingRelay {
    pub broadcasts: Mutex<Vec<Hash>>,
}

impl BlockRelay for RecordingRelay {
    fn broadcast(&self, block: &PoolBlock) {
        self.broadcasts.lock().push(block.sidechain_id);
    }
}

/// Counts template refresh requests.
#[derive(Default)]
pub struct RecordingTemplate {
    pub refreshes: AtomicU64,
}

impl TemplateNotifier for RecordingTemplate {
    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FixedClock {
    pub now: u64,
}

impl Clock for FixedClock {
    fn now_seconds(&self) -> u64 {
        self.now
    }
}

/// A [`SideChain`] plus handles to its recording collaborators.
pub struct Engine {
    pub chain: SideChain,
    pub relay: Arc<RecordingRelay>,
    pub template: Arc<RecordingTemplate>,
}

/// Build an engine over fresh mocks.
pub fn engine_with(config: SidechainConfig) -> Engine {
    let relay = Arc::new(RecordingRelay::default());
    let template = Arc::new(RecordingTemplate::default());
    let collaborators = Collaborators {
        base_chain: Arc::new(TestBaseChain {
            head_height: BASE_HEIGHT,
        }),
        pow: Arc::new(AlwaysPow),
        relay: Arc::clone(&relay) as Arc<dyn BlockRelay>,
        template: Arc::clone(&template) as Arc<dyn TemplateNotifier>,
        clock: Arc::new(FixedClock { now: 1_700_000_000 }),
    };
    Engine {
        chain: SideChain::new(config, collaborators).expect("test config must validate"),
        relay,
        template,
    }
}

/// An engine under test plus an oracle copy of every built block.
pub struct TestChain {
    pub engine: Engine,
    pub config: SidechainConfig,
    /// Everything ever built, in build order (insertion into the engine may
    /// happen in any order or not at all).
    pub blocks: HashMap<Hash, PoolBlock>,
    pub build_order: Vec<Hash>,
    next_id: u64,
}

impl TestChain {
    pub fn new() -> Self {
        Self::with_config(SidechainConfig::default())
    }

    pub fn with_config(config: SidechainConfig) -> Self {
        TestChain {
            engine: engine_with(config.clone()),
            config,
            blocks: HashMap::new(),
            build_order: Vec::new(),
            next_id: 0,
        }
    }

    /// A second engine with the same configuration, for replaying the same
    /// blocks in a different order.
    pub fn fresh_engine(&self) -> Engine {
        engine_with(self.config.clone())
    }

    fn next_hash(&mut self) -> Hash {
        self.next_id += 1;
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&self.next_id.to_le_bytes());
        bytes[30] = 0x51; // keep clear of anchor ids
        Hash(bytes)
    }

    /// Build a valid genesis block.
    pub fn make_genesis(&mut self, wallet_tag: u8) -> PoolBlock {
        let id = self.next_hash();
        let mut block = PoolBlock::new(id);
        block.miner_wallet = test_wallet(wallet_tag);
        block.txkey_sec = Hash([0x77; 32]);
        block.difficulty = self.config.min_difficulty();
        block.cumulative_difficulty = self.config.min_difficulty();
        block.timestamp = 0;
        block.prev_id = anchor(BASE_HEIGHT - 1);
        block.txin_gen_height = BASE_HEIGHT;
        self.finish(&mut block);
        self.record(block)
    }

    /// Build a valid child of `parent` including `uncles`, computing
    /// difficulty, cumulative difficulty, and outputs from the oracle.
    pub fn make_child(&mut self, parent_id: &Hash, uncles: &[Hash], wallet_tag: u8) -> PoolBlock {
        let parent = self.blocks[parent_id].clone();
        let id = self.next_hash();

        let mut block = PoolBlock::new(id);
        block.parent = parent.sidechain_id;
        block.sidechain_height = parent.sidechain_height + 1;
        block.timestamp = block.sidechain_height;
        block.miner_wallet = test_wallet(wallet_tag);
        block.txkey_sec = Hash([0x77; 32]);
        block.uncles = uncles.to_vec();
        block.uncles.sort();
        block.prev_id = anchor(BASE_HEIGHT - 1);
        block.txin_gen_height = BASE_HEIGHT;

        block.difficulty = self.oracle_next_difficulty(&parent);
        block.cumulative_difficulty = parent.cumulative_difficulty + block.difficulty;
        for uncle_id in &block.uncles {
            block.cumulative_difficulty += self.blocks[uncle_id].difficulty;
        }

        self.finish(&mut block);
        self.record(block)
    }

    /// Build and insert a straight run of `count` blocks on top of
    /// `parent_id`, returning the ids in order.
    pub fn extend(&mut self, parent_id: &Hash, count: usize, wallet_tag: u8) -> Vec<Hash> {
        let mut ids = Vec::with_capacity(count);
        let mut parent = *parent_id;
        for _ in 0..count {
            let block = self.make_child(&parent, &[], wallet_tag);
            parent = block.sidechain_id;
            ids.push(parent);
            self.engine.chain.add_block(block);
        }
        ids
    }

    /// Give the block its oracle-computed coinbase and some relay payload.
    fn finish(&self, block: &mut PoolBlock) {
        block.main_chain_data = block.sidechain_id.as_bytes()[..8].to_vec();
        block.side_chain_data = vec![0x5c; 4];

        let shares = self.oracle_shares(block);
        let rewards = split_reward(TEST_REWARD, &shares).expect("oracle shares are nonempty");
        block.outputs = shares
            .iter()
            .zip(rewards)
            .enumerate()
            .map(|(index, (share, reward))| TxOutput {
                reward,
                eph_public_key: share
                    .wallet
                    .derive_ephemeral_pubkey(&block.txkey_sec, index as u64),
            })
            .collect();
    }

    fn record(&mut self, block: PoolBlock) -> PoolBlock {
        self.blocks.insert(block.sidechain_id, block.clone());
        self.build_order.push(block.sidechain_id);
        block
    }

    /// Retarget input for the block after `parent`, walked over the oracle
    /// copy of the graph.
    fn oracle_next_difficulty(&self, parent: &PoolBlock) -> Difficulty {
        let window = self.config.chain_window_size;
        let mut samples = Vec::new();

        let mut cur = parent;
        let mut depth = 0u64;
        loop {
            samples.push(DifficultySample {
                timestamp: cur.timestamp,
                cumulative_difficulty: cur.cumulative_difficulty,
            });
            for uncle_id in &cur.uncles {
                let uncle = &self.blocks[uncle_id];
                if parent.sidechain_height - uncle.sidechain_height < window {
                    samples.push(DifficultySample {
                        timestamp: uncle.timestamp,
                        cumulative_difficulty: uncle.cumulative_difficulty,
                    });
                }
            }
            depth += 1;
            if depth >= window || cur.sidechain_height == 0 {
                break;
            }
            cur = &self.blocks[&cur.parent];
        }

        next_difficulty(
            &samples,
            self.config.target_block_time,
            self.config.min_difficulty(),
        )
        .expect("oracle window is nonempty")
    }

    /// PPLNS shares for `tip`, walked over the oracle copy of the graph.
    pub fn oracle_shares(&self, tip: &PoolBlock) -> Vec<MinerShare> {
        let window = self.config.chain_window_size;
        let mut shares = Vec::new();

        let mut cur = tip;
        let mut depth = 0u64;
        loop {
            let mut weight = cur.difficulty.lo64();
            for uncle_id in &cur.uncles {
                let uncle = &self.blocks[uncle_id];
                if tip.sidechain_height - uncle.sidechain_height >= window {
                    continue;
                }
                let penalty = uncle_penalty(uncle.difficulty.lo64(), self.config.uncle_penalty);
                weight += penalty;
                shares.push(MinerShare::new(
                    uncle.difficulty.lo64() - penalty,
                    uncle.miner_wallet,
                ));
            }
            shares.push(MinerShare::new(weight, cur.miner_wallet));

            depth += 1;
            if depth >= window || cur.sidechain_height == 0 {
                break;
            }
            cur = &self.blocks[&cur.parent];
        }

        merge_shares(&mut shares);
        shares
    }
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}
