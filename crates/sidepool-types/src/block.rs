//! The share-chain block.

use crate::{Difficulty, Hash, WalletAddress};

/// Output type tag for a one-time key payout, as serialized in the
/// outputs blob.
pub const TXOUT_TO_KEY: u8 = 0x02;

/// One coinbase output: a reward paid to a one-time public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutput {
    pub reward: u64,
    pub eph_public_key: Hash,
}

/// A share-chain block.
///
/// Every share a miner submits is one of these; a share whose proof-of-work
/// also meets the base chain's difficulty doubles as a base-chain block.
///
/// Consensus fields are set once at construction (or by
/// `fill_sidechain_data` for local templates). The trailing flags are
/// engine-side bookkeeping: `verified`/`invalid` are written only by the
/// verifier and are monotonic, `depth` grows as descendants arrive, and the
/// broadcast pair guards the one-shot relay.
#[derive(Debug, Clone)]
pub struct PoolBlock {
    /// Content-addressed identity.
    pub sidechain_id: Hash,
    /// Parent block id; [`Hash::ZERO`] iff this is a genesis block.
    pub parent: Hash,
    /// Uncle block ids, strictly ascending, each distinct.
    pub uncles: Vec<Hash>,
    pub sidechain_height: u64,
    pub difficulty: Difficulty,
    pub cumulative_difficulty: Difficulty,
    /// Miner-asserted seconds; bounded only by the retarget's trimmed
    /// statistic, never trusted directly.
    pub timestamp: u64,
    pub miner_wallet: WalletAddress,
    /// Ephemeral transaction secret key the outputs were derived from.
    pub txkey_sec: Hash,
    pub outputs: Vec<TxOutput>,

    /// Base-chain block this share is built on.
    pub prev_id: Hash,
    /// Base-chain height the coinbase unlocks at (`prev` height + 1).
    pub txin_gen_height: u64,

    /// Opaque serialized halves, concatenated for relay.
    pub main_chain_data: Vec<u8>,
    pub side_chain_data: Vec<u8>,

    pub verified: bool,
    pub invalid: bool,
    /// Longest known distance to a descendant referencing this block as
    /// parent or uncle.
    pub depth: u64,
    pub want_broadcast: bool,
    pub broadcasted: bool,
}

impl PoolBlock {
    /// A blank block; callers fill in consensus fields before insertion.
    pub fn new(sidechain_id: Hash) -> Self {
        PoolBlock {
            sidechain_id,
            parent: Hash::ZERO,
            uncles: Vec::new(),
            sidechain_height: 0,
            difficulty: Difficulty::ZERO,
            cumulative_difficulty: Difficulty::ZERO,
            timestamp: 0,
            miner_wallet: WalletAddress::default(),
            txkey_sec: Hash::ZERO,
            outputs: Vec::new(),
            prev_id: Hash::ZERO,
            txin_gen_height: 0,
            main_chain_data: Vec::new(),
            side_chain_data: Vec::new(),
            verified: false,
            invalid: false,
            depth: 0,
            want_broadcast: false,
            broadcasted: false,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.sidechain_height == 0
    }

    /// Sum of all output rewards.
    pub fn total_reward(&self) -> u64 {
        self.outputs.iter().map(|out| out.reward).sum()
    }
}
