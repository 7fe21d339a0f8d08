//! Seams to the world outside the engine.
//!
//! The engine calls these from inside the sidechain lock. Implementations
//! of the outbound pair ([`BlockRelay`], [`TemplateNotifier`]) must post
//! their work elsewhere and return immediately; calling back into the
//! [`SideChain`](crate::SideChain) from inside them deadlocks.

use sidepool_types::{Difficulty, Hash, PoolBlock};

/// A base-chain block header, reduced to what fork choice needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHeader {
    pub height: u64,
}

/// The base chain's current mining state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinerData {
    pub height: u64,
    pub difficulty: Difficulty,
}

/// View of the base-chain node.
pub trait BaseChainClient: Send + Sync {
    /// Look up a base-chain header by hash. `None` is normal during a
    /// base-chain reorg and is never fatal.
    fn header_by_hash(&self, id: &Hash) -> Option<BaseHeader>;

    /// PoW seed for the epoch containing `height`.
    fn pow_seed(&self, height: u64) -> Option<Hash>;

    /// Current head height and difficulty.
    fn miner_data(&self) -> MinerData;
}

/// The proof-of-work function, as a black box.
pub trait PowHasher: Send + Sync {
    /// Hash a serialized block against `seed`. `None` when the hasher is
    /// not ready for that seed (dataset still building, etc.).
    fn pow_hash(&self, blob: &[u8], seed: &Hash) -> Option<Hash>;
}

/// Outbound block relay to peers. Fired at most once per block.
pub trait BlockRelay: Send + Sync {
    fn broadcast(&self, block: &PoolBlock);
}

/// Notifies the block-template builder that its template went stale.
pub trait TemplateNotifier: Send + Sync {
    fn refresh(&self);
}

/// Wall-clock time. Status reporting only; consensus never reads it.
pub trait Clock: Send + Sync {
    fn now_seconds(&self) -> u64;
}
