//! # sidepool-chain
//!
//! The share-chain engine.
//!
//! Blocks arrive out of order from peers and from local mining, get indexed
//! in an in-memory graph, verified against their ancestors once those are
//! known, weighed for the PPLNS payout window, and pruned once they are too
//! deep to matter. The whole engine is single-threaded under one mutex; the
//! outside world (base-chain node, proof-of-work hasher, peer relay, block
//! template builder) is reached through the traits in [`collaborators`].
//!
//! Entry point: [`SideChain`].

pub mod collaborators;
mod error;
mod fork_choice;
mod sidechain;
mod store;
mod verifier;
mod window;

pub use error::{ChainError, ChainResult, IngressError, IngressOutcome};
pub use sidechain::{Collaborators, SideChain, SideChainStatus};
pub use store::BlockStore;
pub use verifier::{InvalidReason, Verdict};

/// Engine constants that are not consensus-configurable.
pub mod params {
    /// Spare sync margin kept below the prune horizon, in seconds' worth of
    /// blocks (two minutes for lagging nodes).
    pub const SYNC_SPARE_SECONDS: u64 = 120;

    /// Base-chain block interval used for hashrate estimates in status
    /// output.
    pub const BASE_BLOCK_TIME: u64 = 120;

    /// How far behind the base-chain head an alternative chain's anchors
    /// may be before fork choice writes it off as stale.
    pub const STALE_ANCHOR_TOLERANCE: u64 = 10;
}
