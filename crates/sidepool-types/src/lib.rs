//! # sidepool-types
//!
//! Core data types shared by every sidepool crate:
//! - 32-byte identifiers ([`Hash`]) with the all-zero genesis sentinel
//! - 128-bit [`Difficulty`] with the proof-of-work target check
//! - Miner wallet identities ([`WalletAddress`]) and one-time output key
//!   derivation
//! - The share-chain block itself ([`PoolBlock`]) and its coinbase outputs
//! - The varint codec used by the outputs blob

mod block;
mod difficulty;
mod hash;
mod varint;
mod wallet;

pub use block::{PoolBlock, TxOutput, TXOUT_TO_KEY};
pub use difficulty::Difficulty;
pub use hash::Hash;
pub use varint::{read_varint, write_varint};
pub use wallet::WalletAddress;
