//! Miner wallet identities and one-time output key derivation.

use crate::{write_varint, Hash};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A miner wallet identity.
///
/// Opaque 32 bytes with a total ordering; the ordering fixes the output
/// order of every coinbase split, so all nodes serialize outputs
/// identically.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, std::hash::Hash, Default, Serialize, Deserialize,
)]
pub struct WalletAddress(pub [u8; 32]);

impl WalletAddress {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the one-time public key for output `index` of a coinbase
    /// signed with the ephemeral secret `txkey_sec`.
    ///
    /// Stands in for the wallet crypto (key exchange + point derivation),
    /// which lives outside the engine. Deterministic in
    /// (wallet, txkey_sec, index), which is all the verifier needs.
    pub fn derive_ephemeral_pubkey(&self, txkey_sec: &Hash, index: u64) -> Hash {
        let mut index_bytes = Vec::with_capacity(10);
        write_varint(index, &mut index_bytes);

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.0);
        hasher.update(txkey_sec.as_bytes());
        hasher.update(&index_bytes);
        let digest = hasher.finalize();

        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }
}

impl From<[u8; 32]> for WalletAddress {
    fn from(bytes: [u8; 32]) -> Self {
        WalletAddress(bytes)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletAddress({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let wallet = WalletAddress([7u8; 32]);
        let txkey = Hash([9u8; 32]);
        assert_eq!(
            wallet.derive_ephemeral_pubkey(&txkey, 0),
            wallet.derive_ephemeral_pubkey(&txkey, 0)
        );
    }

    #[test]
    fn derivation_varies_with_every_input() {
        let wallet = WalletAddress([7u8; 32]);
        let other_wallet = WalletAddress([8u8; 32]);
        let txkey = Hash([9u8; 32]);
        let other_txkey = Hash([10u8; 32]);

        let base = wallet.derive_ephemeral_pubkey(&txkey, 0);
        assert_ne!(base, wallet.derive_ephemeral_pubkey(&txkey, 1));
        assert_ne!(base, other_wallet.derive_ephemeral_pubkey(&txkey, 0));
        assert_ne!(base, wallet.derive_ephemeral_pubkey(&other_txkey, 0));
    }
}
