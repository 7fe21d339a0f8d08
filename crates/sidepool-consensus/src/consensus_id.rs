//! The consensus id: a private identifier binding a pool to its
//! configuration.
//!
//! Two nodes agree on a share chain only if every consensus parameter
//! matches, so the id is derived from the full configuration tuple. It is
//! never sent over the wire; with a non-empty password it doubles as the
//! shared secret of a private pool.
//!
//! Construction: the null-separated configuration tuple keys a SHAKE-256
//! schedule whose output stream seeds a 1009-lane scratchpad (deliberately
//! not a power of two) and is then swept over it with XOR; the final id is
//! the Keccak-256 digest of the scratchpad.

use crate::SidechainConfig;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Keccak256, Shake256};
use std::fmt;

/// Scratchpad lanes of 16 bytes each. A prime count, so the cyclic XOR
/// sweep never falls into a short period.
const SCRATCHPAD_LANES: usize = 1009;
const LANE_SIZE: usize = 16;

/// Total lanes drawn from the key schedule, sweep included (1 MiB).
const SCHEDULE_LANES: usize = 65536;

/// The derived consensus identifier.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ConsensusId([u8; 32]);

impl ConsensusId {
    /// Derive the id from a configuration.
    pub fn derive(config: &SidechainConfig) -> Self {
        let mut seed = Vec::with_capacity(256);
        for field in [
            config.pool_name.as_str(),
            config.pool_password.as_str(),
            &config.target_block_time.to_string(),
            &config.min_difficulty.to_string(),
            &config.chain_window_size.to_string(),
            &config.uncle_penalty.to_string(),
        ] {
            seed.extend_from_slice(field.as_bytes());
            seed.push(0);
        }

        let mut schedule = Shake256::default();
        schedule.update(&seed);
        let mut stream = schedule.finalize_xof();

        let mut scratchpad = [0u8; SCRATCHPAD_LANES * LANE_SIZE];
        stream.read(&mut scratchpad);

        // Sweep the rest of the schedule over the scratchpad, lane by lane,
        // wrapping cyclically.
        let mut lane_bytes = [0u8; LANE_SIZE];
        for i in SCRATCHPAD_LANES..SCHEDULE_LANES {
            stream.read(&mut lane_bytes);
            let offset = (i % SCRATCHPAD_LANES) * LANE_SIZE;
            for (dst, src) in scratchpad[offset..offset + LANE_SIZE]
                .iter_mut()
                .zip(lane_bytes.iter())
            {
                *dst ^= src;
            }
        }

        let digest = Keccak256::digest(scratchpad);
        let mut id = [0u8; 32];
        id.copy_from_slice(&digest);
        ConsensusId(id)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ConsensusId {
    /// Shows only the first and last four bytes; enough to see that two
    /// nodes are on the same sidechain without leaking the secret to logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = hex::encode(self.0);
        write!(f, "{}{}{}", &full[..8], "*".repeat(48), &full[56..])
    }
}

impl fmt::Debug for ConsensusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsensusId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let config = SidechainConfig::default();
        assert_eq!(ConsensusId::derive(&config), ConsensusId::derive(&config));
    }

    #[test]
    fn every_field_changes_the_id() {
        let base = ConsensusId::derive(&SidechainConfig::default());

        let variants = [
            SidechainConfig {
                pool_name: "other".into(),
                ..SidechainConfig::default()
            },
            SidechainConfig {
                pool_password: "secret".into(),
                ..SidechainConfig::default()
            },
            SidechainConfig {
                target_block_time: 2,
                ..SidechainConfig::default()
            },
            SidechainConfig {
                min_difficulty: 2000,
                ..SidechainConfig::default()
            },
            SidechainConfig {
                chain_window_size: 1080,
                ..SidechainConfig::default()
            },
            SidechainConfig {
                uncle_penalty: 21,
                ..SidechainConfig::default()
            },
        ];
        for variant in &variants {
            assert_ne!(base, ConsensusId::derive(variant));
        }
    }

    #[test]
    fn field_boundaries_do_not_collide() {
        // The null separators keep ("ab", "c") distinct from ("a", "bc").
        let left = SidechainConfig {
            pool_name: "ab".into(),
            pool_password: "c".into(),
            ..SidechainConfig::default()
        };
        let right = SidechainConfig {
            pool_name: "a".into(),
            pool_password: "bc".into(),
            ..SidechainConfig::default()
        };
        assert_ne!(ConsensusId::derive(&left), ConsensusId::derive(&right));
    }

    #[test]
    fn display_redacts_the_middle() {
        let id = ConsensusId::derive(&SidechainConfig::default());
        let shown = id.to_string();
        assert_eq!(shown.len(), 64);
        assert!(shown[8..56].chars().all(|c| c == '*'));
        assert_ne!(&shown[..8], "00000000");
    }
}
