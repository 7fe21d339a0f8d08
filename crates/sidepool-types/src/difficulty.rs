//! 128-bit difficulty values and the proof-of-work target check.

use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// An unsigned 128-bit difficulty.
///
/// A hash `h` (interpreted as a little-endian 256-bit integer) meets
/// difficulty `d` when `h * d <= 2^256 - 1`, i.e. the product fits in
/// 256 bits.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, std::hash::Hash,
)]
pub struct Difficulty(pub u128);

impl Difficulty {
    pub const ZERO: Difficulty = Difficulty(0);
    pub const MAX: Difficulty = Difficulty(u128::MAX);

    pub const fn new(value: u128) -> Self {
        Difficulty(value)
    }

    /// Low 64 bits, used as the share weight in the PPLNS window.
    pub fn lo64(&self) -> u64 {
        self.0 as u64
    }

    pub fn checked_sub(self, rhs: Difficulty) -> Option<Difficulty> {
        self.0.checked_sub(rhs.0).map(Difficulty)
    }

    /// Anti-spam threshold: half of this difficulty, rounded down.
    pub fn halved(self) -> Difficulty {
        Difficulty(self.0 >> 1)
    }

    /// Whether `pow_hash` meets this difficulty.
    ///
    /// The product of the 256-bit hash and the 128-bit difficulty must fit
    /// in 256 bits. Computed with 64-bit limbs since the full product can
    /// reach 384 bits.
    pub fn check_pow(&self, pow_hash: &Hash) -> bool {
        let bytes = pow_hash.as_bytes();
        let mut lo_bytes = [0u8; 16];
        let mut hi_bytes = [0u8; 16];
        lo_bytes.copy_from_slice(&bytes[..16]);
        hi_bytes.copy_from_slice(&bytes[16..]);
        let hash_lo = u128::from_le_bytes(lo_bytes);
        let hash_hi = u128::from_le_bytes(hi_bytes);

        // hash * d = hash_lo * d + (hash_hi * d) << 128. The upper half of
        // the first term plus the (necessarily 128-bit) second term must not
        // carry past bit 255.
        let (product_hi, _) = mul_wide(hash_lo, self.0);
        match hash_hi.checked_mul(self.0) {
            Some(upper) => product_hi.checked_add(upper).is_some(),
            None => false,
        }
    }
}

/// Full 128x128 -> 256-bit multiply, returning (high, low) halves.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const LOW: u128 = (1u128 << 64) - 1;
    let (a_lo, a_hi) = (a & LOW, a >> 64);
    let (b_lo, b_hi) = (b & LOW, b >> 64);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & LOW) + (hl & LOW);
    let lo = (mid << 64) | (ll & LOW);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

impl From<u64> for Difficulty {
    fn from(value: u64) -> Self {
        Difficulty(value as u128)
    }
}

impl Add for Difficulty {
    type Output = Difficulty;

    fn add(self, rhs: Difficulty) -> Difficulty {
        Difficulty(self.0 + rhs.0)
    }
}

impl AddAssign for Difficulty {
    fn add_assign(&mut self, rhs: Difficulty) {
        self.0 += rhs.0;
    }
}

impl Sum for Difficulty {
    fn sum<I: Iterator<Item = Difficulty>>(iter: I) -> Difficulty {
        iter.fold(Difficulty::ZERO, Add::add)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Difficulty({})", self.0)
    }
}
