//! Per-window difficulty retargeting.
//!
//! The next block's difficulty comes from the spread of cumulative
//! difficulty over the spread of time inside the PPLNS window, after
//! trimming the 10% oldest and 10% newest entries by timestamp. Trimming is
//! what defeats timestamp manipulation: an attacker would have to control a
//! fifth of the window to move the statistic at all.

use crate::{ConsensusError, ConsensusResult};
use sidepool_types::Difficulty;

/// One retarget input: a block's (or in-window uncle's) miner-asserted
/// timestamp and cumulative difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultySample {
    pub timestamp: u64,
    pub cumulative_difficulty: Difficulty,
}

/// Compute the difficulty of the block after the window described by
/// `samples`.
///
/// Fails on an empty window and when `delta_diff * target_block_time`
/// exceeds 128 bits.
pub fn next_difficulty(
    samples: &[DifficultySample],
    target_block_time: u64,
    min_difficulty: Difficulty,
) -> ConsensusResult<Difficulty> {
    if samples.is_empty() {
        return Err(ConsensusError::EmptyWindow);
    }

    let oldest_timestamp = samples
        .iter()
        .map(|sample| sample.timestamp)
        .min()
        .unwrap_or(0);

    // Normalized offsets fit 32 bits; anything further out is miner fantasy
    // that the trim below discards anyway.
    let mut offsets: Vec<u32> = samples
        .iter()
        .map(|sample| (sample.timestamp - oldest_timestamp) as u32)
        .collect();

    // Discard the 10% oldest and 10% newest by timestamp. Partial selection,
    // no full sort.
    let cut_size = (offsets.len() + 9) / 10;
    let low_index = cut_size - 1;
    let high_index = offsets.len() - cut_size;

    let (_, low_offset, _) = offsets.select_nth_unstable(low_index);
    let timestamp1 = oldest_timestamp + *low_offset as u64;
    let (_, high_offset, _) = offsets.select_nth_unstable(high_index);
    let timestamp2 = oldest_timestamp + *high_offset as u64;

    let delta_t = if timestamp2 > timestamp1 {
        timestamp2 - timestamp1
    } else {
        1
    };

    let mut diff_min = Difficulty::MAX;
    let mut diff_max = Difficulty::ZERO;
    for sample in samples {
        if timestamp1 <= sample.timestamp && sample.timestamp <= timestamp2 {
            diff_min = diff_min.min(sample.cumulative_difficulty);
            diff_max = diff_max.max(sample.cumulative_difficulty);
        }
    }

    // The kept set is nonempty: the blocks at timestamp1 and timestamp2
    // themselves survive the trim.
    let delta_diff = diff_max.0 - diff_min.0;

    let product = delta_diff.checked_mul(target_block_time as u128).ok_or(
        ConsensusError::RetargetOverflow {
            delta_diff,
            target_block_time,
        },
    )?;

    Ok(Difficulty(product / delta_t as u128).max(min_difficulty))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Difficulty = Difficulty::new(1000);

    fn sample(timestamp: u64, cumulative: u128) -> DifficultySample {
        DifficultySample {
            timestamp,
            cumulative_difficulty: Difficulty(cumulative),
        }
    }

    #[test]
    fn empty_window_is_an_error() {
        assert_eq!(
            next_difficulty(&[], 10, MIN),
            Err(ConsensusError::EmptyWindow)
        );
    }

    #[test]
    fn single_sample_yields_minimum() {
        let out = next_difficulty(&[sample(100, 1000)], 10, MIN).unwrap();
        assert_eq!(out, MIN);
    }

    #[test]
    fn steady_chain_reproduces_its_difficulty() {
        // 100 blocks, one per 10 seconds, difficulty 5000 each: the spread
        // of cumulative difficulty over the spread of time is 5000/10s.
        let samples: Vec<DifficultySample> = (0..100)
            .map(|i| sample(i * 10, (i as u128 + 1) * 5000))
            .collect();
        let out = next_difficulty(&samples, 10, MIN).unwrap();
        assert_eq!(out, Difficulty(5000));
    }

    #[test]
    fn output_never_drops_below_minimum() {
        // Nearly flat cumulative difficulty over a huge time span.
        let samples: Vec<DifficultySample> =
            (0..50).map(|i| sample(i * 100_000, 2000 + i as u128)).collect();
        let out = next_difficulty(&samples, 1, MIN).unwrap();
        assert_eq!(out, MIN);
    }

    #[test]
    fn trim_discards_timestamp_outliers() {
        // 20 honest blocks plus two with absurd timestamps. cut = 3, so the
        // outliers (and one honest entry per side) fall outside [t1, t2] and
        // must not stretch delta_t.
        let mut samples: Vec<DifficultySample> = (0..20)
            .map(|i| sample(1_000 + i * 10, (i as u128 + 1) * 5000))
            .collect();
        samples.push(sample(0, 1)); // ancient
        samples.push(sample(10_000_000, 200_000)); // far future

        let honest_only: Vec<DifficultySample> = samples[..20].to_vec();
        let with_outliers = next_difficulty(&samples, 10, MIN).unwrap();
        let without = next_difficulty(&honest_only, 10, MIN).unwrap();

        // Both trims land on the same honest [t1, t2] span, so the outliers
        // change nothing. Untrimmed, the future timestamp would stretch
        // delta_t by 10,000x and crash the difficulty to the floor.
        assert_eq!(with_outliers, without);
        assert_eq!(with_outliers, Difficulty(5000));
    }

    #[test]
    fn identical_timestamps_use_unit_delta() {
        let samples = vec![sample(500, 1000), sample(500, 6000)];
        // delta_t clamps to 1, so difficulty = 5000 * target / 1.
        let out = next_difficulty(&samples, 2, MIN).unwrap();
        assert_eq!(out, Difficulty(10_000));
    }

    #[test]
    fn overflow_is_reported() {
        let samples = vec![sample(0, 0), sample(1, u128::MAX)];
        assert!(matches!(
            next_difficulty(&samples, 120, MIN),
            Err(ConsensusError::RetargetOverflow { .. })
        ));
    }
}
