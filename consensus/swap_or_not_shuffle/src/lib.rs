//! The "swap-or-not" shuffle, as described in the Ethereum consensus spec.
//!
//! Two entry points are provided:
//!
//! - `compute_shuffled_index`: the spec's single-index permutation. O(rounds)
//!   per index, useful when only a handful of positions are needed (e.g.
//!   proposer sampling).
//! - `shuffle_list`: permutes an entire list in-place. Roughly 250x faster
//!   than calling `compute_shuffled_index` across the list, so committee
//!   construction always uses this variant and caches the result per seed.

mod compute_shuffled_index;
mod shuffle_list;

pub use compute_shuffled_index::compute_shuffled_index;
pub use shuffle_list::shuffle_list;

type Hash256 = ethereum_types::H256;

const SEED_SIZE: usize = 32;
const ROUND_SIZE: usize = 1;
const POSITION_WINDOW_SIZE: usize = 4;
const PIVOT_VIEW_SIZE: usize = SEED_SIZE + ROUND_SIZE;
const TOTAL_SIZE: usize = SEED_SIZE + ROUND_SIZE + POSITION_WINDOW_SIZE;

/// A helper struct to manage the buffer used during shuffling.
struct Buf([u8; TOTAL_SIZE]);

impl Buf {
    /// Create a new buffer from `seed`.
    ///
    /// ## Panics
    ///
    /// Panics if `seed.len() != 32`.
    fn new(seed: &[u8]) -> Self {
        let mut buf = [0; TOTAL_SIZE];
        buf[0..SEED_SIZE].copy_from_slice(seed);
        Self(buf)
    }

    fn set_round(&mut self, round: u8) {
        self.0[SEED_SIZE] = round;
    }

    /// Returns the new pivot. It is "raw" because it has not modulo the list size (this must be
    /// done by the caller).
    fn raw_pivot(&self) -> u64 {
        let digest = ethereum_hashing::hash_fixed(&self.0[0..PIVOT_VIEW_SIZE]);

        let mut bytes = [0; 8];
        bytes[..].copy_from_slice(&digest[0..8]);
        u64::from_le_bytes(bytes)
    }

    /// Add the current position into the buffer.
    fn mix_in_position(&mut self, position: usize) {
        self.0[PIVOT_VIEW_SIZE..].copy_from_slice(&int_to_bytes::int_to_bytes4(position as u32));
    }

    /// Hash the entire buffer.
    fn hash(&self) -> Hash256 {
        Hash256::from_slice(&ethereum_hashing::hash_fixed(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_seed() -> Vec<u8> {
        vec![42; SEED_SIZE]
    }

    #[test]
    fn shuffle_list_and_index_agree() {
        let n = 343;
        let rounds = 90;
        let seed = test_seed();

        let shuffled =
            shuffle_list((0..n).collect(), rounds, &seed, true).expect("shuffle should succeed");

        // `shuffle_list(_, _, _, true)[i]` holds the element that the
        // single-index forward permutation maps to position `i`.
        for i in 0..n {
            let single = compute_shuffled_index(i, n, &seed, rounds)
                .expect("in-bounds index should shuffle");
            assert_eq!(shuffled[single], i);
        }
    }

    #[test]
    fn shuffle_list_is_a_permutation() {
        let n = 100;
        let mut shuffled =
            shuffle_list((0..n).collect(), 90, &test_seed(), true).expect("should shuffle");
        shuffled.sort_unstable();
        assert_eq!(shuffled, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_list_round_trips() {
        let n = 256;
        let seed = test_seed();
        let forwards = shuffle_list((0..n).collect(), 90, &seed, true).expect("should shuffle");
        let back = shuffle_list(forwards, 90, &seed, false).expect("should unshuffle");
        assert_eq!(back, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn empty_list_returns_none() {
        assert_eq!(shuffle_list(vec![], 90, &test_seed(), true), None);
        assert_eq!(compute_shuffled_index(0, 0, &test_seed(), 90), None);
    }

    #[test]
    fn out_of_bounds_index_returns_none() {
        assert_eq!(compute_shuffled_index(10, 10, &test_seed(), 90), None);
    }

    #[test]
    fn zero_rounds_is_identity_for_single_index() {
        assert_eq!(compute_shuffled_index(7, 10, &test_seed(), 0), Some(7));
    }
}
