//! Incremental Merkleization for a single SSZ list or vector field.
//!
//! A [`TreeHashCache`] holds every layer of the Merkle tree for one field of
//! the beacon state, so that after `k` of `n` leaves change the root can be
//! recomputed with `O(k · log n)` hashes instead of `O(n)`. Unchanged sibling
//! subtrees are never touched; clones of the containing structure share the
//! layers until one side writes (see `types::BeaconTreeHashCache`).

mod cache;

pub use crate::cache::TreeHashCache;
use ethereum_types::H256 as Hash256;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// Attempting to provide more than 2^depth leaves to a Merkle tree is disallowed.
    TooManyLeaves,
    /// Shrinking a Merkle tree cache by providing it with less leaves than it currently has is
    /// disallowed (for simplicity).
    CannotShrink,
    /// The leaf at the given index does not exist and is not the next leaf to be appended.
    LeafOutOfBounds(usize),
    /// Cache is inconsistent with the list of dirty indices provided.
    CacheInconsistent,
}

/// Compute `ceil(log2(n))` - the depth of the smallest Merkle tree with at least `n` leaves.
pub fn int_log(n: usize) -> usize {
    match n.checked_next_power_of_two() {
        Some(x) => x.trailing_zeros() as usize,
        None => 8 * std::mem::size_of::<usize>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz_types::{typenum::U32, VariableList};
    use tree_hash::{mix_in_length, TreeHash};

    fn hash(i: u64) -> Hash256 {
        Hash256::from_low_u64_be(i)
    }

    /// The cached root (with length mix-in) must always equal the standard
    /// SSZ tree hash of the equivalent `VariableList`.
    fn assert_equivalent(cache: &TreeHashCache, leaves: &[Hash256]) {
        let list =
            VariableList::<Hash256, U32>::new(leaves.to_vec()).expect("list should fit");
        assert_eq!(
            mix_in_length(&cache.root(), leaves.len()),
            list.tree_hash_root()
        );
    }

    #[test]
    fn empty_tree() {
        let cache = TreeHashCache::new(5, 0);
        assert_equivalent(&cache, &[]);
    }

    #[test]
    fn full_build_then_targeted_updates() {
        let mut leaves: Vec<_> = (1..=20).map(hash).collect();
        let mut cache = TreeHashCache::new(5, leaves.len());
        cache
            .recalculate_merkle_root(leaves.iter().map(|h| h.to_fixed_bytes()))
            .expect("should build");
        assert_equivalent(&cache, &leaves);

        // Mutate a scattering of leaves and recompute only those.
        for &i in &[0usize, 7, 13, 19] {
            leaves[i] = hash(1_000 + i as u64);
            cache.update_leaf(i, leaves[i]).expect("in bounds");
        }
        cache
            .update_merkle_root(vec![13, 0, 7, 19, 7])
            .expect("should recompute");
        assert_equivalent(&cache, &leaves);
    }

    #[test]
    fn growing_by_comparison() {
        let mut cache = TreeHashCache::new(5, 0);
        let mut leaves = vec![];

        for i in 1..=32 {
            leaves.push(hash(i));
            cache
                .recalculate_merkle_root(leaves.iter().map(|h| h.to_fixed_bytes()))
                .expect("should grow");
            assert_equivalent(&cache, &leaves);
        }
    }

    #[test]
    fn append_via_update_leaf() {
        let mut cache = TreeHashCache::new(5, 0);
        let leaves: Vec<_> = (1..=9).map(hash).collect();

        for (i, leaf) in leaves.iter().enumerate() {
            cache.update_leaf(i, *leaf).expect("appending is allowed");
        }
        cache
            .update_merkle_root((0..leaves.len()).collect())
            .expect("should compute");
        assert_equivalent(&cache, &leaves);
    }

    #[test]
    fn too_many_leaves() {
        let mut cache = TreeHashCache::new(2, 0);
        let leaves: Vec<_> = (1..=5).map(|i| hash(i).to_fixed_bytes()).collect();
        assert_eq!(
            cache.recalculate_merkle_root(leaves.into_iter()),
            Err(Error::TooManyLeaves)
        );
    }

    #[test]
    fn shrinking_is_rejected() {
        let mut cache = TreeHashCache::new(3, 4);
        cache
            .recalculate_merkle_root((1..5usize).map(|i| hash(i as u64).to_fixed_bytes()))
            .expect("should build");
        assert_eq!(
            cache.recalculate_merkle_root((1..4usize).map(|i| hash(i as u64).to_fixed_bytes())),
            Err(Error::CannotShrink)
        );
    }

    #[test]
    fn update_leaf_out_of_bounds() {
        let mut cache = TreeHashCache::new(3, 2);
        cache
            .recalculate_merkle_root((1..3usize).map(|i| hash(i as u64).to_fixed_bytes()))
            .expect("should build");
        assert_eq!(
            cache.update_leaf(3, hash(9)),
            Err(Error::LeafOutOfBounds(3))
        );
    }

    #[test]
    fn int_log_values() {
        assert_eq!(int_log(1), 0);
        assert_eq!(int_log(2), 1);
        assert_eq!(int_log(3), 2);
        assert_eq!(int_log(4), 2);
        assert_eq!(int_log(8192), 13);
    }
}
