use crate::{Error, Hash256};
use ethereum_hashing::hash32_concat;
use smallvec::SmallVec;

/// Caches every layer of the Merkle tree for one list/vector field.
///
/// `layers[0]` holds the leaves currently present (zero-padding up to
/// `2^depth` is implicit), `layers[depth]` holds the root. Layer lengths are
/// kept at `ceil(len(child) / 2)` so appends only ever extend the right-hand
/// edge of the tree.
#[derive(Debug, PartialEq, Clone)]
pub struct TreeHashCache {
    depth: usize,
    layers: Vec<Vec<Hash256>>,
    /// `zero_hashes[i]` is the root of a fully-zero subtree of depth `i`.
    zero_hashes: SmallVec<[Hash256; 16]>,
}

impl TreeHashCache {
    /// Create a new cache for a tree holding up to `2^depth` leaves, with room
    /// pre-allocated for `leaf_count` of them.
    pub fn new(depth: usize, leaf_count: usize) -> Self {
        let mut zero_hashes: SmallVec<[Hash256; 16]> = SmallVec::with_capacity(depth + 1);
        zero_hashes.push(Hash256::zero());
        for i in 0..depth {
            let lower = zero_hashes[i];
            zero_hashes.push(Hash256::from(hash32_concat(
                lower.as_bytes(),
                lower.as_bytes(),
            )));
        }

        let mut layers = Vec::with_capacity(depth + 1);
        let mut capacity = leaf_count;
        for _ in 0..=depth {
            layers.push(Vec::with_capacity(capacity));
            capacity = (capacity + 1) / 2;
        }

        Self {
            depth,
            layers,
            zero_hashes,
        }
    }

    /// The number of leaves currently stored.
    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// The leaf stored at `i`, if any.
    pub fn leaf(&self, i: usize) -> Option<Hash256> {
        self.layers[0].get(i).copied()
    }

    /// The cached root.
    ///
    /// For variable-length fields the caller mixes the length in on top of
    /// this value (`tree_hash::mix_in_length`).
    pub fn root(&self) -> Hash256 {
        self.layers[self.depth]
            .first()
            .copied()
            .unwrap_or(self.zero_hashes[self.depth])
    }

    /// Overwrite the leaf at `i`, or append it if `i` is the next free slot.
    ///
    /// Does *not* recompute any internal node: the caller accumulates dirty
    /// indices and settles them with a single `update_merkle_root` call.
    pub fn update_leaf(&mut self, i: usize, leaf: Hash256) -> Result<(), Error> {
        let leaves = &mut self.layers[0];
        if i < leaves.len() {
            leaves[i] = leaf;
            Ok(())
        } else if i == leaves.len() {
            if i >= max_leaf_count(self.depth) {
                return Err(Error::TooManyLeaves);
            }
            leaves.push(leaf);
            Ok(())
        } else {
            Err(Error::LeafOutOfBounds(i))
        }
    }

    /// Replace the leaf layer with `leaves`, discovering dirty indices by
    /// comparison, and recompute the root.
    ///
    /// This is the right entry point when the caller has no record of which
    /// positions changed (e.g. after wholesale field replacement). Fields with
    /// index-level dirty tracking use `update_leaf` + `update_merkle_root`
    /// instead.
    pub fn recalculate_merkle_root(
        &mut self,
        leaves: impl Iterator<Item = [u8; 32]> + ExactSizeIterator,
    ) -> Result<Hash256, Error> {
        let new_leaf_count = leaves.len();

        if new_leaf_count < self.leaf_count() {
            return Err(Error::CannotShrink);
        } else if new_leaf_count > max_leaf_count(self.depth) {
            return Err(Error::TooManyLeaves);
        }

        let mut dirty = vec![];
        for (i, new_leaf) in leaves.enumerate() {
            let new_leaf = Hash256::from(new_leaf);
            match self.layers[0].get(i) {
                Some(existing) if *existing == new_leaf => (),
                Some(_) => {
                    self.layers[0][i] = new_leaf;
                    dirty.push(i);
                }
                None => {
                    self.layers[0].push(new_leaf);
                    dirty.push(i);
                }
            }
        }

        self.update_merkle_root(dirty)
    }

    /// Recompute every internal node on the path from each dirty leaf to the
    /// root, leaving all other subtrees untouched.
    ///
    /// `dirty_indices` need not be sorted or unique. An index beyond the leaf
    /// layer is an inconsistency between the caller's dirty tracking and this
    /// cache, and is reported as such.
    pub fn update_merkle_root(&mut self, mut dirty_indices: Vec<usize>) -> Result<Hash256, Error> {
        dirty_indices.sort_unstable();
        dirty_indices.dedup();

        if let Some(&max_dirty) = dirty_indices.last() {
            if max_dirty >= self.leaf_count() {
                return Err(Error::CacheInconsistent);
            }
        } else {
            return Ok(self.root());
        }

        let mut dirty: SmallVec<[usize; 8]> = SmallVec::from_vec(dirty_indices);

        for depth in 0..self.depth {
            let mut parents: SmallVec<[usize; 8]> = SmallVec::new();

            for &i in &dirty {
                let parent = i / 2;
                if parents.last() == Some(&parent) {
                    continue;
                }

                let left = self.layers[depth][parent * 2];
                let right = self.layers[depth]
                    .get(parent * 2 + 1)
                    .copied()
                    .unwrap_or(self.zero_hashes[depth]);
                let node = Hash256::from(hash32_concat(left.as_bytes(), right.as_bytes()));

                let layer = &mut self.layers[depth + 1];
                if parent < layer.len() {
                    layer[parent] = node;
                } else if parent == layer.len() {
                    layer.push(node);
                } else {
                    return Err(Error::CacheInconsistent);
                }

                parents.push(parent);
            }

            dirty = parents;
        }

        Ok(self.root())
    }
}

fn max_leaf_count(depth: usize) -> usize {
    // Depths at or beyond the word size can hold any list this process can
    // address.
    1_usize.checked_shl(depth as u32).unwrap_or(usize::MAX)
}
