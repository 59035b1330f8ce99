use super::Error;
use crate::{BeaconState, EthSpec, Hash256, Unsigned, Validator};
use cached_tree_hash::{int_log, Error as CacheError, TreeHashCache};
use rayon::prelude::*;
use std::marker::PhantomData;
use std::sync::Arc;
use tree_hash::{mix_in_length, TreeHash};

/// The number of fields on the beacon state.
const NUM_BEACON_STATE_FIELDS: usize = 21;

/// The number of `u64` values packed into one 32-byte tree-hash chunk.
const U64S_PER_CHUNK: usize = 4;

/// Incremental hash-tree-root machinery for an entire `BeaconState`.
///
/// Holds one `TreeHashCache` per list/vector field, each behind an `Arc` so
/// that cloning the state shares every layer of every trie; a field's trie is
/// forked (`Arc::make_mut`) the first time it is recomputed after a clone.
///
/// Scalar and small container fields are cheap to hash directly and carry no
/// trie.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct BeaconTreeHashCache<T: EthSpec> {
    inner: Option<BeaconTreeHashCacheInner<T>>,
}

impl<T: EthSpec> BeaconTreeHashCache<T> {
    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Move the inner cache out so that the containing `BeaconState` can be
    /// borrowed immutably during root recalculation.
    pub fn take(&mut self) -> Option<BeaconTreeHashCacheInner<T>> {
        self.inner.take()
    }

    pub fn restore(&mut self, inner: BeaconTreeHashCacheInner<T>) {
        self.inner = Some(inner);
    }

    /// Record that the validator at `index` has been mutated.
    ///
    /// A no-op before the first full build: an uninitialized cache hashes
    /// every leaf anyway.
    pub fn mark_validator_dirty(&mut self, index: usize) {
        if let Some(inner) = &mut self.inner {
            inner.dirty_validators.push(index);
        }
    }

    /// Record that the balance at `index` has been mutated.
    pub fn mark_balance_dirty(&mut self, index: usize) {
        if let Some(inner) = &mut self.inner {
            inner.dirty_balances.push(index / U64S_PER_CHUNK);
        }
    }

    /// Drop the cache entirely, forcing a full rebuild on next use.
    pub fn uninitialize(&mut self) {
        self.inner = None;
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct BeaconTreeHashCacheInner<T: EthSpec> {
    block_roots: Arc<TreeHashCache>,
    state_roots: Arc<TreeHashCache>,
    historical_roots: Arc<TreeHashCache>,
    eth1_data_votes: Arc<TreeHashCache>,
    validators: Arc<TreeHashCache>,
    balances: Arc<TreeHashCache>,
    randao_mixes: Arc<TreeHashCache>,
    slashings: Arc<TreeHashCache>,
    previous_epoch_attestations: Arc<TreeHashCache>,
    current_epoch_attestations: Arc<TreeHashCache>,
    /// Validator indices mutated since the last root computation.
    dirty_validators: Vec<usize>,
    /// Balance *chunk* indices mutated since the last root computation.
    dirty_balances: Vec<usize>,
    _phantom: PhantomData<T>,
}

impl<T: EthSpec> BeaconTreeHashCacheInner<T> {
    /// Instantiates empty tries for every cached field, sized for `state`.
    pub fn new(state: &BeaconState<T>) -> Self {
        let validator_count = state.validators().len();

        Self {
            block_roots: new_cache::<T::SlotsPerHistoricalRoot>(T::slots_per_historical_root()),
            state_roots: new_cache::<T::SlotsPerHistoricalRoot>(T::slots_per_historical_root()),
            historical_roots: new_cache::<T::HistoricalRootsLimit>(
                state.historical_roots().len(),
            ),
            eth1_data_votes: new_cache::<T::SlotsPerEth1VotingPeriod>(
                state.eth1_data_votes().len(),
            ),
            validators: new_cache::<T::ValidatorRegistryLimit>(validator_count),
            balances: Arc::new(TreeHashCache::new(
                int_log(T::ValidatorRegistryLimit::to_usize() / U64S_PER_CHUNK),
                chunk_count(validator_count),
            )),
            randao_mixes: new_cache::<T::EpochsPerHistoricalVector>(
                T::epochs_per_historical_vector(),
            ),
            slashings: Arc::new(TreeHashCache::new(
                int_log(T::EpochsPerSlashingsVector::to_usize() / U64S_PER_CHUNK),
                chunk_count(T::EpochsPerSlashingsVector::to_usize()),
            )),
            previous_epoch_attestations: new_cache::<T::MaxPendingAttestations>(0),
            current_epoch_attestations: new_cache::<T::MaxPendingAttestations>(0),
            dirty_validators: vec![],
            dirty_balances: vec![],
            _phantom: PhantomData,
        }
    }

    /// Updates the cache and returns the root of `state`.
    ///
    /// Clean fields reuse their cached subtree roots; dirty fields re-hash
    /// only the paths above their changed leaves.
    pub fn recalculate_tree_hash_root(
        &mut self,
        state: &BeaconState<T>,
    ) -> Result<Hash256, Error> {
        let mut roots = Vec::with_capacity(NUM_BEACON_STATE_FIELDS);

        roots.push(state.genesis_time().tree_hash_root());
        roots.push(state.genesis_validators_root().tree_hash_root());
        roots.push(state.slot().tree_hash_root());
        roots.push(state.fork().tree_hash_root());
        roots.push(state.latest_block_header().tree_hash_root());
        roots.push(
            Arc::make_mut(&mut self.block_roots)
                .recalculate_merkle_root(leaf_iter(state.block_roots()))?,
        );
        roots.push(
            Arc::make_mut(&mut self.state_roots)
                .recalculate_merkle_root(leaf_iter(state.state_roots()))?,
        );
        roots.push(mix_in_length(
            &Arc::make_mut(&mut self.historical_roots)
                .recalculate_merkle_root(leaf_iter(state.historical_roots()))?,
            state.historical_roots().len(),
        ));
        roots.push(state.eth1_data().tree_hash_root());
        roots.push(mix_in_length(
            &recalculate_list_root::<T::SlotsPerEth1VotingPeriod>(
                &mut self.eth1_data_votes,
                state
                    .eth1_data_votes()
                    .iter()
                    .map(|vote| vote.tree_hash_root().to_fixed_bytes())
                    .collect(),
            )?,
            state.eth1_data_votes().len(),
        ));
        roots.push(state.eth1_deposit_index().tree_hash_root());
        roots.push(mix_in_length(
            &self.recalculate_validators_root(state.validators())?,
            state.validators().len(),
        ));
        roots.push(mix_in_length(
            &self.recalculate_balances_root(state.balances())?,
            state.balances().len(),
        ));
        roots.push(
            Arc::make_mut(&mut self.randao_mixes)
                .recalculate_merkle_root(leaf_iter(state.randao_mixes()))?,
        );
        roots.push(
            Arc::make_mut(&mut self.slashings)
                .recalculate_merkle_root(packed_leaf_iter(state.slashings()))?,
        );
        roots.push(mix_in_length(
            &recalculate_list_root::<T::MaxPendingAttestations>(
                &mut self.previous_epoch_attestations,
                pending_attestation_leaves(state.previous_epoch_attestations()),
            )?,
            state.previous_epoch_attestations().len(),
        ));
        roots.push(mix_in_length(
            &recalculate_list_root::<T::MaxPendingAttestations>(
                &mut self.current_epoch_attestations,
                pending_attestation_leaves(state.current_epoch_attestations()),
            )?,
            state.current_epoch_attestations().len(),
        ));
        roots.push(state.justification_bits().tree_hash_root());
        roots.push(state.previous_justified_checkpoint().tree_hash_root());
        roots.push(state.current_justified_checkpoint().tree_hash_root());
        roots.push(state.finalized_checkpoint().tree_hash_root());

        let mut bytes = Vec::with_capacity(NUM_BEACON_STATE_FIELDS * 32);
        for root in &roots {
            bytes.extend_from_slice(root.as_bytes());
        }

        Ok(tree_hash::merkle_root(&bytes, 0))
    }

    /// Re-hash only the validators recorded dirty, plus any appended ones.
    fn recalculate_validators_root(&mut self, validators: &[Validator]) -> Result<Hash256, Error> {
        let cache = Arc::make_mut(&mut self.validators);
        let known = cache.leaf_count();

        if validators.len() < known {
            return Err(CacheError::CannotShrink.into());
        }

        let mut dirty = std::mem::take(&mut self.dirty_validators);
        dirty.retain(|&i| i < known);

        if known == 0 && !validators.is_empty() {
            // Initial build: hash every validator in parallel.
            let leaves: Vec<[u8; 32]> = validators
                .par_iter()
                .map(|validator| validator.tree_hash_root().to_fixed_bytes())
                .collect();
            for (i, leaf) in leaves.into_iter().enumerate() {
                cache.update_leaf(i, Hash256::from(leaf))?;
                dirty.push(i);
            }
        } else {
            for &i in &dirty {
                let validator = validators.get(i).ok_or(Error::UnknownValidator(i))?;
                cache.update_leaf(i, validator.tree_hash_root())?;
            }
            for (i, validator) in validators.iter().enumerate().skip(known) {
                cache.update_leaf(i, validator.tree_hash_root())?;
                dirty.push(i);
            }
        }

        Ok(cache.update_merkle_root(dirty)?)
    }

    /// Re-pack only the balance chunks recorded dirty, plus any appended ones.
    fn recalculate_balances_root(&mut self, balances: &[u64]) -> Result<Hash256, Error> {
        let cache = Arc::make_mut(&mut self.balances);
        let known_chunks = cache.leaf_count();
        let chunks = chunk_count(balances.len());

        if chunks < known_chunks {
            return Err(CacheError::CannotShrink.into());
        }

        let mut dirty = std::mem::take(&mut self.dirty_balances);
        dirty.retain(|&chunk| chunk < known_chunks);
        dirty.extend(known_chunks..chunks);
        // Appending into a partially-filled trailing chunk changes it too.
        if chunks == known_chunks && chunks > 0 {
            dirty.push(chunks - 1);
        }

        for &chunk in &dirty {
            cache.update_leaf(chunk, Hash256::from(pack_u64_chunk(balances, chunk)))?;
        }

        Ok(cache.update_merkle_root(dirty)?)
    }
}

fn new_cache<N: Unsigned>(leaf_count: usize) -> Arc<TreeHashCache> {
    Arc::new(TreeHashCache::new(int_log(N::to_usize()), leaf_count))
}

fn chunk_count(values: usize) -> usize {
    (values + U64S_PER_CHUNK - 1) / U64S_PER_CHUNK
}

fn leaf_iter(roots: &[Hash256]) -> impl Iterator<Item = [u8; 32]> + ExactSizeIterator + '_ {
    roots.iter().map(|root| root.to_fixed_bytes())
}

/// Packs a slice of `u64` into 32-byte chunks, zero-padded.
fn packed_leaf_iter(values: &[u64]) -> impl Iterator<Item = [u8; 32]> + ExactSizeIterator + '_ {
    (0..chunk_count(values.len())).map(|chunk| pack_u64_chunk(values, chunk))
}

fn pack_u64_chunk(values: &[u64], chunk: usize) -> [u8; 32] {
    let mut bytes = [0; 32];
    for k in 0..U64S_PER_CHUNK {
        if let Some(value) = values.get(chunk * U64S_PER_CHUNK + k) {
            bytes[k * 8..(k + 1) * 8].copy_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

fn pending_attestation_leaves<E: TreeHash>(attestations: &[E]) -> Vec<[u8; 32]> {
    attestations
        .iter()
        .map(|attestation| attestation.tree_hash_root().to_fixed_bytes())
        .collect()
}

/// List fields that legitimately shrink (the per-epoch attestation rotation,
/// the eth1-vote reset) rebuild their trie from scratch instead of erroring.
fn recalculate_list_root<N: Unsigned>(
    cache: &mut Arc<TreeHashCache>,
    leaves: Vec<[u8; 32]>,
) -> Result<Hash256, Error> {
    match Arc::make_mut(cache).recalculate_merkle_root(leaves.iter().copied()) {
        Ok(root) => Ok(root),
        Err(CacheError::CannotShrink) => {
            *cache = Arc::new(TreeHashCache::new(int_log(N::to_usize()), leaves.len()));
            Arc::make_mut(cache)
                .recalculate_merkle_root(leaves.into_iter())
                .map_err(Into::into)
        }
        Err(e) => Err(e.into()),
    }
}
