//! The proposer cache stores the proposer indices for some epoch.
//!
//! This cache is keyed by `(epoch, block_root)` where `block_root` is the
//! block root at `end_slot(epoch - 1 - MIN_SEED_LOOKAHEAD)`: the proposer
//! shuffling is identical for all blocks in `epoch` which share that
//! ancestor.
//!
//! The cache is a fairly unintelligent LRU cache that is not pruned after
//! finality. This makes it very simple to reason about, but it might store
//! values that are useless due to finalization. The values it stores are
//! very small, so this should not be an issue.

use crate::metrics;
use lru::LruCache;
use parking_lot::Mutex;
use smallvec::SmallVec;
use types::{BeaconState, BeaconStateError, ChainSpec, Epoch, EthSpec, Fork, Hash256, Slot,
    Unsigned};

/// The number of sets of proposer indices that should be cached.
const CACHE_SIZE: usize = 16;

/// This value is fairly unimportant, it's used to avoid heap allocations.
/// The result of it being incorrect is non-substantial from a consensus
/// perspective (and probably also from a performance perspective).
const TYPICAL_SLOTS_PER_EPOCH: usize = 32;

/// For some given slot, this contains the proposer index (`index`) and the
/// `fork` that should be used to verify their signature.
pub struct Proposer {
    pub index: usize,
    pub fork: Fork,
}

/// The list of proposers for some given `epoch`, alongside the `fork` that
/// should be used to verify their signatures.
struct EpochBlockProposers {
    /// The epoch to which the proposers pertain.
    epoch: Epoch,
    /// The fork that should be used to verify proposer signatures.
    fork: Fork,
    /// A list of length `E::slots_per_epoch()`, representing the proposers
    /// for each slot in that epoch.
    ///
    /// E.g., if `self.epoch == 1`, then `self.proposers[0]` contains the
    /// proposer for slot `32` (mainnet preset).
    proposers: SmallVec<[usize; TYPICAL_SLOTS_PER_EPOCH]>,
}

/// A cache to store the proposers for some epoch.
///
/// See the module-level documentation for more information.
pub struct BeaconProposerCache {
    cache: Mutex<LruCache<(Epoch, Hash256), EpochBlockProposers>>,
}

impl Default for BeaconProposerCache {
    fn default() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(CACHE_SIZE)),
        }
    }
}

impl BeaconProposerCache {
    /// If it is cached, returns the proposer for the block at `slot` where
    /// the block has the ancestor block root of `shuffling_decision_block`
    /// at `end_slot(slot.epoch() - 1 - MIN_SEED_LOOKAHEAD)`.
    pub fn get_slot<E: EthSpec>(
        &self,
        shuffling_decision_block: Hash256,
        slot: Slot,
    ) -> Option<Proposer> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let key = (epoch, shuffling_decision_block);

        let mut cache = self.cache.lock();
        let entry = cache.get(&key)?;

        if epoch == entry.epoch {
            entry
                .proposers
                .get(slot.as_usize() % E::SlotsPerEpoch::to_usize())
                .map(|&index| Proposer {
                    index,
                    fork: entry.fork,
                })
        } else {
            None
        }
    }

    /// As per `Self::get_slot`, but returns all proposers in all slots for
    /// the given `epoch`.
    pub fn get_epoch<E: EthSpec>(
        &self,
        shuffling_decision_block: Hash256,
        epoch: Epoch,
    ) -> Option<SmallVec<[usize; TYPICAL_SLOTS_PER_EPOCH]>> {
        let key = (epoch, shuffling_decision_block);
        self.cache
            .lock()
            .get(&key)
            .map(|entry| entry.proposers.clone())
    }

    /// Insert the proposers into the cache.
    ///
    /// See `Self::get_slot` for a description of `shuffling_decision_block`.
    ///
    /// The `fork` value must be valid to verify proposer signatures in
    /// `epoch`.
    pub fn insert(
        &self,
        epoch: Epoch,
        shuffling_decision_block: Hash256,
        proposers: Vec<usize>,
        fork: Fork,
    ) {
        let key = (epoch, shuffling_decision_block);
        let mut cache = self.cache.lock();
        if !cache.contains(&key) {
            cache.put(
                key,
                EpochBlockProposers {
                    epoch,
                    fork,
                    proposers: proposers.into(),
                },
            );
        }
    }
}

/// Compute the current-epoch proposers of `state` and feed them into
/// `cache`.
///
/// When the shuffling decision root is unknown (zero), the update is skipped
/// without error; the condition is surfaced through the
/// `PROPOSER_CACHE_ZERO_DECISION_ROOT` metric instead.
pub fn update_proposer_indices_in_cache<E: EthSpec>(
    cache: &BeaconProposerCache,
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), BeaconStateError> {
    let decision_root = state.proposer_shuffling_decision_root(spec)?;
    if decision_root.is_zero() {
        metrics::inc_counter(&metrics::PROPOSER_CACHE_ZERO_DECISION_ROOT);
        return Ok(());
    }

    let proposers = state.get_beacon_proposer_indices(spec)?;
    cache.insert(state.current_epoch(), decision_root, proposers, *state.fork());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use state_processing::state_advance::complete_state_advance;
    use types::test_utils::TestingBeaconStateBuilder;
    use types::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[test]
    fn insert_and_get_round_trip() {
        let cache = BeaconProposerCache::default();
        let root = Hash256::from_low_u64_be(1);
        let epoch = Epoch::new(1);
        let proposers: Vec<usize> = (0..E::slots_per_epoch() as usize).collect();

        cache.insert(epoch, root, proposers.clone(), Fork::default());

        // Slot 9 is the second slot of epoch 1 on the minimal preset.
        let slot = epoch.start_slot(E::slots_per_epoch()) + 1u64;
        let proposer = cache.get_slot::<E>(root, slot).expect("should hit");
        assert_eq!(proposer.index, proposers[1]);

        // Other decision roots miss.
        assert!(cache
            .get_slot::<E>(Hash256::from_low_u64_be(2), slot)
            .is_none());
        // Other epochs miss.
        assert!(cache.get_slot::<E>(root, Slot::new(0)).is_none());
    }

    #[test]
    fn zero_decision_root_is_skipped_silently() {
        let spec = E::default_spec();
        let mut builder = TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(16, &spec);
        builder.build_caches(&spec);
        let (state, _) = builder.build();

        // At genesis the decision slot precedes the state: no update, no
        // error.
        let cache = BeaconProposerCache::default();
        update_proposer_indices_in_cache(&cache, &state, &spec).expect("skip is not an error");
        assert!(cache
            .get_epoch::<E>(Hash256::zero(), state.current_epoch())
            .is_none());
    }

    #[test]
    fn populated_once_decision_root_is_known() {
        let spec = E::default_spec();
        let mut builder = TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(16, &spec);
        builder.build_caches(&spec);
        let (mut state, _) = builder.build();

        // Advance into epoch 3 so `end_slot(epoch - 2)` is a real block root.
        complete_state_advance(
            &mut state,
            None,
            Epoch::new(3).start_slot(E::slots_per_epoch()),
            &spec,
        )
        .unwrap();

        let cache = BeaconProposerCache::default();
        update_proposer_indices_in_cache(&cache, &state, &spec).expect("update should succeed");

        let decision_root = state.proposer_shuffling_decision_root(&spec).unwrap();
        let cached = cache
            .get_epoch::<E>(decision_root, state.current_epoch())
            .expect("proposers should be cached");
        assert_eq!(
            cached.to_vec(),
            state.get_beacon_proposer_indices(&spec).unwrap()
        );
    }
}
