//! Holds the head state pre-advanced through the slot after its block.
//!
//! A background task advances the head state into the next slot during the
//! quiet tail of the current one; block processing then skips its first
//! `per_slot_processing` call entirely when the parent matches.

use parking_lot::RwLock;
use state_processing::state_advance::StateSkipCache;
use state_processing::{process_slots, Cancellation, StateAdvanceError};
use types::{BeaconState, ChainSpec, EthSpec, Hash256, Slot};

struct Entry<E: EthSpec> {
    /// The root of the head block the state was advanced on top of.
    parent_root: Hash256,
    /// The head state, advanced one slot past the head block.
    state: BeaconState<E>,
}

/// See the module-level documentation.
#[derive(Default)]
pub struct NextSlotCache<E: EthSpec> {
    entry: RwLock<Option<Entry<E>>>,
}

impl<E: EthSpec> NextSlotCache<E> {
    /// Store `state` (already advanced one slot past the block with
    /// `parent_root`), replacing any previous entry.
    pub fn update(&self, parent_root: Hash256, state: BeaconState<E>) {
        *self.entry.write() = Some(Entry { parent_root, state });
    }

    /// Returns the pre-advanced state for `parent_root` if it does not
    /// overshoot `target_slot`.
    pub fn get_state(&self, parent_root: Hash256, target_slot: Slot) -> Option<BeaconState<E>> {
        let entry = self.entry.read();
        entry
            .as_ref()
            .filter(|entry| entry.parent_root == parent_root)
            .filter(|entry| entry.state.slot() <= target_slot)
            .map(|entry| entry.state.clone())
    }
}

/// A specialization of `process_slots` that first consults the next-slot
/// cache, skipping the initial iteration(s) when the parent state was
/// pre-advanced.
pub fn process_slots_using_next_slot_cache<E: EthSpec>(
    ctx: &Cancellation,
    next_slot_cache: &NextSlotCache<E>,
    skip_slot_cache: Option<&dyn StateSkipCache<E>>,
    state: &mut BeaconState<E>,
    parent_root: Hash256,
    target_slot: Slot,
    spec: &ChainSpec,
) -> Result<(), StateAdvanceError> {
    if let Some(pre_advanced) = next_slot_cache.get_state(parent_root, target_slot) {
        if pre_advanced.slot() > state.slot() {
            *state = pre_advanced;
        }
    }

    if state.slot() < target_slot {
        process_slots(ctx, state, target_slot, skip_slot_cache, spec)?;
    }

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
    fn cached_next_slot_state_is_adopted() {
        let spec = E::default_spec();
        let mut builder = TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(16, &spec);
        builder.build_caches(&spec);
        let (state, _) = builder.build();

        let parent_root = Hash256::from_low_u64_be(1);

        // Pre-advance a copy by one slot.
        let mut pre_advanced = state.clone();
        complete_state_advance(&mut pre_advanced, None, Slot::new(1), &spec).unwrap();
        let cache = NextSlotCache::<E>::default();
        cache.update(parent_root, pre_advanced);

        // Advancing to slot 3 starts from the cached slot-1 state.
        let mut via_cache = state.clone();
        process_slots_using_next_slot_cache(
            &Cancellation::default(),
            &cache,
            None,
            &mut via_cache,
            parent_root,
            Slot::new(3),
            &spec,
        )
        .unwrap();

        let mut via_advance = state.clone();
        complete_state_advance(&mut via_advance, None, Slot::new(3), &spec).unwrap();

        assert_eq!(
            via_cache.update_tree_hash_cache().unwrap(),
            via_advance.update_tree_hash_cache().unwrap()
        );

        // An unrelated parent bypasses the cache.
        assert!(cache
            .get_state(Hash256::from_low_u64_be(2), Slot::new(3))
            .is_none());
    }
}
