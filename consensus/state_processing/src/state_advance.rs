//! This module contains functions for advancing a `BeaconState` forward some
//! number of slots without blocks (i.e., skip slots).
//!
//! These functions are not in the specification, however they're defined here
//! to reduce code duplication and protect against some easy-to-make mistakes
//! when performing state advances.

use crate::per_slot_processing;
use crate::Cancellation;
use types::{BeaconState, ChainSpec, EthSpec, Hash256, Slot};

#[derive(Debug, PartialEq)]
pub enum Error {
    BadTargetSlot { target_slot: Slot, state_slot: Slot },
    PerSlotProcessing(per_slot_processing::Error),
    StateRootNotProvided,
    BeaconStateError(types::BeaconStateError),
    /// The cancellation context fired. Partial progress may have been
    /// published to the skip-slot cache.
    Cancelled { cause: Option<String> },
}

impl From<types::BeaconStateError> for Error {
    fn from(e: types::BeaconStateError) -> Self {
        Self::BeaconStateError(e)
    }
}

impl From<per_slot_processing::Error> for Error {
    fn from(e: per_slot_processing::Error) -> Self {
        Self::PerSlotProcessing(e)
    }
}

/// The memoization hook consulted by `process_slots`.
///
/// Implementations (see the beacon-chain crate) deduplicate concurrent
/// advancements of the same state and keep a bounded store of results. A
/// cache failure must degrade to a miss, never to an error.
pub trait StateSkipCache<E: EthSpec>: Sync {
    /// Return a previously advanced copy of the state with `pre_state_root`,
    /// advanced *towards* (not necessarily to) `target_slot`.
    fn get(&self, pre_state_root: Hash256, target_slot: Slot) -> Option<BeaconState<E>>;

    /// Publish an advanced state, keyed by its pre-advancement root and the
    /// requested target slot.
    fn put(&self, pre_state_root: Hash256, target_slot: Slot, state: &BeaconState<E>);
}

/// Advance the `state` to the given `target_slot`, assuming there were no
/// blocks in between, consulting and feeding the skip-slot cache and polling
/// the cancellation context between slots.
///
/// ## Errors
///
/// - If `state.slot >= target_slot`, an error is returned: a no-op advance
///   indicates confusion in the caller.
/// - On cancellation, partial progress is published to the cache (the
///   caller's copy of the state also retains it) and `Error::Cancelled` is
///   returned.
pub fn process_slots<E: EthSpec>(
    ctx: &Cancellation,
    state: &mut BeaconState<E>,
    target_slot: Slot,
    cache: Option<&dyn StateSkipCache<E>>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if state.slot() >= target_slot {
        return Err(Error::BadTargetSlot {
            target_slot,
            state_slot: state.slot(),
        });
    }

    // The root of the un-advanced state keys the cache, and doubles as the
    // known state root for the first `per_slot_processing` call.
    let pre_state_root = state.update_tree_hash_cache()?;
    let initial_slot = state.slot();

    // Adopt a memoized advancement if one exists and is further along; it
    // may fall short of the target (a previously cancelled advance), in
    // which case the loop below completes it.
    if let Some(cache) = cache {
        if let Some(cached) = cache.get(pre_state_root, target_slot) {
            if cached.slot() > state.slot() && cached.slot() <= target_slot {
                *state = cached;
            }
            if state.slot() == target_slot {
                return Ok(());
            }
        }
    }

    let mut state_root_opt = if state.slot() == initial_slot {
        Some(pre_state_root)
    } else {
        None
    };

    while state.slot() < target_slot {
        if ctx.is_cancelled() {
            if let Some(cache) = cache {
                if state.slot() > initial_slot {
                    cache.put(pre_state_root, target_slot, state);
                }
            }
            return Err(Error::Cancelled { cause: ctx.cause() });
        }

        per_slot_processing(state, state_root_opt.take(), spec)?;
    }

    if let Some(cache) = cache {
        if state.slot() > initial_slot {
            cache.put(pre_state_root, target_slot, state);
        }
    }

    Ok(())
}

/// Advances the `state` to the given `target_slot`, assuming that there were
/// no blocks between these slots.
///
/// ## Errors
///
/// - If `state.slot > target_slot`, an error will be returned.
///
/// ## Notes
///
/// This state advance method is "complete"; it outputs a perfectly valid
/// `BeaconState` and doesn't do anything hacky like the "partial" method (see
/// `partial_state_advance`).
pub fn complete_state_advance<T: EthSpec>(
    state: &mut BeaconState<T>,
    mut state_root_opt: Option<Hash256>,
    target_slot: Slot,
    spec: &ChainSpec,
) -> Result<(), Error> {
    check_target_slot(state.slot(), target_slot)?;

    while state.slot() < target_slot {
        // Use the initial state root on the first iteration of the loop, then
        // use `None` for any future iterations.
        let state_root_opt = state_root_opt.take();

        per_slot_processing(state, state_root_opt, spec)?;
    }

    Ok(())
}

/// Advances the `state` to the given `target_slot`, assuming that there were
/// no blocks between these slots.
///
/// This is a "partial" state advance which outputs an **invalid**
/// `BeaconState`. The state is invalid because the intermediate state roots
/// are not computed. Avoiding computing state roots saves *a lot* of compute
/// time and can be a useful optimization when a state only needs to be
/// advanced to obtain proposer/attester shuffling as they are indifferent to
/// state roots.
///
/// For clarity, **be careful with this function as it produces invalid
/// states**.
///
/// ## Errors
///
/// - If `state.slot > target_slot`, an error will be returned.
/// - If `state_root_opt.is_none()` but the latest block header requires a
///   state root.
pub fn partial_state_advance<T: EthSpec>(
    state: &mut BeaconState<T>,
    state_root_opt: Option<Hash256>,
    target_slot: Slot,
    spec: &ChainSpec,
) -> Result<(), Error> {
    check_target_slot(state.slot(), target_slot)?;

    // The only time that a state root is mandatory is if a block has been
    // applied to the state without it yet being advanced another slot.
    //
    // Failing to provide a state root in this scenario would result in
    // corrupting the `state.block_roots` array, since the
    // `state.latest_block_header` would contain an invalid (all-zeros) state
    // root.
    let mut initial_state_root = Some(if state.slot() > state.latest_block_header().slot {
        state_root_opt.unwrap_or_else(Hash256::zero)
    } else {
        state_root_opt.ok_or(Error::StateRootNotProvided)?
    });

    while state.slot() < target_slot {
        // Use the initial state root on the first iteration of the loop, then
        // use `[0; 32]` for any later iterations.
        //
        // Failing to provide the correct state root on the initial iteration
        // may result in corrupting the `state.block_roots` array since the
        // latest block header may not be updated with the correct state root.
        let state_root = initial_state_root.take().unwrap_or_else(Hash256::zero);

        per_slot_processing(state, Some(state_root), spec)?;
    }

    Ok(())
}

fn check_target_slot(state_slot: Slot, target_slot: Slot) -> Result<(), Error> {
    if state_slot > target_slot {
        Err(Error::BadTargetSlot {
            target_slot,
            state_slot,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::per_slot_processing;
    use crate::test_utils::{fresh_state, E};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A trivial skip cache for tests: exact-key map, no eviction, counters.
    #[derive(Default)]
    struct TestCache {
        map: Mutex<HashMap<(Hash256, Slot), BeaconState<E>>>,
        hits: Mutex<u64>,
        puts: Mutex<u64>,
    }

    impl StateSkipCache<E> for TestCache {
        fn get(&self, pre_state_root: Hash256, target_slot: Slot) -> Option<BeaconState<E>> {
            let cached = self
                .map
                .lock()
                .get(&(pre_state_root, target_slot))
                .cloned();
            if cached.is_some() {
                *self.hits.lock() += 1;
            }
            cached
        }

        fn put(&self, pre_state_root: Hash256, target_slot: Slot, state: &BeaconState<E>) {
            *self.puts.lock() += 1;
            self.map
                .lock()
                .insert((pre_state_root, target_slot), state.clone());
        }
    }

    /// Advancing N slots at once must equal N one-at-a-time advancements on
    /// an independent clone.
    #[test]
    fn process_slots_matches_slot_by_slot_composition() {
        let (state, _, spec) = fresh_state(16);
        let target = Slot::new(E::slots_per_epoch() + 3);

        let mut bulk = state.clone();
        process_slots(&Cancellation::default(), &mut bulk, target, None, &spec)
            .expect("bulk advance should succeed");

        let mut stepped = state.clone();
        while stepped.slot() < target {
            per_slot_processing(&mut stepped, None, &spec).expect("step should succeed");
        }

        assert_eq!(bulk.slot(), target);
        assert_eq!(
            bulk.update_tree_hash_cache().unwrap(),
            stepped.update_tree_hash_cache().unwrap()
        );
    }

    /// A cache-hit advancement must equal a cache-miss advancement for the
    /// same key.
    #[test]
    fn cache_hit_equals_cache_miss() {
        let (state, _, spec) = fresh_state(16);
        let target = Slot::new(5);
        let cache = TestCache::default();

        let mut miss = state.clone();
        process_slots(&Cancellation::default(), &mut miss, target, Some(&cache), &spec).unwrap();
        assert_eq!(*cache.puts.lock(), 1);

        let mut hit = state.clone();
        process_slots(&Cancellation::default(), &mut hit, target, Some(&cache), &spec).unwrap();
        assert_eq!(*cache.hits.lock(), 1);

        assert_eq!(
            hit.update_tree_hash_cache().unwrap(),
            miss.update_tree_hash_cache().unwrap()
        );
    }

    #[test]
    fn no_op_advance_is_an_error() {
        let (mut state, _, spec) = fresh_state(16);
        let slot = state.slot();

        assert!(matches!(
            process_slots(&Cancellation::default(), &mut state, slot, None, &spec),
            Err(Error::BadTargetSlot { .. })
        ));
    }

    /// A pre-cancelled context aborts before any work; partial progress is
    /// not fabricated.
    #[test]
    fn cancellation_aborts_without_progress() {
        let (mut state, _, spec) = fresh_state(16);
        let cache = TestCache::default();
        let ctx = Cancellation::default();
        ctx.cancel("test shutdown");

        let result = process_slots(&ctx, &mut state, Slot::new(4), Some(&cache), &spec);

        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert_eq!(state.slot(), Slot::new(0));
        assert_eq!(*cache.puts.lock(), 0);
    }

    /// A partially-advanced cached state is adopted and then completed.
    #[test]
    fn partial_cached_state_is_completed() {
        let (state, _, spec) = fresh_state(16);
        let cache = TestCache::default();
        let target = Slot::new(6);

        // Simulate a cancelled advance that reached slot 3.
        let pre_root = state.clone().update_tree_hash_cache().unwrap();
        let mut partial = state.clone();
        process_slots(
            &Cancellation::default(),
            &mut partial,
            Slot::new(3),
            None,
            &spec,
        )
        .unwrap();
        cache.put(pre_root, target, &partial);

        let mut resumed = state.clone();
        process_slots(&Cancellation::default(), &mut resumed, target, Some(&cache), &spec)
            .unwrap();
        assert_eq!(resumed.slot(), target);

        // Equal to a from-scratch advance.
        let mut scratch = state.clone();
        process_slots(&Cancellation::default(), &mut scratch, target, None, &spec).unwrap();
        assert_eq!(
            resumed.update_tree_hash_cache().unwrap(),
            scratch.update_tree_hash_cache().unwrap()
        );
    }
}
