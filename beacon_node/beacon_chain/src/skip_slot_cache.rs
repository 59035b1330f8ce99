//! Memoizes skip-slot state advancements and deduplicates concurrent
//! computation of the same advancement.
//!
//! Several tasks frequently need the same state advanced to the same future
//! slot (e.g. a burst of attestations targeting the next epoch before its
//! first block arrives). The first caller marks the key in-progress and
//! computes; the rest block on a condvar and then read the memoized result,
//! so the expensive advancement runs at most once per key.

use crate::metrics;
use ethereum_hashing::hash32_concat;
use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use state_processing::state_advance::StateSkipCache;
use state_processing::{process_slots, Cancellation, StateAdvanceError};
use types::{BeaconState, ChainSpec, EthSpec, Hash256, Slot};

/// The number of advanced states held. Each entry can be tens of megabytes;
/// the hit pattern is strongly biased to the most recent couple of keys.
const DEFAULT_CACHE_SIZE: usize = 8;

/// Returned by `mark_in_progress` when another caller already owns the key.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct AlreadyInProgress;

struct Inner<E: EthSpec> {
    results: LruCache<Hash256, BeaconState<E>>,
    in_progress: Vec<Hash256>,
}

/// See the module-level documentation.
pub struct SkipSlotCache<E: EthSpec> {
    inner: Mutex<Inner<E>>,
    complete: Condvar,
}

impl<E: EthSpec> Default for SkipSlotCache<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl<E: EthSpec> SkipSlotCache<E> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                results: LruCache::new(capacity),
                in_progress: Vec::new(),
            }),
            complete: Condvar::new(),
        }
    }

    /// The cache key: a digest of the pre-advancement state root and the
    /// requested slot.
    pub fn key(pre_state_root: Hash256, target_slot: Slot) -> Hash256 {
        let mut slot_bytes = [0; 32];
        slot_bytes[0..8].copy_from_slice(&target_slot.as_u64().to_le_bytes());
        Hash256::from(hash32_concat(pre_state_root.as_bytes(), &slot_bytes))
    }

    /// Claim the key for computation. Returns `Err(AlreadyInProgress)` if
    /// another caller holds it; that caller should `wait` and then re-read.
    pub fn mark_in_progress(
        &self,
        pre_state_root: Hash256,
        target_slot: Slot,
    ) -> Result<(), AlreadyInProgress> {
        let key = Self::key(pre_state_root, target_slot);
        let mut inner = self.inner.lock();
        if inner.in_progress.contains(&key) {
            Err(AlreadyInProgress)
        } else {
            inner.in_progress.push(key);
            Ok(())
        }
    }

    /// Release the key and wake every waiter. Must be called by the claimant
    /// on every exit path, success or not.
    pub fn mark_not_in_progress(&self, pre_state_root: Hash256, target_slot: Slot) {
        let key = Self::key(pre_state_root, target_slot);
        let mut inner = self.inner.lock();
        inner.in_progress.retain(|k| *k != key);
        drop(inner);
        self.complete.notify_all();
    }

    /// Block until the key is no longer marked in-progress.
    pub fn wait(&self, pre_state_root: Hash256, target_slot: Slot) {
        let key = Self::key(pre_state_root, target_slot);
        let mut inner = self.inner.lock();
        while inner.in_progress.contains(&key) {
            self.complete.wait(&mut inner);
        }
    }
}

impl<E: EthSpec> StateSkipCache<E> for SkipSlotCache<E> {
    fn get(&self, pre_state_root: Hash256, target_slot: Slot) -> Option<BeaconState<E>> {
        let key = Self::key(pre_state_root, target_slot);
        let cached = self.inner.lock().results.get(&key).cloned();
        if cached.is_some() {
            metrics::inc_counter(&metrics::SKIP_SLOT_CACHE_HITS);
        } else {
            metrics::inc_counter(&metrics::SKIP_SLOT_CACHE_MISSES);
        }
        cached
    }

    fn put(&self, pre_state_root: Hash256, target_slot: Slot, state: &BeaconState<E>) {
        let key = Self::key(pre_state_root, target_slot);
        self.inner.lock().results.put(key, state.clone());
    }
}

/// Advance `state` to `target_slot`, deduplicating against concurrent
/// advancements of the same state.
///
/// Implements the cache protocol: claim the key and compute, or wait for the
/// claimant and adopt its result. A waiter whose claimant failed (or was
/// cancelled short of the target) falls back to computing the remainder
/// itself.
pub fn advance_state_to_slot<E: EthSpec>(
    ctx: &Cancellation,
    cache: &SkipSlotCache<E>,
    state: &mut BeaconState<E>,
    target_slot: Slot,
    spec: &ChainSpec,
    log: &slog::Logger,
) -> Result<(), StateAdvanceError> {
    let pre_state_root = state
        .update_tree_hash_cache()
        .map_err(StateAdvanceError::BeaconStateError)?;

    match cache.mark_in_progress(pre_state_root, target_slot) {
        Ok(()) => {
            let result = process_slots(ctx, state, target_slot, Some(cache), spec);
            cache.mark_not_in_progress(pre_state_root, target_slot);
            result
        }
        Err(AlreadyInProgress) => {
            metrics::inc_counter(&metrics::SKIP_SLOT_CACHE_WAITS);
            cache.wait(pre_state_root, target_slot);

            if let Some(cached) = cache.get(pre_state_root, target_slot) {
                if cached.slot() <= target_slot && cached.slot() > state.slot() {
                    *state = cached;
                }
            }

            if state.slot() == target_slot {
                Ok(())
            } else {
                slog::debug!(
                    log,
                    "Skip slot cache wait did not yield a complete state";
                    "target_slot" => target_slot.as_u64(),
                    "reached_slot" => state.slot().as_u64(),
                );
                process_slots(ctx, state, target_slot, Some(cache), spec)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use types::test_utils::TestingBeaconStateBuilder;
    use types::MinimalEthSpec;

    type E = MinimalEthSpec;

    fn test_state() -> (BeaconState<E>, ChainSpec) {
        let spec = E::default_spec();
        let mut builder = TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(16, &spec);
        builder.build_caches(&spec);
        let (state, _) = builder.build();
        (state, spec)
    }

    fn null_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn keys_are_distinct_per_root_and_slot() {
        let root_a = Hash256::from_low_u64_be(1);
        let root_b = Hash256::from_low_u64_be(2);

        assert_ne!(
            SkipSlotCache::<E>::key(root_a, Slot::new(5)),
            SkipSlotCache::<E>::key(root_b, Slot::new(5))
        );
        assert_ne!(
            SkipSlotCache::<E>::key(root_a, Slot::new(5)),
            SkipSlotCache::<E>::key(root_a, Slot::new(6))
        );
    }

    #[test]
    fn in_progress_protocol() {
        let cache = SkipSlotCache::<E>::default();
        let root = Hash256::from_low_u64_be(1);
        let slot = Slot::new(5);

        assert_eq!(cache.mark_in_progress(root, slot), Ok(()));
        assert_eq!(cache.mark_in_progress(root, slot), Err(AlreadyInProgress));
        // A different key is claimable concurrently.
        assert_eq!(cache.mark_in_progress(root, Slot::new(6)), Ok(()));

        cache.mark_not_in_progress(root, slot);
        assert_eq!(cache.mark_in_progress(root, slot), Ok(()));
    }

    /// Concurrent callers requesting the same advancement all end on the
    /// same state, and none deadlocks.
    #[test]
    fn thundering_herd_converges() {
        let (state, spec) = test_state();
        let cache = Arc::new(SkipSlotCache::<E>::default());
        let target = Slot::new(E::slots_per_epoch() + 1);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let spec = spec.clone();
                let mut state = state.clone();
                std::thread::spawn(move || {
                    advance_state_to_slot(
                        &Cancellation::default(),
                        &cache,
                        &mut state,
                        target,
                        &spec,
                        &null_logger(),
                    )
                    .expect("advance should succeed");
                    state.update_tree_hash_cache().expect("should hash")
                })
            })
            .collect();

        let roots: Vec<Hash256> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread should not panic"))
            .collect();

        assert!(roots.windows(2).all(|pair| pair[0] == pair[1]));
    }

    /// A cancelled claimant publishes partial progress; a successor absorbs
    /// it and completes the advancement.
    #[test]
    fn cancelled_claimant_leaves_partial_progress() {
        let (state, spec) = test_state();
        let cache = SkipSlotCache::<E>::default();
        let target = Slot::new(6);
        let log = null_logger();

        // Cancel after claiming: the claimant aborts without progress.
        let ctx = Cancellation::default();
        ctx.cancel("shutdown");
        let mut first = state.clone();
        let result = advance_state_to_slot(&ctx, &cache, &mut first, target, &spec, &log);
        assert!(matches!(result, Err(StateAdvanceError::Cancelled { .. })));

        // The key must have been released: a fresh caller can claim and
        // complete.
        let mut second = state.clone();
        advance_state_to_slot(
            &Cancellation::default(),
            &cache,
            &mut second,
            target,
            &spec,
            &log,
        )
        .expect("fresh advance should succeed");
        assert_eq!(second.slot(), target);
    }
}
