//! A bounded cache of committee shufflings, keyed by seed.
//!
//! Entries are immutable once inserted (a seed fully determines the
//! shuffling), so hits hand out a cheap `Arc` clone. The cache is fed at
//! epoch boundaries for the current and next epoch.

use crate::metrics;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;
use types::{BeaconState, BeaconStateError, ChainSpec, CommitteeCache, Domain, EthSpec, Hash256,
    RelativeEpoch};

/// The size of the shuffling cache: ample for the current/next epoch pattern
/// plus short reorgs.
const DEFAULT_CACHE_SIZE: usize = 16;

pub struct ShufflingCache {
    cache: Mutex<LruCache<Hash256, Arc<CommitteeCache>>>,
}

impl Default for ShufflingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl ShufflingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, seed: Hash256) -> Option<Arc<CommitteeCache>> {
        let cached = self.cache.lock().get(&seed).cloned();
        if cached.is_some() {
            metrics::inc_counter(&metrics::SHUFFLING_CACHE_HITS);
        } else {
            metrics::inc_counter(&metrics::SHUFFLING_CACHE_MISSES);
        }
        cached
    }

    pub fn contains(&self, seed: Hash256) -> bool {
        self.cache.lock().contains(&seed)
    }

    pub fn insert(&self, seed: Hash256, committee_cache: Arc<CommitteeCache>) {
        let mut cache = self.cache.lock();
        if !cache.contains(&seed) {
            cache.put(seed, committee_cache);
        }
    }
}

/// Feed the state's current- and next-epoch committee caches into the
/// shuffling cache, keyed by their attester seeds.
///
/// Intended to be called at each epoch boundary, once the state's own caches
/// are built.
pub fn update_shuffling_cache<E: EthSpec>(
    cache: &ShufflingCache,
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), BeaconStateError> {
    for relative_epoch in [RelativeEpoch::Current, RelativeEpoch::Next] {
        let epoch = relative_epoch.into_epoch(state.current_epoch());
        let seed = state.get_seed(epoch, Domain::BeaconAttester, spec)?;
        if !cache.contains(seed) {
            let committee_cache = state.committee_cache(relative_epoch)?;
            cache.insert(seed, Arc::clone(committee_cache));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::test_utils::TestingBeaconStateBuilder;
    use types::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[test]
    fn current_and_next_epoch_shufflings_are_cached() {
        let spec = E::default_spec();
        let mut builder = TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(16, &spec);
        builder.build_caches(&spec);
        let (state, _) = builder.build();

        let cache = ShufflingCache::default();
        update_shuffling_cache(&cache, &state, &spec).expect("should update");

        for relative_epoch in [RelativeEpoch::Current, RelativeEpoch::Next] {
            let epoch = relative_epoch.into_epoch(state.current_epoch());
            let seed = state
                .get_seed(epoch, Domain::BeaconAttester, &spec)
                .unwrap();
            let cached = cache.get(seed).expect("shuffling should be cached");
            assert_eq!(
                cached.shuffling(),
                state.committee_cache(relative_epoch).unwrap().shuffling()
            );
        }
    }

    #[test]
    fn reinsertion_does_not_replace() {
        let cache = ShufflingCache::default();
        let seed = Hash256::from_low_u64_be(1);

        let first = Arc::new(CommitteeCache::default());
        cache.insert(seed, Arc::clone(&first));
        cache.insert(seed, Arc::new(CommitteeCache::default()));

        let cached = cache.get(seed).expect("should hit");
        assert!(Arc::ptr_eq(&cached, &first));
    }
}
