#![cfg(test)]

use crate::beacon_state::Error;
use crate::test_utils::TestingBeaconStateBuilder;
use crate::*;
use ssz::{Decode, Encode};
use std::collections::HashSet;

type E = MinimalEthSpec;

fn test_state(validator_count: usize) -> (BeaconState<E>, ChainSpec) {
    let spec = E::default_spec();
    let (state, _) =
        TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(validator_count, &spec).build();
    (state, spec)
}

mod tree_hash {
    use super::*;

    /// The incremental root must equal the standard full rebuild after any
    /// sequence of tracked mutations.
    #[test]
    fn cache_matches_full_rebuild_through_mutations() {
        let (mut state, _spec) = test_state(16);

        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());

        // Scalar mutation.
        *state.slot_mut() = Slot::new(5);
        // Tracked validator mutation.
        state.get_validator_mut(3).unwrap().effective_balance = 17_000_000_000;
        // Tracked balance mutation.
        *state.get_balance_mut(7).unwrap() = 31_000_000_000;
        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());

        // Registry append.
        state
            .push_validator(Validator::default(), 32_000_000_000)
            .unwrap();
        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());

        // Circular-buffer write.
        state
            .set_block_root(Slot::new(4), Hash256::from_low_u64_be(99))
            .unwrap();
        // List append.
        state
            .eth1_data_votes_mut()
            .push(Eth1Data::default())
            .unwrap();
        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());
    }

    /// Attestation rotation shrinks the current-epoch list; the cache must
    /// absorb it rather than erroring.
    #[test]
    fn cache_survives_attestation_rotation() {
        let (mut state, _spec) = test_state(16);

        let attestation = PendingAttestation::<E> {
            aggregation_bits: BitList::with_capacity(4).unwrap(),
            data: AttestationData::default(),
            inclusion_delay: 1,
            proposer_index: 0,
        };

        for _ in 0..3 {
            state
                .current_epoch_attestations_mut()
                .push(attestation.clone())
                .unwrap();
        }
        state.update_tree_hash_cache().unwrap();

        let rotated = std::mem::take(state.current_epoch_attestations_mut());
        *state.previous_epoch_attestations_mut() = rotated;
        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());
    }

    /// A clone shares the tries; writes on either side must not corrupt the
    /// other's roots.
    #[test]
    fn cloned_states_diverge_safely() {
        let (mut state, _spec) = test_state(16);
        state.update_tree_hash_cache().unwrap();

        let mut fork = state.clone();
        fork.get_validator_mut(0).unwrap().slashed = true;

        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());
        assert_eq!(fork.update_tree_hash_cache().unwrap(), fork.canonical_root());
        assert_ne!(state.canonical_root(), fork.canonical_root());
    }
}

mod ssz_round_trip {
    use super::*;

    #[test]
    fn round_trip() {
        let (mut state, spec) = test_state(8);
        state.build_caches(&spec).unwrap();

        let bytes = state.as_ssz_bytes();
        let decoded = BeaconState::<E>::from_ssz_bytes(&bytes).unwrap();

        // The decoded state has no caches.
        state.drop_all_caches();
        assert_eq!(state, decoded);
        assert_eq!(state.canonical_root(), decoded.canonical_root());
    }
}

mod committees {
    use super::*;

    /// Committees at an epoch must partition the active validator set.
    #[test]
    fn committees_partition_active_validators() {
        let validator_count = 97;
        let (mut state, spec) = test_state(validator_count);
        state.build_all_committee_caches(&spec).unwrap();

        let epoch = state.current_epoch();
        let mut seen = HashSet::new();
        let mut covered = 0;

        for slot in epoch.slot_iter(E::slots_per_epoch()) {
            let committee_count = state.get_committee_count_at_slot(slot).unwrap();
            for index in 0..committee_count {
                let committee = state.get_beacon_committee(slot, index).unwrap();
                for &validator in committee.committee {
                    // Pairwise disjoint.
                    assert!(seen.insert(validator));
                    covered += 1;
                }
            }
        }

        let active: HashSet<usize> = state
            .get_active_validator_indices(epoch)
            .into_iter()
            .collect();
        assert_eq!(covered, active.len());
        assert_eq!(seen, active);
    }

    /// Rebuilding a cache from the same state yields the same shuffling.
    #[test]
    fn shuffling_is_seed_stable() {
        let (mut state, spec) = test_state(64);
        state.build_all_committee_caches(&spec).unwrap();

        let rebuilt =
            CommitteeCache::initialized(&state, state.current_epoch(), &spec).unwrap();
        assert_eq!(
            rebuilt.shuffling(),
            state
                .committee_cache(RelativeEpoch::Current)
                .unwrap()
                .shuffling()
        );
    }

    /// An out-of-range committee index must not resolve.
    #[test]
    fn committee_index_out_of_range() {
        let (mut state, spec) = test_state(8);
        state.build_all_committee_caches(&spec).unwrap();

        let slot = state.slot();
        let count = state.get_committee_count_at_slot(slot).unwrap();
        assert_eq!(count, 1);
        assert!(state.get_beacon_committee(slot, count).is_err());
    }

    #[test]
    fn uninitialized_cache_is_an_error() {
        let (state, _spec) = test_state(8);
        assert_eq!(
            state.committee_cache(RelativeEpoch::Current).err(),
            Some(Error::CommitteeCacheUninitialized(Some(
                RelativeEpoch::Current
            )))
        );
    }
}

mod proposers {
    use super::*;

    #[test]
    fn proposer_selection_is_deterministic_and_active() {
        let (mut state, spec) = test_state(64);
        state.build_all_committee_caches(&spec).unwrap();

        let slot = state.slot();
        let a = state.get_beacon_proposer_index(slot, &spec).unwrap();
        let b = state.get_beacon_proposer_index(slot, &spec).unwrap();
        assert_eq!(a, b);
        assert!(state.validators()[a].is_active_at(state.current_epoch()));
    }

    #[test]
    fn proposer_indices_cover_the_epoch() {
        let (mut state, spec) = test_state(64);
        state.build_all_committee_caches(&spec).unwrap();

        let indices = state.get_beacon_proposer_indices(&spec).unwrap();
        assert_eq!(indices.len(), E::slots_per_epoch() as usize);

        for (offset, &index) in indices.iter().enumerate() {
            let slot = state.current_epoch().start_slot(E::slots_per_epoch()) + offset as u64;
            assert_eq!(state.get_beacon_proposer_index(slot, &spec).unwrap(), index);
        }
    }
}

mod randao {
    use super::*;

    #[test]
    fn mix_window_is_enforced() {
        let (mut state, _spec) = test_state(8);
        *state.slot_mut() = Epoch::new(3).start_slot(E::slots_per_epoch());

        assert!(state.get_randao_mix(Epoch::new(3)).is_ok());
        // The next epoch is readable only through the setter path.
        assert_eq!(
            state.get_randao_mix(Epoch::new(4)).err(),
            Some(Error::EpochOutOfBounds)
        );
        assert!(state
            .set_randao_mix(Epoch::new(4), Hash256::zero())
            .is_ok());
    }
}
