#![cfg(test)]

use crate::common::get_attesting_indices;
use crate::per_epoch_processing::process_epoch;
use crate::state_advance::complete_state_advance;
use crate::test_utils::{fresh_state, E};
use types::*;

/// Fill the previous-epoch attestation records with full participation,
/// voting for the canonical target/head roots the state knows.
fn fill_previous_epoch_attestations(state: &mut BeaconState<E>) {
    let previous_epoch = state.previous_epoch();
    let target_root = *state
        .get_block_root(previous_epoch.start_slot(E::slots_per_epoch()))
        .expect("target root is in range");

    for slot in previous_epoch.slot_iter(E::slots_per_epoch()) {
        let committee_count = state
            .get_committee_count_at_slot(slot)
            .expect("committee cache is primed");
        for index in 0..committee_count {
            let (bits, data) = {
                let committee = state
                    .get_beacon_committee(slot, index)
                    .expect("committee exists");
                let mut bits = BitList::with_capacity(committee.committee.len())
                    .expect("committee fits in bitlist");
                for i in 0..committee.committee.len() {
                    bits.set(i, true).expect("in bounds");
                }
                let data = AttestationData {
                    slot,
                    index,
                    beacon_block_root: *state
                        .get_block_root(slot)
                        .expect("head root is in range"),
                    source: state.previous_justified_checkpoint(),
                    target: Checkpoint {
                        epoch: previous_epoch,
                        root: target_root,
                    },
                };
                (bits, data)
            };

            state
                .previous_epoch_attestations_mut()
                .push(PendingAttestation {
                    aggregation_bits: bits,
                    data,
                    inclusion_delay: 1,
                    proposer_index: 1,
                })
                .expect("state has room for attestations");
        }
    }
}

/// Advance to the last slot of the current epoch, so that the next
/// `process_epoch` call transitions it.
fn advance_to_epoch_end(state: &mut BeaconState<E>, spec: &ChainSpec) {
    let target = state
        .current_epoch()
        .end_slot(E::slots_per_epoch());
    if state.slot() < target {
        complete_state_advance(state, None, target, spec).expect("should advance");
    }
}

mod justification {
    use super::*;

    #[test]
    fn full_participation_justifies_and_finalizes() {
        let (mut state, _, spec) = fresh_state(64);

        // Epochs 0 and 1 pass without justification (too early).
        for _ in 0..2 {
            advance_to_epoch_end(&mut state, &spec);
            let next = state.slot() + 1u64;
            complete_state_advance(&mut state, None, next, &spec).unwrap();
        }
        assert_eq!(state.current_justified_checkpoint().epoch, Epoch::new(0));

        // From epoch 2 onwards, full previous-epoch participation justifies
        // the previous epoch each transition, and finalization follows two
        // transitions later.
        for _ in 0..3 {
            advance_to_epoch_end(&mut state, &spec);
            fill_previous_epoch_attestations(&mut state);
            let next = state.slot() + 1u64;
            complete_state_advance(&mut state, None, next, &spec).unwrap();
        }

        // Each filled transition justifies its previous epoch; with only
        // previous-epoch participation, finalization trails justification by
        // two epochs (the 2nd/3rd/4th-justified rule).
        assert_eq!(state.current_justified_checkpoint().epoch, Epoch::new(3));
        assert_eq!(state.finalized_checkpoint().epoch, Epoch::new(1));
        assert!(state.current_justified_checkpoint().epoch > state.finalized_checkpoint().epoch);
    }

    #[test]
    fn no_participation_never_justifies() {
        let (mut state, _, spec) = fresh_state(64);

        for _ in 0..4 {
            advance_to_epoch_end(&mut state, &spec);
            let next = state.slot() + 1u64;
            complete_state_advance(&mut state, None, next, &spec).unwrap();
        }

        assert_eq!(state.current_justified_checkpoint().epoch, Epoch::new(0));
        assert_eq!(state.finalized_checkpoint().epoch, Epoch::new(0));
    }
}

mod rewards {
    use super::*;

    #[test]
    fn attesters_gain_absentees_lose() {
        let (mut state, _, spec) = fresh_state(64);

        // Move into epoch 2 so rewards apply to a fully-formed previous
        // epoch.
        advance_to_epoch_end(&mut state, &spec);
        let next = state.slot() + 1u64;
        complete_state_advance(&mut state, None, next, &spec).unwrap();
        advance_to_epoch_end(&mut state, &spec);

        fill_previous_epoch_attestations(&mut state);

        // Knock one validator out of every attestation.
        let absent_validator = 0usize;
        let mut cleared = false;
        let attestations: Vec<_> = state.previous_epoch_attestations().iter().cloned().collect();
        let mut rebuilt = VariableList::empty();
        for mut attestation in attestations {
            let committee = state
                .get_beacon_committee(attestation.data.slot, attestation.data.index)
                .unwrap();
            if let Some(position) = committee
                .committee
                .iter()
                .position(|&v| v == absent_validator)
            {
                attestation.aggregation_bits.set(position, false).unwrap();
                cleared = true;
            }
            rebuilt.push(attestation).unwrap();
        }
        assert!(cleared, "validator 0 attests in some committee");
        *state.previous_epoch_attestations_mut() = rebuilt;

        let balances_before = state.balances().to_vec();
        process_epoch(&mut state, &spec).expect("epoch processing should succeed");

        // The absentee is penalized.
        assert!(state.balances()[absent_validator] < balances_before[absent_validator]);

        // A participant is rewarded.
        let participant = (2..64).next().unwrap();
        assert!(state.balances()[participant] > balances_before[participant]);
    }
}

mod registry {
    use super::*;
    use safe_arith::SafeArith;

    #[test]
    fn low_balance_validator_is_ejected() {
        let (mut state, _, spec) = fresh_state(64);
        advance_to_epoch_end(&mut state, &spec);

        state.get_validator_mut(9).unwrap().effective_balance = spec.ejection_balance;

        process_epoch(&mut state, &spec).expect("epoch processing should succeed");

        assert_ne!(state.validators()[9].exit_epoch, spec.far_future_epoch);
    }

    #[test]
    fn eligible_validator_enters_queue_and_activates() {
        let (mut state, _, spec) = fresh_state(64);
        advance_to_epoch_end(&mut state, &spec);

        // A freshly-deposited validator: full balance, not yet eligible.
        let validator = Validator {
            effective_balance: spec.max_effective_balance,
            ..Validator::default()
        };
        state
            .push_validator(validator, spec.max_effective_balance)
            .unwrap();
        let index = state.validators().len() - 1;

        process_epoch(&mut state, &spec).expect("first transition");
        let eligibility = state.validators()[index].activation_eligibility_epoch;
        assert_ne!(eligibility, spec.far_future_epoch);
        assert_eq!(state.validators()[index].activation_epoch, spec.far_future_epoch);

        // Finalize past the eligibility epoch, then the next transition
        // dequeues the validator.
        state.set_finalized_checkpoint(Checkpoint {
            epoch: eligibility.safe_add(1u64).unwrap(),
            root: Hash256::zero(),
        });
        *state.slot_mut() = state
            .current_epoch()
            .safe_add(2u64)
            .unwrap()
            .end_slot(E::slots_per_epoch());
        state.build_all_committee_caches(&spec).unwrap();

        process_epoch(&mut state, &spec).expect("second transition");
        assert_ne!(state.validators()[index].activation_epoch, spec.far_future_epoch);
    }
}

mod final_updates {
    use super::*;
    use ssz_types::typenum::Unsigned;

    #[test]
    fn eth1_votes_reset_at_period_boundary() {
        let (mut state, _, spec) = fresh_state(64);

        state
            .eth1_data_votes_mut()
            .push(Eth1Data::default())
            .unwrap();

        // The minimal-preset voting period is 4 epochs.
        let period_slots = <E as EthSpec>::SlotsPerEth1VotingPeriod::to_u64();
        let target = Slot::new(period_slots - 1);
        complete_state_advance(&mut state, None, target, &spec).unwrap();
        assert!(!state.eth1_data_votes().is_empty());

        complete_state_advance(&mut state, None, target + 1u64, &spec).unwrap();
        assert!(state.eth1_data_votes().is_empty());
    }

    #[test]
    fn attestation_rotation_and_randao_roll() {
        let (mut state, _, spec) = fresh_state(64);
        advance_to_epoch_end(&mut state, &spec);

        fill_previous_epoch_attestations(&mut state);
        let recorded = state.previous_epoch_attestations().len();
        assert!(recorded > 0);

        let next_epoch = state.next_epoch().unwrap();
        let current_mix = *state.get_randao_mix(state.current_epoch()).unwrap();

        process_epoch(&mut state, &spec).expect("epoch processing should succeed");

        // current -> previous, current reset.
        assert!(state.current_epoch_attestations().is_empty());
        // The randao mix for the next epoch seeds from the current one.
        assert_eq!(*state.get_randao_mix(next_epoch).unwrap(), current_mix);
        // Slashings slot for the next epoch was zeroed.
        assert_eq!(state.get_slashings_at(next_epoch).unwrap(), 0);
    }
}

mod statuses {
    use super::*;
    use crate::per_epoch_processing::ValidatorStatuses;

    #[test]
    fn statuses_match_attestation_membership() {
        let (mut state, _, spec) = fresh_state(64);
        advance_to_epoch_end(&mut state, &spec);
        let next = state.slot() + 1u64;
        complete_state_advance(&mut state, None, next, &spec).unwrap();
        advance_to_epoch_end(&mut state, &spec);
        fill_previous_epoch_attestations(&mut state);

        let mut statuses = ValidatorStatuses::new(&state, &spec).unwrap();
        statuses.process_attestations(&state).unwrap();

        // Every active validator attested in the previous epoch.
        for (i, status) in statuses.statuses.iter().enumerate() {
            assert!(
                status.is_previous_epoch_attester,
                "validator {} should be a previous-epoch attester",
                i
            );
            assert!(status.is_previous_epoch_target_attester);
            assert!(status.is_previous_epoch_head_attester);
            assert_eq!(status.inclusion_info.unwrap().delay, 1);
        }

        // Aggregate balances account for the whole active set.
        assert_eq!(
            statuses.total_balances.previous_epoch_attesters(),
            statuses.total_balances.previous_epoch()
        );
    }

    #[test]
    fn attesting_indices_match_bits() {
        let (mut state, _, spec) = fresh_state(64);
        advance_to_epoch_end(&mut state, &spec);

        let slot = state.current_epoch().start_slot(E::slots_per_epoch());
        let committee = state.get_beacon_committee(slot, 0).unwrap();
        let len = committee.committee.len();

        let mut bits = BitList::<<E as EthSpec>::MaxValidatorsPerCommittee>::with_capacity(len)
            .unwrap();
        bits.set(0, true).unwrap();

        let indices = get_attesting_indices::<E>(committee.committee, &bits).unwrap();
        assert_eq!(indices, vec![committee.committee[0] as u64]);

        // A mis-sized bitfield is an error.
        let mismatched_bits =
            BitList::<<E as EthSpec>::MaxValidatorsPerCommittee>::with_capacity(len + 1).unwrap();
        assert!(get_attesting_indices::<E>(committee.committee, &mismatched_bits).is_err());
    }
}
