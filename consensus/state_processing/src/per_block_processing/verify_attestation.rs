use super::errors::{AttestationInvalid as Invalid, BlockOperationError};
use super::is_valid_indexed_attestation::is_valid_indexed_attestation;
use crate::common::get_indexed_attestation;
use crate::VerifySignatures;
use safe_arith::SafeArith;
use types::*;

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

fn error(reason: Invalid) -> BlockOperationError<Invalid> {
    BlockOperationError::invalid(reason)
}

/// Returns `Ok(())` if the given `attestation` is valid to be included in a
/// block that is applied to `state`. Otherwise, returns a descriptive `Err`.
///
/// Optionally verifies the aggregate signature, depending on
/// `verify_signatures`.
pub fn verify_attestation_for_block_inclusion<T: EthSpec>(
    state: &BeaconState<T>,
    attestation: &Attestation<T>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<IndexedAttestation<T>> {
    let data = &attestation.data;

    verify!(
        data.slot.safe_add(spec.min_attestation_inclusion_delay)? <= state.slot(),
        Invalid::IncludedTooEarly {
            state: state.slot(),
            delay: spec.min_attestation_inclusion_delay,
            attestation: data.slot,
        }
    );
    verify!(
        state.slot() <= data.slot.safe_add(T::slots_per_epoch())?,
        Invalid::IncludedTooLate {
            state: state.slot(),
            attestation: data.slot,
        }
    );

    verify_attestation_for_state(state, attestation, verify_signatures, spec)
}

/// Returns `Ok(())` if `attestation` is a valid attestation to the chain that
/// decided `state`. Otherwise, returns a descriptive `Err`.
///
/// Optionally verifies the aggregate signature, depending on
/// `verify_signatures`.
pub fn verify_attestation_for_state<T: EthSpec>(
    state: &BeaconState<T>,
    attestation: &Attestation<T>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<IndexedAttestation<T>> {
    let data = &attestation.data;

    verify!(
        data.target.epoch == data.slot.epoch(T::slots_per_epoch()),
        Invalid::TargetEpochSlotMismatch {
            target_epoch: data.target.epoch,
            slot_epoch: data.slot.epoch(T::slots_per_epoch()),
        }
    );

    // Verify the Casper FFG vote.
    verify_casper_ffg_vote(attestation, state)?;

    // The committee index must be *strictly* less than the committee count at
    // the attestation's slot; an equal value once slipped through as a
    // default-committee read (beaconfuzz case 78).
    let committee_count = state.get_committee_count_at_slot(data.slot)?;
    verify!(
        data.index < committee_count,
        Invalid::BadCommitteeIndex {
            index: data.index,
            committee_count,
        }
    );

    let committee = state.get_beacon_committee(data.slot, data.index)?;

    verify!(
        attestation.aggregation_bits.len() == committee.committee.len(),
        Invalid::BadAggregationBitfieldLength {
            committee_len: committee.committee.len(),
            bitfield_len: attestation.aggregation_bits.len(),
        }
    );

    let indexed_attestation = get_indexed_attestation(committee.committee, attestation)?;
    is_valid_indexed_attestation(state, &indexed_attestation, verify_signatures, spec)?;

    Ok(indexed_attestation)
}

/// Check that the FFG source checkpoint in the attestation matches the
/// justified checkpoint the state holds for the attestation's target epoch.
fn verify_casper_ffg_vote<T: EthSpec>(
    attestation: &Attestation<T>,
    state: &BeaconState<T>,
) -> Result<()> {
    let data = &attestation.data;

    if data.target.epoch == state.current_epoch() {
        verify!(
            data.source == state.current_justified_checkpoint(),
            Invalid::WrongJustifiedCheckpoint {
                state: state.current_justified_checkpoint(),
                attestation: data.source,
                is_current: true,
            }
        );
        Ok(())
    } else if data.target.epoch == state.previous_epoch() {
        verify!(
            data.source == state.previous_justified_checkpoint(),
            Invalid::WrongJustifiedCheckpoint {
                state: state.previous_justified_checkpoint(),
                attestation: data.source,
                is_current: false,
            }
        );
        Ok(())
    } else {
        Err(error(Invalid::BadTargetEpoch))
    }
}
