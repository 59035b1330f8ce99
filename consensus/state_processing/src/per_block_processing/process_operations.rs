use super::errors::{BlockProcessingError, IntoWithIndex};
use super::verify_attestation::verify_attestation_for_block_inclusion;
use super::verify_attester_slashing::verify_attester_slashing;
use super::verify_deposit::{
    get_existing_validator_index, verify_deposit_merkle_proof, verify_deposit_signature,
};
use super::verify_exit::verify_exit;
use super::verify_proposer_slashing::verify_proposer_slashing;
use super::VerifySignatures;
use crate::common::{increase_balance, initiate_validator_exit, slash_validator};
use crate::per_block_processing::signature_sets::deposit_pubkey_signature_message;
use safe_arith::SafeArith;
use types::*;

/// Apply every operation in the block body to the state, in the fixed order
/// given by the spec.
pub fn process_operations<T: EthSpec>(
    state: &mut BeaconState<T>,
    block_body: &BeaconBlockBody<T>,
    proposer_index: u64,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    process_proposer_slashings(
        state,
        &block_body.proposer_slashings,
        verify_signatures,
        spec,
    )?;
    process_attester_slashings(
        state,
        &block_body.attester_slashings,
        verify_signatures,
        spec,
    )?;
    process_attestations(
        state,
        &block_body.attestations,
        proposer_index,
        verify_signatures,
        spec,
    )?;
    process_deposits(state, &block_body.deposits, spec)?;
    process_exits(state, &block_body.voluntary_exits, verify_signatures, spec)?;
    Ok(())
}

/// Validates each `ProposerSlashing` and updates the state.
///
/// Returns `Ok(())` if the validation and state updates completed
/// successfully, otherwise returns an `Err` describing the invalid object or
/// cause of failure.
pub fn process_proposer_slashings<T: EthSpec>(
    state: &mut BeaconState<T>,
    proposer_slashings: &[ProposerSlashing],
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for (i, proposer_slashing) in proposer_slashings.iter().enumerate() {
        verify_proposer_slashing(proposer_slashing, state, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        slash_validator(
            state,
            proposer_slashing.signed_header_1.message.proposer_index as usize,
            None,
            spec,
        )?;
    }

    Ok(())
}

/// Validates each `AttesterSlashing` and updates the state.
pub fn process_attester_slashings<T: EthSpec>(
    state: &mut BeaconState<T>,
    attester_slashings: &[AttesterSlashing<T>],
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for (i, attester_slashing) in attester_slashings.iter().enumerate() {
        let slashable_indices =
            verify_attester_slashing(state, attester_slashing, verify_signatures, spec)
                .map_err(|e| e.into_with_index(i))?;

        for i in slashable_indices {
            slash_validator(state, i as usize, None, spec)?;
        }
    }

    Ok(())
}

/// Validates each `Attestation` and updates the state.
pub fn process_attestations<T: EthSpec>(
    state: &mut BeaconState<T>,
    attestations: &[Attestation<T>],
    proposer_index: u64,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // Ensure required caches are built.
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;

    for (i, attestation) in attestations.iter().enumerate() {
        verify_attestation_for_block_inclusion(state, attestation, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        let pending_attestation = PendingAttestation {
            aggregation_bits: attestation.aggregation_bits.clone(),
            data: attestation.data.clone(),
            inclusion_delay: state.slot().safe_sub(attestation.data.slot)?.as_u64(),
            proposer_index,
        };

        if attestation.data.target.epoch == state.current_epoch() {
            state.current_epoch_attestations_mut().push(pending_attestation)?;
        } else {
            state
                .previous_epoch_attestations_mut()
                .push(pending_attestation)?;
        }
    }

    Ok(())
}

/// Validates each `Deposit` and updates the state.
///
/// The block must carry every outstanding deposit (up to `MAX_DEPOSITS`);
/// this count is exact, not a bound.
pub fn process_deposits<T: EthSpec>(
    state: &mut BeaconState<T>,
    deposits: &[Deposit],
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let expected_deposit_len = std::cmp::min(
        T::MaxDeposits::to_u64(),
        state.get_outstanding_deposit_len()?,
    );
    block_verify!(
        deposits.len() as u64 == expected_deposit_len,
        BlockProcessingError::DepositCountInvalid {
            expected: expected_deposit_len as usize,
            found: deposits.len(),
        }
    );

    // One aggregated verification over every deposit signature. If it passes,
    // no deposit needs an individual check; if it fails, fall back to
    // per-deposit verification so that the valid deposits among them are
    // still processed.
    let all_signatures_verified = batch_verify_deposit_signatures(deposits, spec);

    for (i, deposit) in deposits.iter().enumerate() {
        verify_deposit_merkle_proof(state, deposit, state.eth1_deposit_index(), spec)
            .map_err(|e| e.into_with_index(i))?;

        state.eth1_deposit_index_mut().safe_add_assign(1)?;

        process_deposit(state, deposit, spec, all_signatures_verified)?;
    }

    Ok(())
}

/// Attempt one batched verification over all deposit signatures.
///
/// Returns `false` (fall back to individual checks) if any signature or
/// pubkey fails to decompress, or the batched check fails.
fn batch_verify_deposit_signatures(deposits: &[Deposit], spec: &ChainSpec) -> bool {
    if deposits.is_empty() {
        return true;
    }

    let mut triples = Vec::with_capacity(deposits.len());
    for deposit in deposits {
        match deposit_pubkey_signature_message(&deposit.data, spec) {
            Some(triple) => triples.push(triple),
            None => return false,
        }
    }

    let signature_sets: Vec<_> = triples
        .iter()
        .map(crate::signature_sets::deposit_signature_set)
        .collect();

    bls::verify_signature_sets(signature_sets.iter())
}

/// Process a single deposit, assuming its merkle proof has already been
/// verified and the state's deposit index incremented.
///
/// A deposit for an unknown pubkey whose signature does not verify is
/// silently skipped rather than rejected, as per the spec.
pub fn process_deposit<T: EthSpec>(
    state: &mut BeaconState<T>,
    deposit: &Deposit,
    spec: &ChainSpec,
    signature_already_verified: bool,
) -> Result<(), BlockProcessingError> {
    let amount = deposit.data.amount;

    if let Some(index) = get_existing_validator_index(state, &deposit.data.pubkey)? {
        // Update the existing validator balance.
        increase_balance(state, index as usize, amount)?;
    } else {
        // The signature should be checked for new validators. Return early
        // for a bad signature.
        if !signature_already_verified && verify_deposit_signature(&deposit.data, spec).is_err() {
            return Ok(());
        }

        // Create a new validator.
        let validator = Validator {
            pubkey: deposit.data.pubkey,
            withdrawal_credentials: deposit.data.withdrawal_credentials,
            activation_eligibility_epoch: spec.far_future_epoch,
            activation_epoch: spec.far_future_epoch,
            exit_epoch: spec.far_future_epoch,
            withdrawable_epoch: spec.far_future_epoch,
            effective_balance: std::cmp::min(
                amount.safe_sub(amount.safe_rem(spec.effective_balance_increment)?)?,
                spec.max_effective_balance,
            ),
            slashed: false,
        };
        state.push_validator(validator, amount)?;
    }

    Ok(())
}

/// Validates each `SignedVoluntaryExit` and updates the state.
pub fn process_exits<T: EthSpec>(
    state: &mut BeaconState<T>,
    voluntary_exits: &[SignedVoluntaryExit],
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for (i, exit) in voluntary_exits.iter().enumerate() {
        verify_exit(state, exit, verify_signatures, spec).map_err(|e| e.into_with_index(i))?;

        initiate_validator_exit(state, exit.message.validator_index as usize, spec)?;
    }

    Ok(())
}
