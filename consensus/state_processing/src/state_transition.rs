//! The top-level entry points of the state-transition function: apply a
//! signed block to a state, with the caller choosing how signatures are
//! handled.

use crate::per_block_processing::block_signature_verifier::BlockSignatureVerifier;
use crate::per_block_processing::signature_sets::get_pubkey_from_state;
use crate::state_advance::{process_slots, StateSkipCache};
use crate::{
    per_block_processing, BlockProcessingError, BlockSignatureStrategy, Cancellation,
    StateAdvanceError,
};
use bls::SignatureSet;
use types::{BeaconState, BeaconStateError, ChainSpec, EthSpec, Hash256, RelativeEpoch,
    SignedBeaconBlock};

#[derive(Debug, PartialEq)]
pub enum Error {
    StateAdvance(StateAdvanceError),
    BlockProcessing(BlockProcessingError),
    BeaconStateError(BeaconStateError),
    /// The computed post-state root did not match the root declared by the
    /// block. The caller's state holds the (mutated) post-state for
    /// inspection.
    StateRootMismatch {
        expected: Hash256,
        found: Hash256,
    },
    /// The cancellation context fired between operations.
    Cancelled {
        cause: Option<String>,
    },
}

impl From<StateAdvanceError> for Error {
    fn from(e: StateAdvanceError) -> Self {
        match e {
            StateAdvanceError::Cancelled { cause } => Error::Cancelled { cause },
            other => Error::StateAdvance(other),
        }
    }
}

impl From<BlockProcessingError> for Error {
    fn from(e: BlockProcessingError) -> Self {
        Error::BlockProcessing(e)
    }
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Self {
        Error::BeaconStateError(e)
    }
}

/// Apply `signed_block` to `state` with full signature verification, then
/// assert that the resulting state root matches the root the block declares.
pub fn execute_state_transition<E: EthSpec>(
    ctx: &Cancellation,
    state: &mut BeaconState<E>,
    signed_block: &SignedBeaconBlock<E>,
    skip_slot_cache: Option<&dyn StateSkipCache<E>>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    apply_block(
        ctx,
        state,
        signed_block,
        BlockSignatureStrategy::VerifyBulk,
        skip_slot_cache,
        spec,
    )?;
    check_state_root(state, signed_block)
}

/// Apply `signed_block` to `state` without verifying any signature, instead
/// returning the complete signature set (proposal, randao, slashings,
/// attestations, exits) for the caller to batch-verify later.
///
/// The post-state root is still asserted against the block.
pub fn execute_state_transition_no_verify_any_sig<'a, E: EthSpec>(
    ctx: &Cancellation,
    state: &mut BeaconState<E>,
    signed_block: &'a SignedBeaconBlock<E>,
    skip_slot_cache: Option<&dyn StateSkipCache<E>>,
    spec: &ChainSpec,
) -> Result<Vec<SignatureSet<'a>>, Error> {
    let target_slot = signed_block.slot();
    if state.slot() < target_slot {
        process_slots(ctx, state, target_slot, skip_slot_cache, spec)?;
    }
    check_cancelled(ctx)?;

    // Collect every signature set against the pre-block state; the messages
    // (domains, committees) are defined by it, not the post-state.
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;

    let block_root = signed_block.canonical_root();

    let signature_sets = {
        let mut verifier = BlockSignatureVerifier::new(
            state,
            |i| get_pubkey_from_state(state, i),
            spec,
        );
        verifier.include_all_signatures(signed_block, Some(block_root))?;
        verifier.into_sets()
    };

    per_block_processing(
        state,
        signed_block,
        Some(block_root),
        BlockSignatureStrategy::NoVerification,
        spec,
    )?;

    check_state_root(state, signed_block)?;

    Ok(signature_sets)
}

/// Compute the state root that a block built on `state` would have, without
/// mutating the caller's state and without any signature verification.
pub fn calculate_state_root<E: EthSpec>(
    ctx: &Cancellation,
    state: &BeaconState<E>,
    signed_block: &SignedBeaconBlock<E>,
    spec: &ChainSpec,
) -> Result<Hash256, Error> {
    let mut state = state.clone();

    apply_block(
        ctx,
        &mut state,
        signed_block,
        BlockSignatureStrategy::NoVerification,
        None,
        spec,
    )?;

    state.update_tree_hash_cache().map_err(Into::into)
}

/// Advance to the block's slot and apply the block with the given signature
/// strategy. Does not check the post-state root.
fn apply_block<E: EthSpec>(
    ctx: &Cancellation,
    state: &mut BeaconState<E>,
    signed_block: &SignedBeaconBlock<E>,
    strategy: BlockSignatureStrategy,
    skip_slot_cache: Option<&dyn StateSkipCache<E>>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let target_slot = signed_block.slot();
    if state.slot() < target_slot {
        process_slots(ctx, state, target_slot, skip_slot_cache, spec)?;
    }
    check_cancelled(ctx)?;

    let block_root = signed_block.canonical_root();
    per_block_processing(state, signed_block, Some(block_root), strategy, spec)?;

    Ok(())
}

fn check_state_root<E: EthSpec>(
    state: &mut BeaconState<E>,
    signed_block: &SignedBeaconBlock<E>,
) -> Result<(), Error> {
    let found = state.update_tree_hash_cache()?;
    let expected = signed_block.message.state_root;

    if found == expected {
        Ok(())
    } else {
        Err(Error::StateRootMismatch { expected, found })
    }
}

fn check_cancelled(ctx: &Cancellation) -> Result<(), Error> {
    if ctx.is_cancelled() {
        Err(Error::Cancelled { cause: ctx.cause() })
    } else {
        Ok(())
    }
}

impl From<crate::per_block_processing::block_signature_verifier::Error> for Error {
    fn from(e: crate::per_block_processing::block_signature_verifier::Error) -> Self {
        use crate::per_block_processing::block_signature_verifier::Error as VerifierError;
        use crate::per_block_processing::errors::IntoWithIndex;

        match e {
            VerifierError::BeaconStateError(e) => Error::BeaconStateError(e),
            VerifierError::SignatureSetError(e) => {
                Error::BlockProcessing(BlockProcessingError::SignatureSetError(e))
            }
            // The verifier does not track which attestation failed; report
            // the first, since collection aborts at the offender.
            VerifierError::AttestationValidationError(e) => {
                Error::BlockProcessing(e.into_with_index(0))
            }
            VerifierError::IncorrectBlockProposer { .. } | VerifierError::SignatureInvalid => {
                Error::BlockProcessing(BlockProcessingError::BulkSignatureVerificationFailed)
            }
        }
    }
}
