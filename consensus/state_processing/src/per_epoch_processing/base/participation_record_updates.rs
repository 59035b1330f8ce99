use crate::per_epoch_processing::Error;
use types::{BeaconState, EthSpec, VariableList};

/// Rotate the pending attestation records: the epoch that just completed
/// becomes the previous epoch, and the new current epoch starts empty.
pub fn process_participation_record_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
) -> Result<(), Error> {
    let current_epoch_attestations =
        std::mem::replace(state.current_epoch_attestations_mut(), VariableList::empty());
    *state.previous_epoch_attestations_mut() = current_epoch_attestations;
    Ok(())
}
