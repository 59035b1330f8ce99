use crate::per_epoch_processing::base::TotalBalances;
use crate::per_epoch_processing::Error;
use safe_arith::SafeArith;
use types::{BeaconState, Checkpoint, EthSpec};

/// Update the justified and finalized checkpoints for matching target
/// attestations.
pub fn process_justification_and_finalization<T: EthSpec>(
    state: &mut BeaconState<T>,
    total_balances: &TotalBalances,
) -> Result<(), Error> {
    if state.current_epoch() <= T::genesis_epoch().safe_add(1u64)? {
        return Ok(());
    }

    let previous_epoch = state.previous_epoch();
    let current_epoch = state.current_epoch();
    let old_previous_justified_checkpoint = state.previous_justified_checkpoint();
    let old_current_justified_checkpoint = state.current_justified_checkpoint();

    // Process justifications
    state.set_previous_justified_checkpoint(old_current_justified_checkpoint);

    let mut bits = state.justification_bits().clone();
    // Shift the bits up one position: bit `i` becomes bit `i + 1`, bit 0
    // clears for the new epoch.
    for i in (1..bits.len()).rev() {
        let lower = bits.get(i.safe_sub(1)?)?;
        bits.set(i, lower)?;
    }
    bits.set(0, false)?;

    if total_balances
        .previous_epoch_target_attesters()
        .safe_mul(3)?
        >= total_balances.previous_epoch().safe_mul(2)?
    {
        state.set_current_justified_checkpoint(Checkpoint {
            epoch: previous_epoch,
            root: *state.get_block_root_at_epoch(previous_epoch)?,
        });
        bits.set(1, true)?;
    }

    if total_balances
        .current_epoch_target_attesters()
        .safe_mul(3)?
        >= total_balances.current_epoch().safe_mul(2)?
    {
        state.set_current_justified_checkpoint(Checkpoint {
            epoch: current_epoch,
            root: *state.get_block_root_at_epoch(current_epoch)?,
        });
        bits.set(0, true)?;
    }

    *state.justification_bits_mut() = bits.clone();

    // Process finalizations

    // The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th
    // as source.
    if (1..4).all(|i| bits.get(i).unwrap_or(false))
        && old_previous_justified_checkpoint.epoch.safe_add(3u64)? == current_epoch
    {
        state.set_finalized_checkpoint(old_previous_justified_checkpoint);
    }
    // The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as
    // source.
    else if (1..3).all(|i| bits.get(i).unwrap_or(false))
        && old_previous_justified_checkpoint.epoch.safe_add(2u64)? == current_epoch
    {
        state.set_finalized_checkpoint(old_previous_justified_checkpoint);
    }

    // The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd
    // as source.
    if (0..3).all(|i| bits.get(i).unwrap_or(false))
        && old_current_justified_checkpoint.epoch.safe_add(2u64)? == current_epoch
    {
        state.set_finalized_checkpoint(old_current_justified_checkpoint);
    }
    // The 1st/2nd most recent epochs are justified, the 1st using the 2nd as
    // source.
    else if (0..2).all(|i| bits.get(i).unwrap_or(false))
        && old_current_justified_checkpoint.epoch.safe_add(1u64)? == current_epoch
    {
        state.set_finalized_checkpoint(old_current_justified_checkpoint);
    }

    Ok(())
}
