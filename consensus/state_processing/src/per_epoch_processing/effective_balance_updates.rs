use super::errors::EpochProcessingError;
use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, EthSpec};

/// Update the effective balances with hysteresis: the effective balance lags
/// the actual balance and only moves when the gap exceeds the threshold.
pub fn process_effective_balance_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
    spec: &ChainSpec,
) -> Result<(), EpochProcessingError> {
    let hysteresis_increment = spec
        .effective_balance_increment
        .safe_div(spec.hysteresis_quotient)?;
    let downward_threshold = hysteresis_increment.safe_mul(spec.hysteresis_downward_multiplier)?;
    let upward_threshold = hysteresis_increment.safe_mul(spec.hysteresis_upward_multiplier)?;

    for index in 0..state.validators().len() {
        let balance = state.get_balance(index)?;
        let effective_balance = state.get_effective_balance(index)?;

        if balance.safe_add(downward_threshold)? < effective_balance
            || effective_balance.safe_add(upward_threshold)? < balance
        {
            state.get_validator_mut(index)?.effective_balance = std::cmp::min(
                balance.safe_sub(balance.safe_rem(spec.effective_balance_increment)?)?,
                spec.max_effective_balance,
            );
        }
    }
    Ok(())
}
