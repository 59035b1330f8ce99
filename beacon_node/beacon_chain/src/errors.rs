use state_processing::{StateAdvanceError, StateTransitionError};
use types::BeaconStateError;

#[derive(Debug)]
pub enum BeaconChainError {
    BeaconStateError(BeaconStateError),
    StateAdvance(StateAdvanceError),
    StateTransition(StateTransitionError),
    /// The head state was requested but neither the in-memory head nor the
    /// state store could provide it.
    HeadStateUnavailable,
}

impl From<BeaconStateError> for BeaconChainError {
    fn from(e: BeaconStateError) -> Self {
        BeaconChainError::BeaconStateError(e)
    }
}

impl From<StateAdvanceError> for BeaconChainError {
    fn from(e: StateAdvanceError) -> Self {
        BeaconChainError::StateAdvance(e)
    }
}

impl From<StateTransitionError> for BeaconChainError {
    fn from(e: StateTransitionError) -> Self {
        BeaconChainError::StateTransition(e)
    }
}
