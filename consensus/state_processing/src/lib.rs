//! The phase 0 state-transition function: per-slot, per-block and per-epoch
//! processing over a `BeaconState`, plus the skip-slot advancement helpers
//! built on top of them.

#[macro_use]
mod macros;

pub mod common;
pub mod context;
pub mod genesis;
pub mod per_block_processing;
pub mod per_epoch_processing;
pub mod per_slot_processing;
pub mod state_advance;
pub mod state_transition;
#[cfg(test)]
mod test_utils;

pub use context::Cancellation;
pub use genesis::{
    initialize_beacon_state_from_eth1, is_valid_genesis_state, process_activations,
};
pub use per_block_processing::{
    block_signature_verifier, errors::BlockProcessingError, per_block_processing,
    process_operations, signature_sets, BlockSignatureStrategy, BlockSignatureVerifier,
    VerifySignatures,
};
pub use per_epoch_processing::{
    errors::EpochProcessingError, process_epoch as per_epoch_processing, EpochProcessingSummary,
};
pub use per_slot_processing::{per_slot_processing, Error as SlotProcessingError};
pub use state_advance::{
    complete_state_advance, partial_state_advance, process_slots, Error as StateAdvanceError,
    StateSkipCache,
};
pub use state_transition::{
    calculate_state_root, execute_state_transition, execute_state_transition_no_verify_any_sig,
    Error as StateTransitionError,
};
