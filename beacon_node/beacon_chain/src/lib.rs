//! The read-side façade and process-wide caches that sit between the
//! state-transition functions and the rest of the node: the canonical head,
//! the skip-slot deduplication cache, and the proposer/shuffling caches.

pub mod beacon_proposer_cache;
pub mod beacon_snapshot;
pub mod chain_info;
pub mod errors;
pub mod metrics;
pub mod next_slot_cache;
pub mod shuffling_cache;
pub mod skip_slot_cache;
pub mod store;

pub use beacon_proposer_cache::{update_proposer_indices_in_cache, BeaconProposerCache, Proposer};
pub use beacon_snapshot::BeaconSnapshot;
pub use chain_info::ChainInfo;
pub use errors::BeaconChainError;
pub use next_slot_cache::{process_slots_using_next_slot_cache, NextSlotCache};
pub use shuffling_cache::{update_shuffling_cache, ShufflingCache};
pub use skip_slot_cache::{advance_state_to_slot, SkipSlotCache};
pub use store::{BeaconDb, ForkChoiceStore, StateGen};
