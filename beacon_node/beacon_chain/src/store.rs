//! Contracts with the external collaborators this crate reads from. The
//! implementations live elsewhere (database, state regeneration, fork
//! choice); the chain-info façade only depends on these capabilities.

use types::{BeaconState, EthSpec, Hash256, SignedBeaconBlock};

/// The block database.
pub trait BeaconDb<E: EthSpec>: Send + Sync {
    /// The block currently considered the head by the database, if any.
    fn head_block(&self) -> Option<SignedBeaconBlock<E>>;

    /// Returns `true` if the block with this root is at or before the
    /// finalized checkpoint on the canonical chain.
    fn is_finalized_block(&self, block_root: Hash256) -> bool;
}

/// The state (re)generation service.
pub trait StateGen<E: EthSpec>: Send + Sync {
    /// Fetch or regenerate the state with the given root.
    fn state_by_root(&self, state_root: Hash256) -> Option<BeaconState<E>>;
}

/// The fork-choice store (proto-array).
pub trait ForkChoiceStore: Send + Sync {
    /// A point-in-time copy of the block tree, for introspection.
    type Snapshot;

    /// Returns `true` if the fork choice considers the block with this root
    /// part of the canonical chain.
    fn is_canonical(&self, block_root: Hash256) -> bool;

    /// Take a snapshot of the block tree.
    fn store(&self) -> Self::Snapshot;
}
