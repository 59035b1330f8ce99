use crate::{BeaconBlock, EthSpec, Hash256, Signature, Slot};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A `BeaconBlock` and a signature from its proposer.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "T: EthSpec")]
pub struct SignedBeaconBlock<T: EthSpec> {
    pub message: BeaconBlock<T>,
    pub signature: Signature,
}

impl<T: EthSpec> SignedBeaconBlock<T> {
    /// Convenience accessor for the block's slot.
    pub fn slot(&self) -> Slot {
        self.message.slot
    }

    /// Returns the `tree_hash_root` of the *block* (not the signed
    /// container).
    ///
    /// The canonical identity of a block on the wire is the root of its
    /// message; the proposer signature is not part of it.
    pub fn canonical_root(&self) -> Hash256 {
        self.message.tree_hash_root()
    }
}
