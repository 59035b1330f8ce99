use crate::{AggregateSignature, AttestationData, EthSpec, VariableList};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// Details an attestation that can be slashable.
///
/// To be included in an `AttesterSlashing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "T: EthSpec")]
pub struct IndexedAttestation<T: EthSpec> {
    /// Lists validator registry indices, not committee indices.
    #[serde(with = "quoted_variable_list_u64")]
    pub attesting_indices: VariableList<u64, T::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: AggregateSignature,
}

impl<T: EthSpec> IndexedAttestation<T> {
    /// Check if ``attestation_data_1`` and ``attestation_data_2`` have the
    /// same target.
    pub fn is_double_vote(&self, other: &Self) -> bool {
        self.data.target.epoch == other.data.target.epoch && self.data != other.data
    }

    /// Check if ``attestation_data_1`` surrounds ``attestation_data_2``.
    pub fn is_surround_vote(&self, other: &Self) -> bool {
        self.data.source.epoch < other.data.source.epoch
            && other.data.target.epoch < self.data.target.epoch
    }
}

/// Serialize a variable list of `u64` such that each int is quoted, matching
/// the Eth2 API spec.
mod quoted_variable_list_u64 {
    use super::*;
    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};
    use serde_utils::quoted_u64_vec::{QuotedIntVecVisitor, QuotedIntWrapper};

    pub fn serialize<S, T>(value: &VariableList<u64, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: ssz_types::typenum::Unsigned,
    {
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for &int in value.iter() {
            seq.serialize_element(&QuotedIntWrapper { int })?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<VariableList<u64, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: ssz_types::typenum::Unsigned,
    {
        deserializer
            .deserialize_any(QuotedIntVecVisitor)
            .and_then(|vec| {
                VariableList::new(vec)
                    .map_err(|e| serde::de::Error::custom(format!("invalid length: {:?}", e)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Checkpoint, Epoch, Hash256, MainnetEthSpec};

    fn indexed_attestation(source: u64, target: u64) -> IndexedAttestation<MainnetEthSpec> {
        IndexedAttestation {
            attesting_indices: VariableList::new(vec![0]).unwrap(),
            data: AttestationData {
                slot: Epoch::new(target).start_slot(32),
                index: 0,
                beacon_block_root: Hash256::zero(),
                source: Checkpoint {
                    epoch: Epoch::new(source),
                    root: Hash256::zero(),
                },
                target: Checkpoint {
                    epoch: Epoch::new(target),
                    root: Hash256::zero(),
                },
            },
            signature: AggregateSignature::infinity(),
        }
    }

    #[test]
    fn is_double_vote_true() {
        let a = indexed_attestation(0, 1);
        let mut b = indexed_attestation(0, 1);
        b.data.beacon_block_root = Hash256::from_low_u64_be(1);

        assert!(a.is_double_vote(&b));
    }

    #[test]
    fn is_double_vote_false() {
        let a = indexed_attestation(0, 1);
        let b = indexed_attestation(0, 2);

        assert!(!a.is_double_vote(&b));
    }

    #[test]
    fn is_surround_vote_true() {
        let a = indexed_attestation(0, 3);
        let b = indexed_attestation(1, 2);

        assert!(a.is_surround_vote(&b));
    }

    #[test]
    fn is_surround_vote_false() {
        // Source is not less.
        let a = indexed_attestation(1, 3);
        let b = indexed_attestation(1, 2);
        assert!(!a.is_surround_vote(&b));

        // Target is not greater.
        let a = indexed_attestation(0, 2);
        let b = indexed_attestation(1, 2);
        assert!(!a.is_surround_vote(&b));
    }
}
