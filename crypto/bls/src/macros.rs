/// Implements SSZ encoding/decoding, tree hashing, hex-string serde and
/// `Debug` for a type with `serialize() -> [u8; $byte_size]` and
/// `deserialize(&[u8]) -> Result<Self, Error>` inherent methods.
macro_rules! impl_serialization_traits {
    ($type: ty, $byte_size: expr) => {
        impl ssz::Encode for $type {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $byte_size
            }

            fn ssz_bytes_len(&self) -> usize {
                $byte_size
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.serialize())
            }
        }

        impl ssz::Decode for $type {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $byte_size
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ssz::DecodeError> {
                Self::deserialize(bytes).map_err(|e| {
                    ssz::DecodeError::BytesInvalid(format!("invalid BLS bytes: {:?}", e))
                })
            }
        }

        impl tree_hash::TreeHash for $type {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                tree_hash::TreeHashType::Vector
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                unreachable!("Vector should never be packed.")
            }

            fn tree_hash_packing_factor() -> usize {
                unreachable!("Vector should never be packed.")
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                let values_per_chunk = tree_hash::BYTES_PER_CHUNK;
                let minimum_chunk_count = ($byte_size + values_per_chunk - 1) / values_per_chunk;
                tree_hash::merkle_root(&self.serialize(), minimum_chunk_count)
            }
        }

        impl serde::Serialize for $type {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&serde_utils::hex::encode(self.serialize()))
            }
        }

        impl<'de> serde::Deserialize<'de> for $type {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let bytes =
                    deserializer.deserialize_str(serde_utils::hex::PrefixedHexVisitor)?;
                Self::deserialize(&bytes)
                    .map_err(|e| serde::de::Error::custom(format!("invalid BLS bytes: {:?}", e)))
            }
        }

        impl std::fmt::Debug for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", serde_utils::hex::encode(self.serialize()))
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", serde_utils::hex::encode(self.serialize()))
            }
        }

        impl std::str::FromStr for $type {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s.trim_start_matches("0x"))
                    .map_err(|e| format!("invalid hex: {:?}", e))?;
                Self::deserialize(&bytes).map_err(|e| format!("invalid BLS bytes: {:?}", e))
            }
        }
    };
}

/// Hashes the serialized form, so byte-identical values collide as expected.
macro_rules! impl_std_hash {
    ($type: ty) => {
        #[allow(clippy::derived_hash_with_manual_eq)]
        impl std::hash::Hash for $type {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.serialize().hash(state)
            }
        }
    };
}
