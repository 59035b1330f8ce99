use crate::{Error, PublicKey, PUBLIC_KEY_BYTES_LEN};

/// The raw bytes of a compressed BLS public key, not yet checked to be a
/// valid curve point.
///
/// This is the form stored in `Validator` and `DepositData`: decompression
/// is comparatively expensive and only required at signature-verification
/// time, and a deposit may legally carry bytes that never decompress.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyBytes {
    bytes: [u8; PUBLIC_KEY_BYTES_LEN],
}

impl PublicKeyBytes {
    /// Instantiates `Self` with all-zero bytes.
    ///
    /// The result will not decompress; it exists for padding and testing.
    pub fn empty() -> Self {
        Self {
            bytes: [0; PUBLIC_KEY_BYTES_LEN],
        }
    }

    /// Attempt to decompress into a valid public key.
    pub fn decompress(&self) -> Result<PublicKey, Error> {
        PublicKey::deserialize(&self.bytes)
    }

    pub fn as_serialized(&self) -> &[u8] {
        &self.bytes
    }

    pub fn serialize(&self) -> [u8; PUBLIC_KEY_BYTES_LEN] {
        self.bytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PUBLIC_KEY_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: PUBLIC_KEY_BYTES_LEN,
            });
        }
        let mut fixed = [0; PUBLIC_KEY_BYTES_LEN];
        fixed.copy_from_slice(bytes);
        Ok(Self { bytes: fixed })
    }
}

impl From<&PublicKey> for PublicKeyBytes {
    fn from(pk: &PublicKey) -> Self {
        Self {
            bytes: pk.serialize(),
        }
    }
}

impl From<PublicKey> for PublicKeyBytes {
    fn from(pk: PublicKey) -> Self {
        Self::from(&pk)
    }
}

impl_serialization_traits!(PublicKeyBytes, PUBLIC_KEY_BYTES_LEN);
impl_std_hash!(PublicKeyBytes);
