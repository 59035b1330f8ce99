use crate::{Error, Signature, INFINITY_SIGNATURE, SIGNATURE_BYTES_LEN};

/// The raw bytes of a BLS signature, not yet checked to be a valid curve
/// point.
///
/// Deposits carry their signature in this form: an invalid point is not a
/// decoding error, it is a deposit whose signature check will fail.
#[derive(Clone, Copy)]
pub struct SignatureBytes {
    bytes: [u8; SIGNATURE_BYTES_LEN],
}

impl SignatureBytes {
    /// The compressed point at infinity.
    pub fn empty() -> Self {
        Self {
            bytes: INFINITY_SIGNATURE,
        }
    }

    /// Attempt to decompress into a valid signature.
    pub fn decompress(&self) -> Result<Signature, Error> {
        Signature::deserialize(&self.bytes)
    }

    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        self.bytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SIGNATURE_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: SIGNATURE_BYTES_LEN,
            });
        }
        let mut fixed = [0; SIGNATURE_BYTES_LEN];
        fixed.copy_from_slice(bytes);
        Ok(Self { bytes: fixed })
    }
}

impl PartialEq for SignatureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..] == other.bytes[..]
    }
}

impl Eq for SignatureBytes {}

impl From<&Signature> for SignatureBytes {
    fn from(sig: &Signature) -> Self {
        Self {
            bytes: sig.serialize(),
        }
    }
}

impl From<Signature> for SignatureBytes {
    fn from(sig: Signature) -> Self {
        Self::from(&sig)
    }
}

impl_serialization_traits!(SignatureBytes, SIGNATURE_BYTES_LEN);
impl_std_hash!(SignatureBytes);
