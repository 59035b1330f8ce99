use crate::Error;
use blst::min_pk as blst_core;

/// The byte-size of a compressed BLS public key.
pub const PUBLIC_KEY_BYTES_LEN: usize = 48;

/// A public key that has been checked to be a valid, non-infinity point in
/// the G1 group.
#[derive(Clone)]
pub struct PublicKey {
    point: blst_core::PublicKey,
}

impl PublicKey {
    pub(crate) fn from_point(point: blst_core::PublicKey) -> Self {
        Self { point }
    }

    pub(crate) fn point(&self) -> &blst_core::PublicKey {
        &self.point
    }

    /// Serialize to compressed form.
    pub fn serialize(&self) -> [u8; PUBLIC_KEY_BYTES_LEN] {
        self.point.to_bytes()
    }

    /// Deserialize from compressed form, checking that the point is valid and
    /// not the point at infinity.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PUBLIC_KEY_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: PUBLIC_KEY_BYTES_LEN,
            });
        }
        let point = blst_core::PublicKey::key_validate(bytes).map_err(|_| Error::InvalidPoint)?;
        Ok(Self { point })
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialize()[..] == other.serialize()[..]
    }
}

impl Eq for PublicKey {}

impl_serialization_traits!(PublicKey, PUBLIC_KEY_BYTES_LEN);
impl_std_hash!(PublicKey);
