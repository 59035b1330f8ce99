use crate::{Error, Hash256, PublicKey, DST, INFINITY_SIGNATURE};
use blst::min_pk as blst_core;
use blst::BLST_ERROR;

/// The byte-size of a compressed BLS signature.
pub const SIGNATURE_BYTES_LEN: usize = 96;

/// A single BLS signature.
///
/// The point at infinity is representable (`point == None`) since it is the
/// canonical "empty" signature, but it never verifies against any message.
#[derive(Clone)]
pub struct Signature {
    point: Option<blst_core::Signature>,
}

impl Signature {
    /// The "empty" signature: the compressed point at infinity.
    pub fn empty() -> Self {
        Self { point: None }
    }

    pub(crate) fn from_point(point: blst_core::Signature) -> Self {
        Self { point: Some(point) }
    }

    pub(crate) fn point(&self) -> Option<&blst_core::Signature> {
        self.point.as_ref()
    }

    pub fn is_infinity(&self) -> bool {
        self.point.is_none()
    }

    /// Verify `self` against `msg` and `pubkey`, group-checking the
    /// signature point.
    pub fn verify(&self, pubkey: &PublicKey, msg: Hash256) -> bool {
        match &self.point {
            Some(point) => {
                point.verify(true, msg.as_bytes(), DST, &[], pubkey.point(), false)
                    == BLST_ERROR::BLST_SUCCESS
            }
            None => false,
        }
    }

    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        match &self.point {
            Some(point) => point.to_bytes(),
            None => INFINITY_SIGNATURE,
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SIGNATURE_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: SIGNATURE_BYTES_LEN,
            });
        }
        if bytes == INFINITY_SIGNATURE {
            return Ok(Self::empty());
        }
        let point = blst_core::Signature::from_bytes(bytes).map_err(|_| Error::InvalidPoint)?;
        Ok(Self { point: Some(point) })
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.serialize()[..] == other.serialize()[..]
    }
}

impl Eq for Signature {}

impl_serialization_traits!(Signature, SIGNATURE_BYTES_LEN);
impl_std_hash!(Signature);
