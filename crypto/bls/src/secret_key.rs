use crate::{Error, Hash256, PublicKey, Signature, DST};
use blst::min_pk as blst_core;

/// The byte-size of a BLS secret key.
pub const SECRET_KEY_BYTES_LEN: usize = 32;

/// A BLS secret key.
///
/// Deliberately excluded from the serde/SSZ macro family: secret keys are
/// never placed in consensus objects and should not be printable by accident.
pub struct SecretKey {
    secret: blst_core::SecretKey,
}

impl SecretKey {
    /// Derive a secret key from 32 bytes of entropy (EIP-2333 `KeyGen`).
    pub fn key_gen(ikm: &[u8]) -> Result<Self, Error> {
        let secret =
            blst_core::SecretKey::key_gen(ikm, &[]).map_err(|_| Error::InvalidSecretKey)?;
        Ok(Self { secret })
    }

    /// A fixed, obviously-insecure key for deterministic tests.
    pub fn deterministic(index: u64) -> Self {
        let mut ikm = [0x42; 32];
        ikm[0..8].copy_from_slice(&index.to_le_bytes());
        Self::key_gen(&ikm).expect("fixed-length ikm is valid")
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(self.secret.sk_to_pk())
    }

    pub fn sign(&self, msg: Hash256) -> Signature {
        Signature::from_point(self.secret.sign(msg.as_bytes(), DST, &[]))
    }

    pub fn serialize(&self) -> [u8; SECRET_KEY_BYTES_LEN] {
        self.secret.to_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let secret =
            blst_core::SecretKey::from_bytes(bytes).map_err(|_| Error::InvalidSecretKey)?;
        Ok(Self { secret })
    }
}
