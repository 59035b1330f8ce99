use crate::{PublicKey, SecretKey};

/// A BLS keypair.
pub struct Keypair {
    pub pk: PublicKey,
    pub sk: SecretKey,
}

impl Keypair {
    pub fn from_components(pk: PublicKey, sk: SecretKey) -> Self {
        Self { pk, sk }
    }

    /// A deterministic, obviously-insecure keypair for tests and interop
    /// genesis states.
    pub fn deterministic(index: u64) -> Self {
        let sk = SecretKey::deterministic(index);
        let pk = sk.public_key();
        Self { pk, sk }
    }
}
