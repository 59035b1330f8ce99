//! BLS12-381 signatures over the `blst` backend, specialised to the
//! `min_pk` scheme used by the beacon chain (48-byte public keys, 96-byte
//! signatures, proof-of-possession).
//!
//! Distinct `*Bytes` wrappers exist for keys and signatures that travel
//! inside SSZ containers: those fields must round-trip arbitrary bytes
//! (e.g. a deposit may legally carry a signature that is not a valid curve
//! point), so deserialization into an actual point is deferred until
//! verification time.

#[macro_use]
mod macros;
mod aggregate_public_key;
mod aggregate_signature;
mod keypair;
mod public_key;
mod public_key_bytes;
mod secret_key;
mod signature;
mod signature_bytes;
mod signature_set;

pub use aggregate_public_key::AggregatePublicKey;
pub use aggregate_signature::AggregateSignature;
pub use keypair::Keypair;
pub use public_key::{PublicKey, PUBLIC_KEY_BYTES_LEN};
pub use public_key_bytes::PublicKeyBytes;
pub use secret_key::{SecretKey, SECRET_KEY_BYTES_LEN};
pub use signature::{Signature, SIGNATURE_BYTES_LEN};
pub use signature_bytes::SignatureBytes;
pub use signature_set::{verify_signature_sets, SignatureSet};

pub type Hash256 = ethereum_types::H256;

/// The domain-separation tag for beacon-chain signatures
/// (`BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_`).
pub(crate) const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// The compressed encoding of the point at infinity in G2, used as the
/// canonical "empty" signature.
pub const INFINITY_SIGNATURE: [u8; SIGNATURE_BYTES_LEN] = {
    let mut bytes = [0; SIGNATURE_BYTES_LEN];
    bytes[0] = 0xc0;
    bytes
};

#[derive(Clone, PartialEq, Debug)]
pub enum Error {
    /// An error was raised from the `blst` library.
    BlstError(blst::BLST_ERROR),
    /// The provided bytes were an incorrect length.
    InvalidByteLength { got: usize, expected: usize },
    /// The bytes did not decode to a valid point on the curve.
    InvalidPoint,
    /// The secret key bytes are not in range of the curve order.
    InvalidSecretKey,
}

impl From<blst::BLST_ERROR> for Error {
    fn from(e: blst::BLST_ERROR) -> Error {
        Error::BlstError(e)
    }
}
