use crate::{Error, PublicKey};
use blst::min_pk as blst_core;

/// An aggregate of one or more BLS public keys.
#[derive(Clone)]
pub struct AggregatePublicKey {
    point: blst_core::AggregatePublicKey,
}

impl AggregatePublicKey {
    /// Aggregate a non-empty set of public keys.
    ///
    /// The individual keys were group-checked when they were deserialized.
    pub fn aggregate(pubkeys: &[&PublicKey]) -> Result<Self, Error> {
        let points: Vec<&blst_core::PublicKey> = pubkeys.iter().map(|pk| pk.point()).collect();
        let point = blst_core::AggregatePublicKey::aggregate(&points, false)?;
        Ok(Self { point })
    }

    /// Collapse into a plain public key.
    pub fn to_public_key(&self) -> PublicKey {
        PublicKey::from_point(self.point.to_public_key())
    }
}
