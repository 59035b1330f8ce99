use crate::{Error, Hash256, PublicKey, Signature, DST, INFINITY_SIGNATURE, SIGNATURE_BYTES_LEN};
use blst::min_pk as blst_core;
use blst::BLST_ERROR;

/// An aggregate of one or more BLS signatures over the *same* message.
///
/// Starts as the point at infinity (the aggregate of zero signatures) and
/// accumulates via `add_assign`.
#[derive(Clone)]
pub struct AggregateSignature {
    point: Option<blst_core::AggregateSignature>,
}

impl AggregateSignature {
    /// The aggregate of zero signatures: the point at infinity.
    pub fn infinity() -> Self {
        Self { point: None }
    }

    pub fn is_infinity(&self) -> bool {
        self.point.is_none()
    }

    /// Aggregate `other` into `self`.
    ///
    /// Infinity signatures are ignored, matching the behaviour of
    /// aggregating an empty set.
    pub fn add_assign(&mut self, other: &Signature) {
        let Some(other_point) = other.point() else {
            return;
        };
        match &mut self.point {
            Some(agg) => {
                // The point was group-checked when it was deserialized.
                let _ = agg.add_signature(other_point, false);
            }
            None => {
                self.point = Some(blst_core::AggregateSignature::from_signature(other_point));
            }
        }
    }

    /// Aggregate every signature in `others` into `self`.
    pub fn add_assign_aggregate(&mut self, other: &AggregateSignature) {
        if let Some(sig) = other.point.as_ref().map(|agg| agg.to_signature()) {
            self.add_assign(&Signature::from_point(sig));
        }
    }

    /// Verify `self` as the aggregate of signatures by `pubkeys` over the
    /// single message `msg`.
    pub fn fast_aggregate_verify(&self, msg: Hash256, pubkeys: &[&PublicKey]) -> bool {
        if pubkeys.is_empty() {
            return false;
        }
        let Some(agg) = &self.point else {
            return false;
        };
        let pubkey_points: Vec<&blst_core::PublicKey> =
            pubkeys.iter().map(|pk| pk.point()).collect();
        agg.to_signature()
            .fast_aggregate_verify(true, msg.as_bytes(), DST, &pubkey_points)
            == BLST_ERROR::BLST_SUCCESS
    }

    /// Verify `self` as the aggregate of signatures by `pubkeys` over the
    /// pairwise-distinct messages `msgs`.
    pub fn aggregate_verify(&self, msgs: &[Hash256], pubkeys: &[&PublicKey]) -> bool {
        if msgs.is_empty() || msgs.len() != pubkeys.len() {
            return false;
        }
        let Some(agg) = &self.point else {
            return false;
        };
        let msg_slices: Vec<&[u8]> = msgs.iter().map(|msg| msg.as_bytes()).collect();
        let pubkey_points: Vec<&blst_core::PublicKey> =
            pubkeys.iter().map(|pk| pk.point()).collect();
        agg.to_signature()
            .aggregate_verify(true, &msg_slices, DST, &pubkey_points, false)
            == BLST_ERROR::BLST_SUCCESS
    }

    /// Collapse into a plain signature (for batch-verification interfaces).
    pub(crate) fn to_single_signature(&self) -> Signature {
        match &self.point {
            Some(agg) => Signature::from_point(agg.to_signature()),
            None => Signature::empty(),
        }
    }

    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        match &self.point {
            Some(agg) => agg.to_signature().to_bytes(),
            None => INFINITY_SIGNATURE,
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let signature = Signature::deserialize(bytes)?;
        let point = signature
            .point()
            .map(blst_core::AggregateSignature::from_signature);
        Ok(Self { point })
    }
}

impl PartialEq for AggregateSignature {
    fn eq(&self, other: &Self) -> bool {
        self.serialize()[..] == other.serialize()[..]
    }
}

impl Eq for AggregateSignature {}

impl From<&Signature> for AggregateSignature {
    fn from(sig: &Signature) -> Self {
        let mut agg = Self::infinity();
        agg.add_assign(sig);
        agg
    }
}

impl_serialization_traits!(AggregateSignature, SIGNATURE_BYTES_LEN);
impl_std_hash!(AggregateSignature);
