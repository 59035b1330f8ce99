use crate::{AggregatePublicKey, AggregateSignature, Hash256, PublicKey, Signature, DST};
use blst::min_pk as blst_core;
use blst::{blst_scalar, blst_scalar_from_uint64, BLST_ERROR};
use rand::Rng;
use std::borrow::Cow;

/// The number of random bits mixed into each signature during batch
/// verification. 64 bits keeps the probability of a forged batch passing
/// below 2^-64, per the ethresear.ch "fast verification of multiple BLS
/// signatures" scheme.
const RAND_BITS: usize = 64;

/// A `(signature, signing keys, message)` triple, borrowed from some
/// consensus object, ready for individual or batched verification.
#[derive(Clone)]
pub struct SignatureSet<'a> {
    pub signature: Cow<'a, AggregateSignature>,
    pub(crate) signing_keys: Vec<Cow<'a, PublicKey>>,
    pub(crate) message: Hash256,
}

impl<'a> SignatureSet<'a> {
    /// A signature set with a single signer (block proposals, randao
    /// reveals, exits).
    pub fn single_pubkey(
        signature: &'a Signature,
        signing_key: Cow<'a, PublicKey>,
        message: Hash256,
    ) -> Self {
        Self {
            signature: Cow::Owned(AggregateSignature::from(signature)),
            signing_keys: vec![signing_key],
            message,
        }
    }

    /// A signature set with multiple signers of one message (attestations,
    /// slashing attestations).
    pub fn multiple_pubkeys(
        signature: &'a AggregateSignature,
        signing_keys: Vec<Cow<'a, PublicKey>>,
        message: Hash256,
    ) -> Self {
        Self {
            signature: Cow::Borrowed(signature),
            signing_keys,
            message,
        }
    }

    /// Verify this set on its own (no batching).
    pub fn verify(self) -> bool {
        let pubkeys: Vec<&PublicKey> = self.signing_keys.iter().map(|pk| pk.as_ref()).collect();
        self.signature.fast_aggregate_verify(self.message, &pubkeys)
    }

    /// Collapse the signing keys into one aggregate public key.
    fn aggregate_pubkey(&self) -> Option<PublicKey> {
        if self.signing_keys.is_empty() {
            return None;
        }
        let pubkeys: Vec<&PublicKey> = self.signing_keys.iter().map(|pk| pk.as_ref()).collect();
        AggregatePublicKey::aggregate(&pubkeys)
            .ok()
            .map(|agg| agg.to_public_key())
    }
}

/// Verify some number of signature sets in one batched operation, returning
/// `true` if and only if every set is valid.
///
/// Implements the [Faster verification of multiple BLS signatures](
/// https://ethresear.ch/t/fast-verification-of-multiple-bls-signatures/5407)
/// scheme: each set is scaled by a random non-zero scalar before being
/// folded into one pairing check, so it is not possible to learn *which* set
/// was invalid, only that at least one was.
pub fn verify_signature_sets<'a>(
    signature_sets: impl ExactSizeIterator<Item = &'a SignatureSet<'a>>,
) -> bool {
    let sets_len = signature_sets.len();
    if sets_len == 0 {
        return false;
    }

    let mut rng = rand::thread_rng();

    let mut rands: Vec<blst_scalar> = Vec::with_capacity(sets_len);
    let mut messages: Vec<Hash256> = Vec::with_capacity(sets_len);
    let mut signatures: Vec<Signature> = Vec::with_capacity(sets_len);
    let mut pubkeys: Vec<PublicKey> = Vec::with_capacity(sets_len);

    for set in signature_sets {
        let signature = set.signature.to_single_signature();
        if signature.is_infinity() {
            return false;
        }

        let Some(pubkey) = set.aggregate_pubkey() else {
            return false;
        };

        // A random non-zero 64-bit scalar per set.
        let mut vals = [0_u64; 4];
        while vals[0] == 0 {
            vals[0] = rng.gen();
        }
        let mut rand = std::mem::MaybeUninit::<blst_scalar>::uninit();
        // SAFETY: `blst_scalar_from_uint64` fully initialises the scalar from
        // the four words at `vals`.
        unsafe {
            blst_scalar_from_uint64(rand.as_mut_ptr(), vals.as_ptr());
            rands.push(rand.assume_init());
        }

        messages.push(set.message);
        signatures.push(signature);
        pubkeys.push(pubkey);
    }

    let message_slices: Vec<&[u8]> = messages.iter().map(|msg| msg.as_bytes()).collect();
    let signature_points: Vec<&blst_core::Signature> = signatures
        .iter()
        .map(|sig| sig.point().expect("infinity handled above"))
        .collect();
    let pubkey_points: Vec<&blst_core::PublicKey> = pubkeys.iter().map(|pk| pk.point()).collect();

    blst_core::Signature::verify_multiple_aggregate_signatures(
        &message_slices,
        DST,
        &pubkey_points,
        false,
        &signature_points,
        true,
        &rands,
        RAND_BITS,
    ) == BLST_ERROR::BLST_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keypair;

    fn signed_set(index: u64, msg: Hash256) -> (Keypair, Signature) {
        let keypair = Keypair::deterministic(index);
        let signature = keypair.sk.sign(msg);
        (keypair, signature)
    }

    #[test]
    fn single_signature_round_trip() {
        let msg = Hash256::from_low_u64_be(42);
        let (keypair, signature) = signed_set(0, msg);

        assert!(signature.verify(&keypair.pk, msg));
        assert!(!signature.verify(&keypair.pk, Hash256::from_low_u64_be(43)));
    }

    #[test]
    fn aggregate_verifies_and_rejects() {
        let msg = Hash256::from_low_u64_be(7);
        let mut agg = AggregateSignature::infinity();
        let mut pubkeys = vec![];

        for i in 0..4 {
            let (keypair, signature) = signed_set(i, msg);
            agg.add_assign(&signature);
            pubkeys.push(keypair.pk);
        }

        let pubkey_refs: Vec<&PublicKey> = pubkeys.iter().collect();
        assert!(agg.fast_aggregate_verify(msg, &pubkey_refs));

        // Dropping one signer breaks the aggregate.
        assert!(!agg.fast_aggregate_verify(msg, &pubkey_refs[..3]));
    }

    #[test]
    fn batched_sets() {
        let mut keypairs = vec![];
        let mut signatures = vec![];
        for i in 0..8_u64 {
            let msg = Hash256::from_low_u64_be(i);
            let (keypair, signature) = signed_set(i, msg);
            keypairs.push(keypair);
            signatures.push(signature);
        }

        let sets: Vec<SignatureSet> = keypairs
            .iter()
            .zip(&signatures)
            .enumerate()
            .map(|(i, (keypair, signature))| {
                SignatureSet::single_pubkey(
                    signature,
                    Cow::Borrowed(&keypair.pk),
                    Hash256::from_low_u64_be(i as u64),
                )
            })
            .collect();

        assert!(verify_signature_sets(sets.iter()));

        // One bad message poisons the whole batch.
        let mut bad_sets = sets;
        bad_sets[3].message = Hash256::from_low_u64_be(999);
        assert!(!verify_signature_sets(bad_sets.iter()));
    }

    #[test]
    fn empty_batch_is_invalid() {
        let sets: Vec<SignatureSet> = vec![];
        assert!(!verify_signature_sets(sets.iter()));
    }

    #[test]
    fn infinity_signature_never_verifies() {
        let keypair = Keypair::deterministic(0);
        let msg = Hash256::zero();
        let empty = Signature::empty();
        assert!(!empty.verify(&keypair.pk, msg));

        let set = SignatureSet::single_pubkey(&empty, Cow::Borrowed(&keypair.pk), msg);
        let sets = [set.clone()];
        assert!(!verify_signature_sets(sets.iter()));
        assert!(!set.verify());
    }

    #[test]
    fn serde_round_trips() {
        let (keypair, signature) = signed_set(1, Hash256::zero());

        let pk_bytes = keypair.pk.serialize();
        assert_eq!(PublicKey::deserialize(&pk_bytes).unwrap(), keypair.pk);

        let sig_bytes = signature.serialize();
        assert_eq!(Signature::deserialize(&sig_bytes).unwrap(), signature);

        assert_eq!(
            Signature::deserialize(&crate::INFINITY_SIGNATURE).unwrap(),
            Signature::empty()
        );
    }
}
