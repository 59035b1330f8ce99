//! Helpers for driving the state-transition functions in tests: a valid
//! chain of empty (or operation-carrying) blocks over a deterministic
//! validator registry.

use crate::state_advance::complete_state_advance;
use crate::{calculate_state_root, Cancellation};
use types::test_utils::TestingBeaconStateBuilder;
use types::*;

pub use types::test_utils::generate_deterministic_keypairs;

pub type E = MinimalEthSpec;

/// A genesis-like state with `validator_count` active validators and its
/// keypairs.
pub fn fresh_state(validator_count: usize) -> (BeaconState<E>, Vec<Keypair>, ChainSpec) {
    let spec = E::default_spec();
    let mut builder =
        TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(validator_count, &spec);
    builder.build_caches(&spec);
    let (state, keypairs) = builder.build();
    (state, keypairs, spec)
}

/// Advance `state` to `slot`, then build, root and sign a block with the
/// given `body_mutator` applied before the state root is computed.
pub fn build_signed_block(
    state: &mut BeaconState<E>,
    keypairs: &[Keypair],
    slot: Slot,
    spec: &ChainSpec,
    body_mutator: impl FnOnce(&mut BeaconBlockBody<E>, &BeaconState<E>),
) -> SignedBeaconBlock<E> {
    if state.slot() < slot {
        complete_state_advance(state, None, slot, spec).expect("should advance state");
    }

    let proposer_index = state
        .get_beacon_proposer_index(slot, spec)
        .expect("should find proposer");
    let proposer_sk = &keypairs[proposer_index].sk;

    let epoch = slot.epoch(E::slots_per_epoch());
    let randao_domain = state
        .get_domain(epoch, Domain::Randao, spec)
        .expect("should get domain");
    let randao_reveal = proposer_sk.sign(epoch.signing_root(randao_domain));

    let mut block = BeaconBlock::<E> {
        slot,
        proposer_index: proposer_index as u64,
        parent_root: state.latest_block_header().canonical_root(),
        state_root: Hash256::zero(),
        body: BeaconBlockBody {
            randao_reveal,
            eth1_data: state.eth1_data().clone(),
            graffiti: Hash256::zero(),
            proposer_slashings: VariableList::empty(),
            attester_slashings: VariableList::empty(),
            attestations: VariableList::empty(),
            deposits: VariableList::empty(),
            voluntary_exits: VariableList::empty(),
        },
    };

    body_mutator(&mut block.body, state);

    // Compute the post-state root the block must commit to.
    let unsigned = SignedBeaconBlock {
        message: block,
        signature: Signature::empty(),
    };
    let state_root = calculate_state_root(&Cancellation::default(), state, &unsigned, spec)
        .expect("should compute state root");
    let mut block = unsigned.message;
    block.state_root = state_root;

    // Sign it.
    let proposal_domain = state
        .get_domain(epoch, Domain::BeaconProposer, spec)
        .expect("should get domain");
    let signature = proposer_sk.sign(block.signing_root(proposal_domain));

    SignedBeaconBlock {
        message: block,
        signature,
    }
}

/// Sign an attestation for every member of the committee at `(slot, index)`.
pub fn signed_attestation(
    state: &BeaconState<E>,
    keypairs: &[Keypair],
    slot: Slot,
    index: u64,
    spec: &ChainSpec,
) -> Attestation<E> {
    let committee = state
        .get_beacon_committee(slot, index)
        .expect("should get committee");
    let committee_len = committee.committee.len();

    let data = AttestationData {
        slot,
        index,
        beacon_block_root: *state
            .get_block_root(slot)
            .expect("should get block root for attestation slot"),
        source: if slot.epoch(E::slots_per_epoch()) == state.current_epoch() {
            state.current_justified_checkpoint()
        } else {
            state.previous_justified_checkpoint()
        },
        target: Checkpoint {
            epoch: slot.epoch(E::slots_per_epoch()),
            root: *state
                .get_block_root(
                    slot.epoch(E::slots_per_epoch())
                        .start_slot(E::slots_per_epoch()),
                )
                .expect("should get target root"),
        },
    };

    let domain = state
        .get_domain(data.target.epoch, Domain::BeaconAttester, spec)
        .expect("should get attester domain");
    let message = data.signing_root(domain);

    let mut aggregation_bits = BitList::with_capacity(committee_len).expect("should create bits");
    let mut signature = AggregateSignature::infinity();
    for (i, &validator_index) in committee.committee.iter().enumerate() {
        aggregation_bits.set(i, true).expect("in bounds");
        signature.add_assign(&keypairs[validator_index].sk.sign(message));
    }

    Attestation {
        aggregation_bits,
        data,
        signature,
    }
}
