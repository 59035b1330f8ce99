#![cfg(test)]

use super::*;
use crate::common::DepositDataTree;
use crate::per_block_processing::errors::*;
use crate::test_utils::*;
use crate::*;
use types::*;

/// Enough validators for multi-member committees on the minimal preset.
const VALIDATOR_COUNT: usize = 64;

mod block_application {
    use super::*;

    #[test]
    fn valid_empty_block_full_verification() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);

        let block = build_signed_block(&mut state, &keypairs, Slot::new(1), &spec, |_, _| ());

        execute_state_transition(&Cancellation::default(), &mut state, &block, None, &spec)
            .expect("a well-formed, well-signed block should apply");

        assert_eq!(state.slot(), Slot::new(1));
        assert_eq!(
            state.update_tree_hash_cache().unwrap(),
            block.message.state_root
        );
    }

    #[test]
    fn state_root_mismatch_is_rejected() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);

        let mut block = build_signed_block(&mut state, &keypairs, Slot::new(1), &spec, |_, _| ());
        block.message.state_root = Hash256::from_low_u64_be(42);

        // Re-signing is unnecessary: the no-verify entry checks roots too.
        let result = execute_state_transition_no_verify_any_sig(
            &Cancellation::default(),
            &mut state,
            &block,
            None,
            &spec,
        );

        assert!(matches!(
            result,
            Err(StateTransitionError::StateRootMismatch { .. })
        ));
    }

    #[test]
    fn bad_proposal_signature_is_rejected() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);

        let mut block = build_signed_block(&mut state, &keypairs, Slot::new(1), &spec, |_, _| ());
        block.signature = Signature::empty();

        let result =
            execute_state_transition(&Cancellation::default(), &mut state, &block, None, &spec);

        assert_eq!(
            result,
            Err(StateTransitionError::BlockProcessing(
                BlockProcessingError::BulkSignatureVerificationFailed
            ))
        );
    }

    #[test]
    fn wrong_proposer_is_rejected() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);

        let mut block = build_signed_block(&mut state, &keypairs, Slot::new(1), &spec, |_, _| ());
        block.message.proposer_index = (block.message.proposer_index + 1) % VALIDATOR_COUNT as u64;

        let result = per_block_processing(
            &mut state,
            &block,
            None,
            BlockSignatureStrategy::NoVerification,
            &spec,
        );

        assert!(matches!(
            result,
            Err(BlockProcessingError::HeaderInvalid {
                reason: HeaderInvalid::ProposerIndexMismatch { .. }
            })
        ));
    }

    #[test]
    fn deterministic_replay_yields_identical_bytes() {
        use ssz::Encode;

        let (state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);

        let mut state_a = state.clone();
        let block =
            build_signed_block(&mut state_a.clone(), &keypairs, Slot::new(1), &spec, |_, _| ());

        let mut run = |mut s: BeaconState<E>| {
            execute_state_transition(&Cancellation::default(), &mut s, &block, None, &spec)
                .expect("block should apply");
            s.as_ssz_bytes()
        };

        assert_eq!(run(state.clone()), run(state));
    }
}

mod attestations {
    use super::*;

    #[test]
    fn valid_attestation_is_recorded() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);

        // Advance so that slot-1 attestations are includable at slot 2.
        let block = build_signed_block(
            &mut state,
            &keypairs,
            Slot::new(2),
            &spec,
            |body, state| {
                let attestation =
                    signed_attestation(state, &keypairs, Slot::new(1), 0, &spec);
                body.attestations
                    .push(attestation)
                    .expect("should push attestation");
            },
        );

        execute_state_transition(&Cancellation::default(), &mut state, &block, None, &spec)
            .expect("block with attestation should apply");

        assert_eq!(state.current_epoch_attestations().len(), 1);
        assert_eq!(
            state.current_epoch_attestations()[0].proposer_index,
            block.message.proposer_index
        );
        assert_eq!(state.current_epoch_attestations()[0].inclusion_delay, 1);
    }

    /// Regression: an attestation whose committee index equals the committee
    /// count must be rejected, not resolved against a default committee.
    #[test]
    fn committee_index_equal_to_count_is_rejected() {
        let (mut state, keypairs, spec) = fresh_state(8);

        crate::state_advance::complete_state_advance(&mut state, None, Slot::new(2), &spec)
            .unwrap();

        let committee_count = state.get_committee_count_at_slot(Slot::new(1)).unwrap();
        assert_eq!(committee_count, 1);

        let mut attestation = signed_attestation(&state, &keypairs, Slot::new(1), 0, &spec);
        attestation.data.index = 1;

        let result = verify_attestation_for_block_inclusion(
            &state,
            &attestation,
            VerifySignatures::False,
            &spec,
        );

        let err = result.expect_err("index == count must not resolve");
        match err {
            BlockOperationError::Invalid(reason) => {
                assert_eq!(
                    reason,
                    AttestationInvalid::BadCommitteeIndex {
                        index: 1,
                        committee_count: 1,
                    }
                );
                assert_eq!(
                    format!("{}", reason),
                    "committee index 1 >= committee count 1"
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// An attestation whose FFG source does not match the justified
    /// checkpoint the state holds must be rejected.
    #[test]
    fn incorrect_source_checkpoint_is_rejected() {
        let (mut state, keypairs, spec) = fresh_state(8);

        crate::state_advance::complete_state_advance(
            &mut state,
            None,
            Slot::new(spec.min_attestation_inclusion_delay),
            &spec,
        )
        .unwrap();

        let mut checkpoint = state.current_justified_checkpoint();
        checkpoint.root = Hash256::from_slice(&{
            let mut root = [0; 32];
            root[0..11].copy_from_slice(b"hello-world");
            root
        });
        state.set_current_justified_checkpoint(checkpoint);
        assert!(state.current_epoch_attestations().is_empty());

        let mut attestation = signed_attestation(&state, &keypairs, Slot::new(0), 0, &spec);
        attestation.data.source = Checkpoint {
            epoch: Epoch::new(99),
            root: checkpoint.root,
        };
        attestation.data.target.epoch = Epoch::new(0);

        let result = verify_attestation_for_block_inclusion(
            &state,
            &attestation,
            VerifySignatures::False,
            &spec,
        );

        assert!(matches!(
            result,
            Err(BlockOperationError::Invalid(
                AttestationInvalid::WrongJustifiedCheckpoint { .. }
            ))
        ));
    }
}

mod deposits {
    use super::*;

    fn deposit_data(keypair: &Keypair, amount: u64, spec: &ChainSpec) -> DepositData {
        let mut data = DepositData {
            pubkey: PublicKeyBytes::from(&keypair.pk),
            withdrawal_credentials: Hash256::from_low_u64_be(7),
            amount,
            signature: SignatureBytes::empty(),
        };
        data.signature = data.create_signature(&keypair.sk, spec);
        data
    }

    /// Build proofs for `data` against a fresh deposit tree and prime the
    /// state's eth1 data to match.
    fn prime_deposits(
        state: &mut BeaconState<E>,
        data: Vec<DepositData>,
    ) -> Vec<Deposit> {
        use tree_hash::TreeHash;

        let depth = E::default_spec().deposit_contract_tree_depth as usize;
        let leaves: Vec<Hash256> = data.iter().map(|d| d.tree_hash_root()).collect();
        let tree = DepositDataTree::create(&leaves, leaves.len(), depth);

        state.eth1_data_mut().deposit_root = tree.root();
        state.eth1_data_mut().deposit_count = leaves.len() as u64;

        data.into_iter()
            .enumerate()
            .map(|(i, data)| {
                let (_, proof) = tree.generate_proof(i).expect("should prove deposit");
                Deposit {
                    proof: FixedVector::new(proof).expect("proof length is tree depth + 1"),
                    data,
                }
            })
            .collect()
    }

    #[test]
    fn deposit_count_must_be_exact() {
        let (mut state, _, spec) = fresh_state(8);
        state.eth1_data_mut().deposit_count = 3;

        let result = process_operations::process_deposits(&mut state, &[], &spec);

        assert_eq!(
            result,
            Err(BlockProcessingError::DepositCountInvalid {
                expected: 3,
                found: 0,
            })
        );
    }

    #[test]
    fn new_validator_and_topup_are_applied() {
        let (mut state, _, spec) = fresh_state(8);

        let new_keypair = Keypair::deterministic(1_000);
        let existing = state.validators()[0].pubkey;
        let existing_keypair = Keypair::deterministic(0);
        assert_eq!(PublicKeyBytes::from(&existing_keypair.pk), existing);

        let deposits = prime_deposits(
            &mut state,
            vec![
                deposit_data(&new_keypair, spec.max_effective_balance, &spec),
                deposit_data(&existing_keypair, 1_000_000_000, &spec),
            ],
        );

        let balance_before = state.get_balance(0).unwrap();
        process_operations::process_deposits(&mut state, &deposits, &spec)
            .expect("valid deposits should process");

        assert_eq!(state.validators().len(), 9);
        assert_eq!(state.balances().len(), 9);
        assert_eq!(state.eth1_deposit_index(), 2);
        assert_eq!(
            state.get_balance(0).unwrap(),
            balance_before + 1_000_000_000
        );
        let new_validator = &state.validators()[8];
        assert_eq!(new_validator.effective_balance, spec.max_effective_balance);
        assert_eq!(new_validator.activation_epoch, spec.far_future_epoch);
    }

    /// One bad signature among the deposits fails the aggregate check; the
    /// per-deposit fallback must still admit the valid ones and silently
    /// skip the bad one.
    #[test]
    fn invalid_signature_falls_back_and_is_skipped() {
        let (mut state, _, spec) = fresh_state(8);

        let mut bad = deposit_data(&Keypair::deterministic(1_001), spec.max_effective_balance, &spec);
        bad.signature = SignatureBytes::empty();

        let deposits = prime_deposits(
            &mut state,
            vec![
                deposit_data(&Keypair::deterministic(1_000), spec.max_effective_balance, &spec),
                bad,
                deposit_data(&Keypair::deterministic(1_002), spec.max_effective_balance, &spec),
            ],
        );

        process_operations::process_deposits(&mut state, &deposits, &spec)
            .expect("bad deposit signatures never fail the block");

        // The two valid deposits created validators; the bad one was skipped
        // but still consumed its deposit index.
        assert_eq!(state.validators().len(), 10);
        assert_eq!(state.eth1_deposit_index(), 3);
    }

    #[test]
    fn bad_merkle_proof_is_fatal() {
        let (mut state, _, spec) = fresh_state(8);

        let deposits = prime_deposits(
            &mut state,
            vec![deposit_data(
                &Keypair::deterministic(1_000),
                E::default_spec().max_effective_balance,
                &spec,
            )],
        );
        state.eth1_data_mut().deposit_root = Hash256::from_low_u64_be(1234);

        let result = process_operations::process_deposits(&mut state, &deposits, &spec);

        assert_eq!(
            result,
            Err(BlockProcessingError::DepositInvalid {
                index: 0,
                reason: DepositInvalid::BadMerkleProof,
            })
        );
    }
}

mod exits {
    use super::*;

    fn signed_exit(
        state: &BeaconState<E>,
        keypair: &Keypair,
        validator_index: u64,
        spec: &ChainSpec,
    ) -> SignedVoluntaryExit {
        let message = VoluntaryExit {
            epoch: state.current_epoch(),
            validator_index,
        };
        let domain = state
            .get_domain(message.epoch, Domain::VoluntaryExit, spec)
            .unwrap();
        let signature = keypair.sk.sign(message.signing_root(domain));
        SignedVoluntaryExit { message, signature }
    }

    fn state_at_epoch(epoch: u64, spec: &ChainSpec) -> (BeaconState<E>, Vec<Keypair>) {
        let (mut state, keypairs, _) = fresh_state(8);
        crate::state_advance::partial_state_advance(
            &mut state,
            Some(Hash256::zero()),
            Epoch::new(epoch).start_slot(E::slots_per_epoch()),
            spec,
        )
        .expect("should advance");
        (state, keypairs)
    }

    #[test]
    fn mature_validator_may_exit() {
        let spec = E::default_spec();
        let (mut state, keypairs) = state_at_epoch(spec.shard_committee_period, &spec);

        let exit = signed_exit(&state, &keypairs[3], 3, &spec);
        process_operations::process_exits(&mut state, &[exit], VerifySignatures::True, &spec)
            .expect("mature validator should exit");

        assert_ne!(state.validators()[3].exit_epoch, spec.far_future_epoch);
    }

    /// A validator which activated too recently must be refused with the
    /// "not been active long enough" reason.
    #[test]
    fn immature_validator_may_not_exit() {
        let spec = E::default_spec();
        let (mut state, keypairs) = state_at_epoch(spec.shard_committee_period, &spec);

        let current_epoch = state.current_epoch();
        state.get_validator_mut(3).unwrap().activation_epoch =
            current_epoch - spec.shard_committee_period + 1_u64;

        let exit = signed_exit(&state, &keypairs[3], 3, &spec);
        let result =
            process_operations::process_exits(&mut state, &[exit], VerifySignatures::True, &spec);

        match result {
            Err(BlockProcessingError::ExitInvalid {
                index: 0,
                reason: reason @ ExitInvalid::TooYoungToExit { .. },
            }) => {
                assert!(format!("{}", reason).contains("has not been active long enough"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(state.validators()[3].exit_epoch, spec.far_future_epoch);
    }

    #[test]
    fn double_exit_is_rejected() {
        let spec = E::default_spec();
        let (mut state, keypairs) = state_at_epoch(spec.shard_committee_period, &spec);

        let exit = signed_exit(&state, &keypairs[3], 3, &spec);
        process_operations::process_exits(
            &mut state,
            std::slice::from_ref(&exit),
            VerifySignatures::True,
            &spec,
        )
        .expect("first exit should apply");

        let result = process_operations::process_exits(
            &mut state,
            &[exit],
            VerifySignatures::True,
            &spec,
        );
        assert!(matches!(
            result,
            Err(BlockProcessingError::ExitInvalid {
                index: 0,
                reason: ExitInvalid::AlreadyExited(3),
            })
        ));
    }
}

mod slashings {
    use super::*;

    fn signed_header(
        state: &BeaconState<E>,
        keypair: &Keypair,
        proposer_index: u64,
        slot: Slot,
        body_root: Hash256,
        spec: &ChainSpec,
    ) -> SignedBeaconBlockHeader {
        let message = BeaconBlockHeader {
            slot,
            proposer_index,
            parent_root: Hash256::from_low_u64_be(1),
            state_root: Hash256::from_low_u64_be(2),
            body_root,
        };
        let domain = state
            .get_domain(
                slot.epoch(E::slots_per_epoch()),
                Domain::BeaconProposer,
                spec,
            )
            .unwrap();
        let signature = keypair.sk.sign(message.signing_root(domain));
        SignedBeaconBlockHeader { message, signature }
    }

    #[test]
    fn double_proposal_is_slashed() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);
        crate::state_advance::complete_state_advance(&mut state, None, Slot::new(1), &spec)
            .unwrap();

        let proposer = 5u64;
        let slashing = ProposerSlashing {
            signed_header_1: signed_header(
                &state,
                &keypairs[5],
                proposer,
                Slot::new(1),
                Hash256::from_low_u64_be(10),
                &spec,
            ),
            signed_header_2: signed_header(
                &state,
                &keypairs[5],
                proposer,
                Slot::new(1),
                Hash256::from_low_u64_be(11),
                &spec,
            ),
        };

        process_operations::process_proposer_slashings(
            &mut state,
            &[slashing],
            VerifySignatures::True,
            &spec,
        )
        .expect("valid proposer slashing should apply");

        let validator = &state.validators()[5];
        assert!(validator.slashed);
        assert_ne!(validator.exit_epoch, spec.far_future_epoch);
        // The slashed balance was recorded for proportional slashing.
        assert_eq!(
            state.get_slashings_at(state.current_epoch()).unwrap(),
            validator.effective_balance
        );
    }

    #[test]
    fn identical_headers_are_not_slashable() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);
        crate::state_advance::complete_state_advance(&mut state, None, Slot::new(1), &spec)
            .unwrap();

        let header = signed_header(
            &state,
            &keypairs[5],
            5,
            Slot::new(1),
            Hash256::from_low_u64_be(10),
            &spec,
        );
        let slashing = ProposerSlashing {
            signed_header_1: header.clone(),
            signed_header_2: header,
        };

        let result = process_operations::process_proposer_slashings(
            &mut state,
            &[slashing],
            VerifySignatures::True,
            &spec,
        );
        assert!(matches!(
            result,
            Err(BlockProcessingError::ProposerSlashingInvalid {
                index: 0,
                reason: ProposerSlashingInvalid::ProposalsIdentical,
            })
        ));
    }

    #[test]
    fn surround_vote_is_slashed() {
        let (mut state, keypairs, spec) = fresh_state(VALIDATOR_COUNT);
        crate::state_advance::complete_state_advance(
            &mut state,
            None,
            Epoch::new(4).start_slot(E::slots_per_epoch()),
            &spec,
        )
        .unwrap();

        let indexed = |source: u64, target: u64| -> IndexedAttestation<E> {
            let data = AttestationData {
                slot: Epoch::new(target).start_slot(E::slots_per_epoch()),
                index: 0,
                beacon_block_root: Hash256::zero(),
                source: Checkpoint {
                    epoch: Epoch::new(source),
                    root: Hash256::zero(),
                },
                target: Checkpoint {
                    epoch: Epoch::new(target),
                    root: Hash256::zero(),
                },
            };
            let domain = state
                .get_domain(data.target.epoch, Domain::BeaconAttester, &spec)
                .unwrap();
            let message = data.signing_root(domain);
            let mut signature = AggregateSignature::infinity();
            signature.add_assign(&keypairs[7].sk.sign(message));

            IndexedAttestation {
                attesting_indices: VariableList::new(vec![7]).unwrap(),
                data,
                signature,
            }
        };

        let slashing = AttesterSlashing {
            attestation_1: indexed(0, 3),
            attestation_2: indexed(1, 2),
        };

        process_operations::process_attester_slashings(
            &mut state,
            &[slashing],
            VerifySignatures::True,
            &spec,
        )
        .expect("surround vote should slash");

        assert!(state.validators()[7].slashed);
    }
}
