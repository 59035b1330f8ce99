use crate::common::DepositDataTree;
use crate::per_block_processing::process_operations::process_deposit;
use crate::per_block_processing::verify_deposit_merkle_proof;
use crate::per_block_processing::errors::BlockProcessingError;
use safe_arith::SafeArith;
use tree_hash::TreeHash;
use types::*;

/// Initialize a `BeaconState` from the genesis-triggering eth1 block and the
/// deposits made up to it.
///
/// Deposit proofs are rebuilt incrementally against a local replica of the
/// deposit contract tree, then processed through the same path as in-block
/// deposits.
pub fn initialize_beacon_state_from_eth1<T: EthSpec>(
    eth1_block_hash: Hash256,
    eth1_timestamp: u64,
    deposits: Vec<Deposit>,
    spec: &ChainSpec,
) -> Result<BeaconState<T>, BlockProcessingError> {
    let genesis_time = eth1_timestamp.safe_add(spec.genesis_delay)?;
    let eth1_data = Eth1Data {
        // Temporary deposit root
        deposit_root: Hash256::zero(),
        deposit_count: deposits.len() as u64,
        block_hash: eth1_block_hash,
    };
    let mut state = BeaconState::new(genesis_time, eth1_data, spec);

    // Seed RANDAO with Eth1 entropy
    state.fill_randao_mixes_with(eth1_block_hash);

    let mut deposit_tree =
        DepositDataTree::create(&[], 0, spec.deposit_contract_tree_depth as usize);

    for deposit in deposits.iter() {
        deposit_tree
            .push_leaf(deposit.data.tree_hash_root())
            .map_err(BlockProcessingError::MerkleTreeError)?;
        state.eth1_data_mut().deposit_root = deposit_tree.root();

        verify_deposit_merkle_proof(&state, deposit, state.eth1_deposit_index(), spec)
            .map_err(|e| {
                use crate::per_block_processing::errors::IntoWithIndex;
                e.into_with_index(state.eth1_deposit_index() as usize)
            })?;
        state.eth1_deposit_index_mut().safe_add_assign(1)?;

        process_deposit(&mut state, deposit, spec, false)?;
    }

    process_activations(&mut state, spec)?;

    // Now that we have our validators, fill in the pubkey cache; committee
    // caches build lazily once the chain is known to be viable.
    state.update_pubkey_cache()?;

    // Set genesis validators root for domain separation and chain versioning
    let genesis_validators_root = {
        let mut leaves = Vec::with_capacity(state.validators().len() * 32);
        for validator in state.validators() {
            leaves.extend_from_slice(validator.tree_hash_root().as_bytes());
        }
        // The validators list root, as it would be computed inside the state
        // root (limit-depth merkleization with the length mixed in).
        tree_hash::mix_in_length(
            &merkleize_with_limit::<T>(&leaves),
            state.validators().len(),
        )
    };
    state.set_genesis_validators_root(genesis_validators_root);

    Ok(state)
}

/// Merkleize validator leaves to the registry-limit depth.
fn merkleize_with_limit<T: EthSpec>(leaf_bytes: &[u8]) -> Hash256 {
    tree_hash::merkle_root(leaf_bytes, T::ValidatorRegistryLimit::to_usize())
}

/// Activate the validators which reached the maximum effective balance before
/// genesis.
///
/// A pre-genesis deposit of `MAX_EFFECTIVE_BALANCE` yields a validator that
/// is active from the genesis epoch.
pub fn process_activations<T: EthSpec>(
    state: &mut BeaconState<T>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for index in 0..state.validators().len() {
        let balance = state.get_balance(index)?;
        let effective_balance = std::cmp::min(
            balance.safe_sub(balance.safe_rem(spec.effective_balance_increment)?)?,
            spec.max_effective_balance,
        );

        let validator = state.get_validator_mut(index)?;
        validator.effective_balance = effective_balance;
        if validator.effective_balance == spec.max_effective_balance {
            validator.activation_eligibility_epoch = T::genesis_epoch();
            validator.activation_epoch = T::genesis_epoch();
        }
    }
    Ok(())
}

/// Returns `true` if the given state satisfies the conditions to launch the
/// chain.
pub fn is_valid_genesis_state<T: EthSpec>(state: &BeaconState<T>, spec: &ChainSpec) -> bool {
    state.genesis_time() >= spec.min_genesis_time
        && state
            .get_active_validator_indices(T::genesis_epoch())
            .len() as u64
            >= spec.min_genesis_active_validator_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::test_utils::generate_deterministic_keypairs;
    use types::MinimalEthSpec;

    type E = MinimalEthSpec;

    /// A full-balance pre-genesis deposit activates its validator at the
    /// genesis epoch.
    #[test]
    fn pregenesis_deposit_activates_validator() {
        let spec = E::default_spec();
        let keypairs = generate_deterministic_keypairs(2);

        let state = initialize_beacon_state_from_eth1::<E>(
            Hash256::from_low_u64_be(42),
            spec.min_genesis_time,
            build_genesis_deposits(&keypairs, spec.max_effective_balance, &spec),
            &spec,
        )
        .expect("genesis state should build");

        for validator in state.validators() {
            assert_eq!(validator.effective_balance, spec.max_effective_balance);
            assert_eq!(validator.activation_eligibility_epoch, Epoch::new(0));
            assert_eq!(validator.activation_epoch, Epoch::new(0));
        }
        assert_eq!(state.validators().len(), 2);
        assert_eq!(state.eth1_deposit_index(), 2);
        assert_ne!(state.genesis_validators_root(), Hash256::zero());
    }

    /// A partial deposit stays pending: no activation at genesis.
    #[test]
    fn partial_pregenesis_deposit_does_not_activate() {
        let spec = E::default_spec();
        let keypairs = generate_deterministic_keypairs(1);

        let state = initialize_beacon_state_from_eth1::<E>(
            Hash256::from_low_u64_be(42),
            spec.min_genesis_time,
            build_genesis_deposits(&keypairs, spec.max_effective_balance / 2, &spec),
            &spec,
        )
        .expect("genesis state should build");

        let validator = &state.validators()[0];
        assert_eq!(validator.effective_balance, spec.max_effective_balance / 2);
        assert_eq!(validator.activation_epoch, spec.far_future_epoch);
    }

    #[test]
    fn genesis_state_validity() {
        let spec = E::default_spec();
        let keypairs = generate_deterministic_keypairs(spec.min_genesis_active_validator_count as usize);

        let state = initialize_beacon_state_from_eth1::<E>(
            Hash256::from_low_u64_be(42),
            spec.min_genesis_time,
            build_genesis_deposits(&keypairs, spec.max_effective_balance, &spec),
            &spec,
        )
        .expect("genesis state should build");

        assert!(is_valid_genesis_state(&state, &spec));

        let mut too_early = state.clone();
        *too_early.genesis_time_mut() = spec.min_genesis_time - 1;
        assert!(!is_valid_genesis_state(&too_early, &spec));
    }

    /// Generate proofs leaf-by-leaf so each deposit's proof matches the tree
    /// at its own insertion point, as `initialize_beacon_state_from_eth1`
    /// verifies them.
    fn build_genesis_deposits(
        keypairs: &[Keypair],
        amount: u64,
        spec: &ChainSpec,
    ) -> Vec<Deposit> {
        let mut tree = DepositDataTree::create(&[], 0, spec.deposit_contract_tree_depth as usize);

        keypairs
            .iter()
            .enumerate()
            .map(|(i, keypair)| {
                let mut data = DepositData {
                    pubkey: PublicKeyBytes::from(&keypair.pk),
                    withdrawal_credentials: Hash256::from_low_u64_be(7),
                    amount,
                    signature: SignatureBytes::empty(),
                };
                data.signature = data.create_signature(&keypair.sk, spec);
                tree.push_leaf(data.tree_hash_root()).expect("tree has room");

                let (_, proof) = tree.generate_proof(i).expect("should prove the new leaf");
                Deposit {
                    proof: FixedVector::new(proof).expect("proof is depth + 1"),
                    data,
                }
            })
            .collect()
    }
}
