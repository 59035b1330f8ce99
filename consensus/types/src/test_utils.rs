//! Builders that produce deterministic states and keypairs for testing.

use crate::*;

/// Generate `validator_count` deterministic, obviously-insecure keypairs.
pub fn generate_deterministic_keypairs(validator_count: usize) -> Vec<Keypair> {
    (0..validator_count)
        .map(|i| Keypair::deterministic(i as u64))
        .collect()
}

/// Builds a `BeaconState` with a registry of active validators, suitable for
/// driving the state-transition functions in tests.
pub struct TestingBeaconStateBuilder<T: EthSpec> {
    state: BeaconState<T>,
    keypairs: Vec<Keypair>,
}

impl<T: EthSpec> TestingBeaconStateBuilder<T> {
    /// Create a genesis-like state with `validator_count` validators, all
    /// active since the genesis epoch with a maximum effective balance.
    pub fn from_deterministic_keypairs(validator_count: usize, spec: &ChainSpec) -> Self {
        let keypairs = generate_deterministic_keypairs(validator_count);

        let eth1_data = Eth1Data {
            deposit_root: Hash256::zero(),
            deposit_count: validator_count as u64,
            block_hash: Hash256::from_low_u64_be(42),
        };

        let mut state = BeaconState::new(spec.min_genesis_time, eth1_data, spec);
        state.fill_randao_mixes_with(Hash256::from_low_u64_be(42));

        for keypair in &keypairs {
            let validator = Validator {
                pubkey: PublicKeyBytes::from(&keypair.pk),
                withdrawal_credentials: Hash256::from_low_u64_be(7),
                effective_balance: spec.max_effective_balance,
                slashed: false,
                activation_eligibility_epoch: T::genesis_epoch(),
                activation_epoch: T::genesis_epoch(),
                exit_epoch: spec.far_future_epoch,
                withdrawable_epoch: spec.far_future_epoch,
            };
            state
                .push_validator(validator, spec.max_effective_balance)
                .expect("builder validator count is within the registry limit");
        }

        Self { state, keypairs }
    }

    /// Set the state's slot without performing transitions, back-filling the
    /// recent block/state roots so that lookups within the historical window
    /// succeed.
    pub fn teleport_to_slot(&mut self, slot: Slot) -> &mut Self {
        *self.state.slot_mut() = slot;
        self
    }

    /// Build the committee and pubkey caches.
    pub fn build_caches(&mut self, spec: &ChainSpec) -> &mut Self {
        self.state
            .build_caches(spec)
            .expect("builder state should build caches");
        self
    }

    pub fn build(self) -> (BeaconState<T>, Vec<Keypair>) {
        (self.state, self.keypairs)
    }
}
