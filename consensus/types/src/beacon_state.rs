use crate::*;
use ethereum_hashing::hash;
use int_to_bytes::{int_to_bytes4, int_to_bytes8};
use safe_arith::{ArithError, SafeArith};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use std::sync::Arc;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

pub use self::committee_cache::{
    compute_committee_range_in_epoch, epoch_committee_count, get_active_validator_indices,
    AttestationDuty, BeaconCommittee, CommitteeCache,
};
pub use self::exit_cache::ExitCache;
pub use self::pubkey_cache::PubkeyCache;
pub use self::tree_hash_cache::{BeaconTreeHashCache, BeaconTreeHashCacheInner};

mod committee_cache;
mod exit_cache;
mod pubkey_cache;
mod tree_hash_cache;

#[cfg(test)]
mod tests;

/// The number of committee caches held by a state: previous, current and next
/// epoch.
pub const CACHED_EPOCHS: usize = 3;

/// The number of rounds the proposer-sampling walk may take before giving
/// up. In practice selection succeeds within a handful of rounds; hitting
/// this bound indicates a broken registry.
const MAX_PROPOSER_SELECTION_ROUNDS: u64 = 1 << 16;

const MAX_RANDOM_BYTE: u64 = u8::max_value() as u64;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    EpochOutOfBounds,
    SlotOutOfBounds,
    UnknownValidator(usize),
    BalancesOutOfBounds(usize),
    RandaoMixOutOfBounds(usize),
    InsufficientValidators,
    TooManyValidators,
    UnableToShuffle,
    ShuffleIndexOutOfBounds(usize),
    /// The candidate walk of proposer selection exceeded its round bound.
    UnableToSelectProposer,
    NoCommittee {
        slot: Slot,
        index: CommitteeIndex,
    },
    CommitteeCacheUninitialized(Option<RelativeEpoch>),
    /// The deposit index has overtaken the deposit count, which breaks a
    /// state invariant.
    InvalidDepositState {
        deposit_count: u64,
        deposit_index: u64,
    },
    RelativeEpochError(RelativeEpochError),
    ExitCacheUninitialized,
    PubkeyCacheInconsistent,
    InvalidBitfield,
    CachedTreeHashError(cached_tree_hash::Error),
    SszTypesError(ssz_types::Error),
    ArithError(ArithError),
}

/// Control whether an epoch-indexed field can be indexed at the next epoch or
/// not.
#[derive(Debug, PartialEq, Clone, Copy)]
enum AllowNextEpoch {
    True,
    False,
}

impl AllowNextEpoch {
    fn upper_bound_of(self, current_epoch: Epoch) -> Result<Epoch, Error> {
        match self {
            AllowNextEpoch::True => Ok(current_epoch.safe_add(1u64)?),
            AllowNextEpoch::False => Ok(current_epoch),
        }
    }
}

/// Configuration for the cloning of a `BeaconState`.
///
/// Cloning is always cheap for the big list fields (their tries are
/// refcount-shared), so this only controls which caches travel with the
/// clone.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct CloneConfig {
    pub committee_caches: bool,
    pub pubkey_cache: bool,
    pub exit_cache: bool,
    pub tree_hash_cache: bool,
}

impl CloneConfig {
    pub fn all() -> Self {
        Self {
            committee_caches: true,
            pubkey_cache: true,
            exit_cache: true,
            tree_hash_cache: true,
        }
    }

    pub fn none() -> Self {
        Self {
            committee_caches: false,
            pubkey_cache: false,
            exit_cache: false,
            tree_hash_cache: false,
        }
    }

    pub fn committee_caches_only() -> Self {
        Self {
            committee_caches: true,
            ..Self::none()
        }
    }
}

/// The state of the `BeaconChain` at some slot.
///
/// Fields are kept private: every mutation flows through a setter that keeps
/// the incremental tree-hash cache's dirty tracking in sync.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "T: EthSpec")]
pub struct BeaconState<T>
where
    T: EthSpec,
{
    // Versioning
    #[serde(with = "serde_utils::quoted_u64")]
    genesis_time: u64,
    genesis_validators_root: Hash256,
    slot: Slot,
    fork: Fork,

    // History
    latest_block_header: BeaconBlockHeader,
    block_roots: FixedVector<Hash256, T::SlotsPerHistoricalRoot>,
    state_roots: FixedVector<Hash256, T::SlotsPerHistoricalRoot>,
    historical_roots: VariableList<Hash256, T::HistoricalRootsLimit>,

    // Ethereum 1.0 chain data
    eth1_data: Eth1Data,
    eth1_data_votes: VariableList<Eth1Data, T::SlotsPerEth1VotingPeriod>,
    #[serde(with = "serde_utils::quoted_u64")]
    eth1_deposit_index: u64,

    // Registry
    validators: VariableList<Validator, T::ValidatorRegistryLimit>,
    #[serde(with = "ssz_types::serde_utils::quoted_u64_var_list")]
    balances: VariableList<u64, T::ValidatorRegistryLimit>,

    // Randomness
    randao_mixes: FixedVector<Hash256, T::EpochsPerHistoricalVector>,

    // Slashings
    #[serde(with = "ssz_types::serde_utils::quoted_u64_fixed_vec")]
    slashings: FixedVector<u64, T::EpochsPerSlashingsVector>,

    // Attestations
    previous_epoch_attestations: VariableList<PendingAttestation<T>, T::MaxPendingAttestations>,
    current_epoch_attestations: VariableList<PendingAttestation<T>, T::MaxPendingAttestations>,

    // Finality
    justification_bits: BitVector<T::JustificationBitsLength>,
    previous_justified_checkpoint: Checkpoint,
    current_justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,

    // Caching (not in the spec)
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    committee_caches: [Arc<CommitteeCache>; CACHED_EPOCHS],
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pubkey_cache: PubkeyCache,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    exit_cache: ExitCache,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    tree_hash_cache: BeaconTreeHashCache<T>,
}

impl<T: EthSpec> BeaconState<T> {
    /// Create a new state at genesis slot, with empty caches.
    ///
    /// Most fields start at their SSZ zero value; the caller (the genesis
    /// routine) populates validators, randao mixes and friends.
    pub fn new(genesis_time: u64, eth1_data: Eth1Data, spec: &ChainSpec) -> Self {
        BeaconState {
            // Versioning
            genesis_time,
            genesis_validators_root: Hash256::zero(),
            slot: spec.genesis_slot,
            fork: Fork {
                previous_version: spec.genesis_fork_version,
                current_version: spec.genesis_fork_version,
                epoch: T::genesis_epoch(),
            },

            // History
            latest_block_header: BeaconBlock::<T>::empty(spec).temporary_block_header(),
            block_roots: FixedVector::default(),
            state_roots: FixedVector::default(),
            historical_roots: VariableList::empty(),

            // Eth1
            eth1_data,
            eth1_data_votes: VariableList::empty(),
            eth1_deposit_index: 0,

            // Validator registry
            validators: VariableList::empty(),
            balances: VariableList::empty(),

            // Randomness
            randao_mixes: FixedVector::default(),

            // Slashings
            slashings: FixedVector::default(),

            // Attestations
            previous_epoch_attestations: VariableList::empty(),
            current_epoch_attestations: VariableList::empty(),

            // Finality
            justification_bits: BitVector::new(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),

            // Caching (not in spec)
            committee_caches: [
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
            ],
            pubkey_cache: PubkeyCache::default(),
            exit_cache: ExitCache::default(),
            tree_hash_cache: BeaconTreeHashCache::default(),
        }
    }

    /*
     * Plain getters.
     */

    pub fn genesis_time(&self) -> u64 {
        self.genesis_time
    }

    pub fn genesis_validators_root(&self) -> Hash256 {
        self.genesis_validators_root
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn fork(&self) -> &Fork {
        &self.fork
    }

    pub fn latest_block_header(&self) -> &BeaconBlockHeader {
        &self.latest_block_header
    }

    pub fn block_roots(&self) -> &FixedVector<Hash256, T::SlotsPerHistoricalRoot> {
        &self.block_roots
    }

    pub fn state_roots(&self) -> &FixedVector<Hash256, T::SlotsPerHistoricalRoot> {
        &self.state_roots
    }

    pub fn historical_roots(&self) -> &VariableList<Hash256, T::HistoricalRootsLimit> {
        &self.historical_roots
    }

    pub fn eth1_data(&self) -> &Eth1Data {
        &self.eth1_data
    }

    pub fn eth1_data_votes(&self) -> &VariableList<Eth1Data, T::SlotsPerEth1VotingPeriod> {
        &self.eth1_data_votes
    }

    pub fn eth1_deposit_index(&self) -> u64 {
        self.eth1_deposit_index
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn balances(&self) -> &[u64] {
        &self.balances
    }

    pub fn randao_mixes(&self) -> &FixedVector<Hash256, T::EpochsPerHistoricalVector> {
        &self.randao_mixes
    }

    pub fn slashings(&self) -> &FixedVector<u64, T::EpochsPerSlashingsVector> {
        &self.slashings
    }

    pub fn previous_epoch_attestations(
        &self,
    ) -> &VariableList<PendingAttestation<T>, T::MaxPendingAttestations> {
        &self.previous_epoch_attestations
    }

    pub fn current_epoch_attestations(
        &self,
    ) -> &VariableList<PendingAttestation<T>, T::MaxPendingAttestations> {
        &self.current_epoch_attestations
    }

    pub fn justification_bits(&self) -> &BitVector<T::JustificationBitsLength> {
        &self.justification_bits
    }

    pub fn previous_justified_checkpoint(&self) -> Checkpoint {
        self.previous_justified_checkpoint
    }

    pub fn current_justified_checkpoint(&self) -> Checkpoint {
        self.current_justified_checkpoint
    }

    pub fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }

    /*
     * Plain setters.
     *
     * The scalar fields carry no trie, so mutable access needs no dirty
     * bookkeeping.
     */

    pub fn genesis_time_mut(&mut self) -> &mut u64 {
        &mut self.genesis_time
    }

    pub fn set_genesis_validators_root(&mut self, root: Hash256) {
        self.genesis_validators_root = root;
    }

    pub fn slot_mut(&mut self) -> &mut Slot {
        &mut self.slot
    }

    pub fn fork_mut(&mut self) -> &mut Fork {
        &mut self.fork
    }

    pub fn latest_block_header_mut(&mut self) -> &mut BeaconBlockHeader {
        &mut self.latest_block_header
    }

    pub fn eth1_data_mut(&mut self) -> &mut Eth1Data {
        &mut self.eth1_data
    }

    pub fn eth1_data_votes_mut(
        &mut self,
    ) -> &mut VariableList<Eth1Data, T::SlotsPerEth1VotingPeriod> {
        &mut self.eth1_data_votes
    }

    pub fn eth1_deposit_index_mut(&mut self) -> &mut u64 {
        &mut self.eth1_deposit_index
    }

    pub fn historical_roots_mut(&mut self) -> &mut VariableList<Hash256, T::HistoricalRootsLimit> {
        &mut self.historical_roots
    }

    pub fn previous_epoch_attestations_mut(
        &mut self,
    ) -> &mut VariableList<PendingAttestation<T>, T::MaxPendingAttestations> {
        &mut self.previous_epoch_attestations
    }

    pub fn current_epoch_attestations_mut(
        &mut self,
    ) -> &mut VariableList<PendingAttestation<T>, T::MaxPendingAttestations> {
        &mut self.current_epoch_attestations
    }

    pub fn justification_bits_mut(&mut self) -> &mut BitVector<T::JustificationBitsLength> {
        &mut self.justification_bits
    }

    pub fn set_previous_justified_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.previous_justified_checkpoint = checkpoint;
    }

    pub fn set_current_justified_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.current_justified_checkpoint = checkpoint;
    }

    pub fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.finalized_checkpoint = checkpoint;
    }

    /*
     * Epochs.
     */

    /// The epoch corresponding to `self.slot()`.
    pub fn current_epoch(&self) -> Epoch {
        self.slot.epoch(T::slots_per_epoch())
    }

    /// The epoch prior to `self.current_epoch()`.
    ///
    /// If the current epoch is the genesis epoch, the genesis epoch is
    /// returned.
    pub fn previous_epoch(&self) -> Epoch {
        let current_epoch = self.current_epoch();
        if current_epoch > T::genesis_epoch() {
            current_epoch
                .safe_sub(1u64)
                .expect("current epoch greater than genesis implies greater than 0")
        } else {
            current_epoch
        }
    }

    /// The epoch following `self.current_epoch()`.
    pub fn next_epoch(&self) -> Result<Epoch, Error> {
        Ok(self.current_epoch().safe_add(1u64)?)
    }

    /*
     * Validators and balances.
     */

    pub fn get_validator(&self, validator_index: usize) -> Result<&Validator, Error> {
        self.validators
            .get(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    /// Mutable access to one validator, recording the index as dirty in the
    /// tree-hash cache.
    pub fn get_validator_mut(&mut self, validator_index: usize) -> Result<&mut Validator, Error> {
        self.tree_hash_cache.mark_validator_dirty(validator_index);
        self.validators
            .get_mut(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    pub fn get_effective_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.get_validator(validator_index)
            .map(|v| v.effective_balance)
    }

    pub fn get_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.balances
            .get(validator_index)
            .copied()
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    /// Mutable access to one balance, recording the index as dirty in the
    /// tree-hash cache.
    pub fn get_balance_mut(&mut self, validator_index: usize) -> Result<&mut u64, Error> {
        self.tree_hash_cache.mark_balance_dirty(validator_index);
        self.balances
            .get_mut(validator_index)
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    /// Append a validator and its balance, keeping `len(validators) ==
    /// len(balances)`.
    pub fn push_validator(&mut self, validator: Validator, balance: u64) -> Result<(), Error> {
        self.validators.push(validator)?;
        self.balances.push(balance)?;
        Ok(())
    }

    /// Returns the sorted indices of all validators active at `epoch`.
    pub fn get_active_validator_indices(&self, epoch: Epoch) -> Vec<usize> {
        get_active_validator_indices(self.validators(), epoch)
    }

    /// The number of deposits the eth1 chain has seen but this state has not
    /// yet processed.
    pub fn get_outstanding_deposit_len(&self) -> Result<u64, Error> {
        self.eth1_data()
            .deposit_count
            .checked_sub(self.eth1_deposit_index)
            .ok_or(Error::InvalidDepositState {
                deposit_count: self.eth1_data.deposit_count,
                deposit_index: self.eth1_deposit_index,
            })
    }

    /// Return the combined effective balance of a set of validators, with the
    /// spec's `EFFECTIVE_BALANCE_INCREMENT` floor.
    pub fn get_total_balance(&self, indices: &[usize], spec: &ChainSpec) -> Result<u64, Error> {
        let mut total = 0u64;
        for &index in indices {
            total.safe_add_assign(self.get_effective_balance(index)?)?;
        }
        Ok(std::cmp::max(total, spec.effective_balance_increment))
    }

    /// Return the combined effective balance of all active validators.
    pub fn get_total_active_balance(&self, spec: &ChainSpec) -> Result<u64, Error> {
        let indices = self.get_active_validator_indices(self.current_epoch());
        self.get_total_balance(&indices, spec)
    }

    /// Returns the validator churn limit for the current epoch.
    pub fn get_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        Ok(std::cmp::max(
            spec.min_per_epoch_churn_limit,
            (self
                .committee_cache(RelativeEpoch::Current)?
                .active_validator_count() as u64)
                .safe_div(spec.churn_limit_quotient)?,
        ))
    }

    /// Return the epoch at which an activation or exit triggered in `epoch`
    /// takes effect.
    pub fn compute_activation_exit_epoch(
        &self,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<Epoch, Error> {
        Ok(epoch.safe_add(1u64)?.safe_add(spec.max_seed_lookahead)?)
    }

    /*
     * Block and state roots.
     */

    /// Safely obtains the index for `block_roots`/`state_roots`, given some
    /// `slot`.
    fn get_latest_roots_index(&self, slot: Slot) -> Result<usize, Error> {
        if slot < self.slot && self.slot <= slot + T::slots_per_historical_root() as u64 {
            Ok(slot.as_usize().safe_rem(T::slots_per_historical_root())?)
        } else {
            Err(Error::SlotOutOfBounds)
        }
    }

    /// Return the block root at a recent `slot`.
    pub fn get_block_root(&self, slot: Slot) -> Result<&Hash256, Error> {
        let i = self.get_latest_roots_index(slot)?;
        self.block_roots.get(i).ok_or(Error::SlotOutOfBounds)
    }

    /// Return the block root at a recent `epoch`'s start slot.
    pub fn get_block_root_at_epoch(&self, epoch: Epoch) -> Result<&Hash256, Error> {
        self.get_block_root(epoch.start_slot(T::slots_per_epoch()))
    }

    pub fn set_block_root(&mut self, slot: Slot, block_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_roots_index(slot)?;
        *self.block_roots.get_mut(i).ok_or(Error::SlotOutOfBounds)? = block_root;
        Ok(())
    }

    pub fn get_state_root(&self, slot: Slot) -> Result<&Hash256, Error> {
        let i = self.get_latest_roots_index(slot)?;
        self.state_roots.get(i).ok_or(Error::SlotOutOfBounds)
    }

    pub fn set_state_root(&mut self, slot: Slot, state_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_roots_index(slot)?;
        *self.state_roots.get_mut(i).ok_or(Error::SlotOutOfBounds)? = state_root;
        Ok(())
    }

    /*
     * Randao.
     */

    /// Safely obtains the index for `randao_mixes`.
    fn get_randao_mix_index(
        &self,
        epoch: Epoch,
        allow_next_epoch: AllowNextEpoch,
    ) -> Result<usize, Error> {
        let current_epoch = self.current_epoch();
        let len = T::EpochsPerHistoricalVector::to_u64();

        if current_epoch < epoch.safe_add(len)?
            && epoch <= allow_next_epoch.upper_bound_of(current_epoch)?
        {
            Ok(epoch.as_usize().safe_rem(len as usize)?)
        } else {
            Err(Error::EpochOutOfBounds)
        }
    }

    /// Return the randao mix at a recent `epoch`.
    pub fn get_randao_mix(&self, epoch: Epoch) -> Result<&Hash256, Error> {
        let i = self.get_randao_mix_index(epoch, AllowNextEpoch::False)?;
        self.randao_mixes.get(i).ok_or(Error::RandaoMixOutOfBounds(i))
    }

    /// XOR-mixes the hash of the given `signature` into the current epoch's
    /// randao mix.
    pub fn update_randao_mix(&mut self, epoch: Epoch, signature: &Signature) -> Result<(), Error> {
        let i = epoch
            .as_usize()
            .safe_rem(T::epochs_per_historical_vector())?;

        let signature_hash = Hash256::from_slice(&hash(&signature.serialize()));
        let new_mix = *self.get_randao_mix(epoch)? ^ signature_hash;

        *self
            .randao_mixes
            .get_mut(i)
            .ok_or(Error::RandaoMixOutOfBounds(i))? = new_mix;

        Ok(())
    }

    /// Set the randao mix at a recent `epoch`. The next epoch is allowed: the
    /// epoch transition seeds it from the current mix.
    pub fn set_randao_mix(&mut self, epoch: Epoch, mix: Hash256) -> Result<(), Error> {
        let i = self.get_randao_mix_index(epoch, AllowNextEpoch::True)?;
        *self
            .randao_mixes
            .get_mut(i)
            .ok_or(Error::RandaoMixOutOfBounds(i))? = mix;
        Ok(())
    }

    /// Fill every randao mix with `mix`; used at genesis.
    pub fn fill_randao_mixes_with(&mut self, mix: Hash256) {
        self.randao_mixes = FixedVector::from_elem(mix);
    }

    /*
     * Slashings.
     */

    /// Safely obtain the index for `slashings`, given some `epoch`.
    fn get_slashings_index(
        &self,
        epoch: Epoch,
        allow_next_epoch: AllowNextEpoch,
    ) -> Result<usize, Error> {
        // We allow the slashings vector to be accessed at any cached epoch at
        // or before the current epoch, or the next epoch if
        // `AllowNextEpoch::True` is passed.
        let current_epoch = self.current_epoch();
        if current_epoch < epoch.safe_add(T::EpochsPerSlashingsVector::to_u64())?
            && epoch <= allow_next_epoch.upper_bound_of(current_epoch)?
        {
            Ok(epoch
                .as_usize()
                .safe_rem(T::EpochsPerSlashingsVector::to_usize())?)
        } else {
            Err(Error::EpochOutOfBounds)
        }
    }

    /// Get the total slashed balances for some epoch.
    pub fn get_slashings_at(&self, epoch: Epoch) -> Result<u64, Error> {
        let i = self.get_slashings_index(epoch, AllowNextEpoch::False)?;
        self.slashings
            .get(i)
            .copied()
            .ok_or(Error::EpochOutOfBounds)
    }

    /// Set the total slashed balances for some epoch.
    pub fn set_slashings(&mut self, epoch: Epoch, value: u64) -> Result<(), Error> {
        let i = self.get_slashings_index(epoch, AllowNextEpoch::True)?;
        *self.slashings.get_mut(i).ok_or(Error::EpochOutOfBounds)? = value;
        Ok(())
    }

    /// Add to the total slashed balances for some epoch.
    pub fn increase_slashings(&mut self, epoch: Epoch, delta: u64) -> Result<(), Error> {
        let i = self.get_slashings_index(epoch, AllowNextEpoch::False)?;
        self.slashings
            .get_mut(i)
            .ok_or(Error::EpochOutOfBounds)?
            .safe_add_assign(delta)?;
        Ok(())
    }

    /*
     * Seeds and proposers.
     */

    /// Generate a seed for the given `epoch` and `domain`.
    pub fn get_seed(
        &self,
        epoch: Epoch,
        domain_type: Domain,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        // Bypass the safe getter for the randao mix: the seed for epoch N
        // mixes in the randao of epoch `N - MIN_SEED_LOOKAHEAD - 1`, which
        // lies outside the window `get_randao_mix` allows during the epochs
        // immediately after genesis.
        let mix = {
            let i = epoch
                .safe_add(T::EpochsPerHistoricalVector::to_u64())?
                .safe_sub(spec.min_seed_lookahead)?
                .safe_sub(1u64)?;
            let i_mod = i.as_usize().safe_rem(T::epochs_per_historical_vector())?;
            self.randao_mixes
                .get(i_mod)
                .ok_or(Error::RandaoMixOutOfBounds(i_mod))?
        };

        let mut preimage = [0; 4 + 8 + 32];
        preimage[0..4].copy_from_slice(&int_to_bytes4(spec.get_domain_constant(domain_type)));
        preimage[4..12].copy_from_slice(&int_to_bytes8(epoch.as_u64()));
        preimage[12..].copy_from_slice(mix.as_bytes());

        Ok(Hash256::from_slice(&hash(&preimage)))
    }

    /// Returns the beacon proposer index for the `slot` in `self.current_epoch()`.
    pub fn get_beacon_proposer_index(&self, slot: Slot, spec: &ChainSpec) -> Result<usize, Error> {
        let epoch = slot.epoch(T::slots_per_epoch());
        let seed = self.get_beacon_proposer_seed(slot, spec)?;
        let indices = self.get_active_validator_indices(epoch);
        self.compute_proposer_index(&indices, &seed, spec)
    }

    /// Returns the proposer index for every slot of the current epoch.
    ///
    /// The active-indices computation is shared across the slots, making this
    /// noticeably cheaper than `SLOTS_PER_EPOCH` separate lookups.
    pub fn get_beacon_proposer_indices(&self, spec: &ChainSpec) -> Result<Vec<usize>, Error> {
        let indices = self.get_active_validator_indices(self.current_epoch());

        self.current_epoch()
            .slot_iter(T::slots_per_epoch())
            .map(|slot| {
                let seed = self.get_beacon_proposer_seed(slot, spec)?;
                self.compute_proposer_index(&indices, &seed, spec)
            })
            .collect()
    }

    /// Compute the seed to determine the proposer for `slot`.
    fn get_beacon_proposer_seed(&self, slot: Slot, spec: &ChainSpec) -> Result<Vec<u8>, Error> {
        let epoch = slot.epoch(T::slots_per_epoch());
        let mut preimage = self
            .get_seed(epoch, Domain::BeaconProposer, spec)?
            .as_bytes()
            .to_vec();
        preimage.append(&mut int_to_bytes8(slot.as_u64()));
        Ok(hash(&preimage))
    }

    /// Walk effective-balance-weighted candidates from the shuffled active
    /// set until one is accepted.
    fn compute_proposer_index(
        &self,
        indices: &[usize],
        seed: &[u8],
        spec: &ChainSpec,
    ) -> Result<usize, Error> {
        if indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let mut i = 0u64;
        loop {
            if i >= MAX_PROPOSER_SELECTION_ROUNDS {
                return Err(Error::UnableToSelectProposer);
            }

            let shuffled_index = swap_or_not_shuffle::compute_shuffled_index(
                i.safe_rem(indices.len() as u64)? as usize,
                indices.len(),
                seed,
                spec.shuffle_round_count,
            )
            .ok_or(Error::UnableToShuffle)?;

            let candidate_index = *indices
                .get(shuffled_index)
                .ok_or(Error::ShuffleIndexOutOfBounds(shuffled_index))?;

            let random_byte = {
                let mut preimage = seed.to_vec();
                preimage.append(&mut int_to_bytes8(i.safe_div(32)?));
                let hash = hash(&preimage);
                hash[i.safe_rem(32)? as usize]
            };

            let effective_balance = self.get_effective_balance(candidate_index)?;

            if effective_balance.safe_mul(MAX_RANDOM_BYTE)?
                >= spec
                    .max_effective_balance
                    .safe_mul(u64::from(random_byte))?
            {
                return Ok(candidate_index);
            }

            i.safe_add_assign(1)?;
        }
    }

    /// The block root the proposer shuffling for the current epoch was
    /// decided at: the end-slot of `current_epoch - 1 - MIN_SEED_LOOKAHEAD`.
    ///
    /// Returns `Hash256::zero()` when that slot precedes what the state can
    /// see (the epochs right after genesis); callers treat a zero root as
    /// "no cache key" and skip caching.
    pub fn proposer_shuffling_decision_root(&self, spec: &ChainSpec) -> Result<Hash256, Error> {
        let lookahead = spec.min_seed_lookahead.safe_add(1u64)?;
        if self.current_epoch() < lookahead {
            return Ok(Hash256::zero());
        }

        let decision_slot = self
            .current_epoch()
            .safe_sub(lookahead)?
            .end_slot(T::slots_per_epoch());

        if decision_slot >= self.slot {
            Ok(Hash256::zero())
        } else {
            Ok(*self.get_block_root(decision_slot)?)
        }
    }

    /*
     * Domains.
     */

    /// Return the signature domain (fork version concatenated with domain
    /// type) of a message.
    pub fn get_domain(
        &self,
        epoch: Epoch,
        domain: Domain,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        Ok(spec.get_domain(epoch, domain, &self.fork, self.genesis_validators_root))
    }

    /*
     * Committees.
     */

    /// Get the committee cache for some `RelativeEpoch`, erroring if the
    /// cache is not initialized for that epoch.
    pub fn committee_cache(
        &self,
        relative_epoch: RelativeEpoch,
    ) -> Result<&Arc<CommitteeCache>, Error> {
        let i = Self::committee_cache_index(relative_epoch);
        let cache = &self.committee_caches[i];

        if cache.is_initialized_at(relative_epoch.into_epoch(self.current_epoch())) {
            Ok(cache)
        } else {
            Err(Error::CommitteeCacheUninitialized(Some(relative_epoch)))
        }
    }

    fn committee_cache_index(relative_epoch: RelativeEpoch) -> usize {
        match relative_epoch {
            RelativeEpoch::Previous => 0,
            RelativeEpoch::Current => 1,
            RelativeEpoch::Next => 2,
        }
    }

    /// Get the committee cache for the epoch of the given `slot`, which must
    /// lie in the previous, current or next epoch.
    fn committee_cache_at_slot(&self, slot: Slot) -> Result<&Arc<CommitteeCache>, Error> {
        let relative_epoch =
            RelativeEpoch::from_slot(self.slot, slot, T::slots_per_epoch())?;
        self.committee_cache(relative_epoch)
    }

    /// Returns the number of committees at `slot`.
    pub fn get_committee_count_at_slot(&self, slot: Slot) -> Result<u64, Error> {
        Ok(self.committee_cache_at_slot(slot)?.committees_per_slot())
    }

    /// Returns the beacon committee for `slot` and `index`.
    pub fn get_beacon_committee(
        &self,
        slot: Slot,
        index: CommitteeIndex,
    ) -> Result<BeaconCommittee, Error> {
        self.committee_cache_at_slot(slot)?
            .get_beacon_committee(slot, index)
            .ok_or(Error::NoCommittee { slot, index })
    }

    /// Returns all the beacon committees at `slot`.
    pub fn get_beacon_committees_at_slot(&self, slot: Slot) -> Result<Vec<BeaconCommittee>, Error> {
        self.committee_cache_at_slot(slot)?
            .get_beacon_committees_at_slot(slot)
    }

    /// Returns the attestation duty of `validator_index` in the epoch of the
    /// given `relative_epoch`, if it has one.
    pub fn get_attestation_duty(
        &self,
        validator_index: usize,
        relative_epoch: RelativeEpoch,
    ) -> Result<Option<AttestationDuty>, Error> {
        Ok(self
            .committee_cache(relative_epoch)?
            .get_attestation_duty(validator_index))
    }

    /// Build an epoch cache, unless it is has already been built.
    pub fn build_committee_cache(
        &mut self,
        relative_epoch: RelativeEpoch,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let i = Self::committee_cache_index(relative_epoch);
        let epoch = relative_epoch.into_epoch(self.current_epoch());

        if !self.committee_caches[i].is_initialized_at(epoch) {
            self.committee_caches[i] = Arc::new(CommitteeCache::initialized(self, epoch, spec)?);
        }

        Ok(())
    }

    /// Build all three committee caches.
    pub fn build_all_committee_caches(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        self.build_committee_cache(RelativeEpoch::Previous, spec)?;
        self.build_committee_cache(RelativeEpoch::Current, spec)?;
        self.build_committee_cache(RelativeEpoch::Next, spec)?;
        Ok(())
    }

    /// Advance the committee caches to suit an epoch transition: the current
    /// caches shift down one position and the next-epoch cache resets.
    pub fn advance_caches(&mut self) {
        self.committee_caches.rotate_left(1);
        self.committee_caches[Self::committee_cache_index(RelativeEpoch::Next)] =
            Arc::new(CommitteeCache::default());
    }

    /*
     * Pubkey cache.
     */

    /// Updates the pubkey cache, if required.
    ///
    /// Adds all un-cached pubkeys from the state's validator registry.
    pub fn update_pubkey_cache(&mut self) -> Result<(), Error> {
        for (i, validator) in self
            .validators
            .iter()
            .enumerate()
            .skip(self.pubkey_cache.len())
        {
            if !self.pubkey_cache.insert(validator.pubkey, i) {
                return Err(Error::PubkeyCacheInconsistent);
            }
        }

        Ok(())
    }

    /// If a validator with `pubkey` is known to the state, returns its
    /// registry index.
    ///
    /// Requires a fully up-to-date pubkey cache.
    pub fn get_validator_index(&self, pubkey: &PublicKeyBytes) -> Result<Option<usize>, Error> {
        if self.pubkey_cache.len() != self.validators.len() {
            return Err(Error::PubkeyCacheInconsistent);
        }
        Ok(self.pubkey_cache.get(pubkey))
    }

    pub fn pubkey_cache(&self) -> &PubkeyCache {
        &self.pubkey_cache
    }

    /*
     * Exit cache.
     */

    /// Build the exit cache, if it needs to be built.
    pub fn build_exit_cache(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        if self.exit_cache.check_initialized().is_err() {
            self.exit_cache = ExitCache::new(self.validators(), spec)?;
        }
        Ok(())
    }

    pub fn exit_cache(&self) -> &ExitCache {
        &self.exit_cache
    }

    pub fn exit_cache_mut(&mut self) -> &mut ExitCache {
        &mut self.exit_cache
    }

    /*
     * Tree hash cache and roots.
     */

    /// Compute the state root, re-hashing only the subtrees above leaves that
    /// changed since the previous call.
    pub fn update_tree_hash_cache(&mut self) -> Result<Hash256, Error> {
        let mut inner = match self.tree_hash_cache.take() {
            Some(inner) => inner,
            None => BeaconTreeHashCacheInner::new(self),
        };

        let result = inner.recalculate_tree_hash_root(self);
        self.tree_hash_cache.restore(inner);
        result
    }

    /// Compute the state root from scratch, ignoring (and not updating) any
    /// caches.
    ///
    /// This is the reference implementation the incremental cache is tested
    /// against; production code paths use `update_tree_hash_cache`.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }

    /// Build every cache on the state.
    pub fn build_caches(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        self.build_all_committee_caches(spec)?;
        self.update_pubkey_cache()?;
        self.build_exit_cache(spec)?;
        Ok(())
    }

    /// Drop every cache, yielding a state equivalent to a freshly-decoded
    /// one.
    pub fn drop_all_caches(&mut self) {
        self.committee_caches = [
            Arc::new(CommitteeCache::default()),
            Arc::new(CommitteeCache::default()),
            Arc::new(CommitteeCache::default()),
        ];
        self.pubkey_cache = PubkeyCache::default();
        self.exit_cache = ExitCache::default();
        self.tree_hash_cache = BeaconTreeHashCache::default();
    }

    /// Clone the state, selecting which caches travel with the clone.
    ///
    /// The spec fields are always cloned; that is cheap, since every big list
    /// shares its hash trie with the parent until one side writes.
    pub fn clone_with(&self, config: CloneConfig) -> Self {
        let mut state = self.clone();

        if !config.committee_caches {
            state.committee_caches = [
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
            ];
        }
        if !config.pubkey_cache {
            state.pubkey_cache = PubkeyCache::default();
        }
        if !config.exit_cache {
            state.exit_cache = ExitCache::default();
        }
        if !config.tree_hash_cache {
            state.tree_hash_cache = BeaconTreeHashCache::default();
        }

        state
    }
}

impl<T: EthSpec> BeaconState<T> {
    /// Find the attestation duty of `validator_index` in `epoch`, without
    /// mutating `self`.
    ///
    /// The epoch must be the previous, current or next epoch with its
    /// committee cache built; for epochs further ahead, advance a clone of
    /// the state first. (An earlier incarnation of this helper advanced
    /// `self` slot-by-slot as a side effect; callers now always receive an
    /// untouched state.)
    pub fn committee_assignment(
        &self,
        validator_index: usize,
        epoch: Epoch,
    ) -> Result<Option<AttestationDuty>, Error> {
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        self.get_attestation_duty(validator_index, relative_epoch)
    }
}

impl From<RelativeEpochError> for Error {
    fn from(e: RelativeEpochError) -> Error {
        Error::RelativeEpochError(e)
    }
}

impl From<cached_tree_hash::Error> for Error {
    fn from(e: cached_tree_hash::Error) -> Error {
        Error::CachedTreeHashError(e)
    }
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Error {
        Error::SszTypesError(e)
    }
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Error {
        Error::ArithError(e)
    }
}
