use crate::{BeaconState, ChainSpec, CommitteeIndex, Domain, Epoch, EthSpec, Slot};
use serde_derive::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::ops::Range;
use swap_or_not_shuffle::shuffle_list;

use super::Error;

/// A subset of the active validators, attesting to one `(slot, index)` pair.
#[derive(Debug, PartialEq, Clone)]
pub struct BeaconCommittee<'a> {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub committee: &'a [usize],
}

/// One validator's attestation assignment within an epoch.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct AttestationDuty {
    /// The slot during which the attester must attest.
    pub slot: Slot,
    /// The index of this committee within the committees in `slot`.
    pub index: CommitteeIndex,
    /// The position of the attester within the committee.
    pub committee_position: usize,
    /// The total number of attesters in the committee.
    pub committee_len: usize,
}

/// Computes and stores the shuffling for an epoch. Provides various getters to
/// allow callers to read the committees for the given epoch.
///
/// The shuffling is computed exactly once per epoch (the `shuffle_list`
/// whole-list unshuffle) and every committee lookup afterwards is a slice into
/// it.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct CommitteeCache {
    initialized_epoch: Option<Epoch>,
    shuffling: Vec<usize>,
    shuffling_positions: Vec<Option<NonZeroUsize>>,
    committees_per_slot: u64,
    slots_per_epoch: u64,
}

impl CommitteeCache {
    /// Return a new, fully initialized cache.
    pub fn initialized<T: EthSpec>(
        state: &BeaconState<T>,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<CommitteeCache, Error> {
        // The use of `NonZeroUsize` reduces the maximum number of possible
        // validators by one.
        if state.validators().len() == usize::max_value() {
            return Err(Error::TooManyValidators);
        }

        let active_validator_indices = get_active_validator_indices(state.validators(), epoch);

        if active_validator_indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let committees_per_slot =
            T::get_committee_count_per_slot(active_validator_indices.len(), spec)? as u64;

        let seed = state.get_seed(epoch, Domain::BeaconAttester, spec)?;

        let shuffling = shuffle_list(
            active_validator_indices,
            spec.shuffle_round_count,
            &seed[..],
            false,
        )
        .ok_or(Error::UnableToShuffle)?;

        let mut shuffling_positions = vec![None; state.validators().len()];
        for (i, &v) in shuffling.iter().enumerate() {
            *shuffling_positions
                .get_mut(v)
                .ok_or(Error::ShuffleIndexOutOfBounds(v))? = NonZeroUsize::new(i + 1);
        }

        Ok(CommitteeCache {
            initialized_epoch: Some(epoch),
            shuffling,
            shuffling_positions,
            committees_per_slot,
            slots_per_epoch: T::slots_per_epoch(),
        })
    }

    /// Returns `true` if the cache has been initialized at the supplied
    /// `epoch`.
    ///
    /// An non-initialized cache does not provide any useful information.
    pub fn is_initialized_at(&self, epoch: Epoch) -> bool {
        Some(epoch) == self.initialized_epoch
    }

    /// Returns the shuffled list of active validator indices for the
    /// initialized epoch.
    ///
    /// Always returns `&[]` for a non-initialized epoch.
    pub fn shuffling(&self) -> &[usize] {
        &self.shuffling
    }

    /// Returns the committee for `slot` and `index`.
    ///
    /// Returns `None` if the cache is not initialized for the epoch of
    /// `slot`, or if `index` is out of range.
    pub fn get_beacon_committee(&self, slot: Slot, index: CommitteeIndex) -> Option<BeaconCommittee> {
        if self.initialized_epoch.is_none()
            || !self.is_initialized_at(slot.epoch(self.slots_per_epoch))
            || index >= self.committees_per_slot
        {
            return None;
        }

        let committee_index = (slot.as_u64() % self.slots_per_epoch)
            .checked_mul(self.committees_per_slot)?
            .checked_add(index)?;
        let committee = self.compute_committee(committee_index as usize)?;

        Some(BeaconCommittee {
            slot,
            index,
            committee,
        })
    }

    /// Get all the beacon committees at a single slot.
    pub fn get_beacon_committees_at_slot(&self, slot: Slot) -> Result<Vec<BeaconCommittee>, Error> {
        if self.initialized_epoch.is_none() {
            return Err(Error::CommitteeCacheUninitialized(None));
        }

        (0..self.committees_per_slot)
            .map(|index| {
                self.get_beacon_committee(slot, index)
                    .ok_or(Error::NoCommittee { slot, index })
            })
            .collect()
    }

    /// Returns the number of active validators in the initialized epoch.
    ///
    /// Always returns `usize::default()` for a non-initialized epoch.
    pub fn active_validator_count(&self) -> usize {
        self.shuffling.len()
    }

    /// Returns the total number of committees in the initialized epoch.
    ///
    /// Always returns `usize::default()` for a non-initialized epoch.
    pub fn epoch_committee_count(&self) -> usize {
        epoch_committee_count(
            self.committees_per_slot as usize,
            self.slots_per_epoch as usize,
        )
    }

    /// Returns the number of committees per slot for this cache's epoch.
    pub fn committees_per_slot(&self) -> u64 {
        self.committees_per_slot
    }

    /// Returns a slice of `self.shuffling` that represents the `index`'th
    /// committee in the epoch.
    fn compute_committee(&self, index: usize) -> Option<&[usize]> {
        Some(&self.shuffling[self.compute_committee_range(index)?])
    }

    /// Returns a range of `self.shuffling` that represents the `index`'th
    /// committee in the epoch.
    ///
    /// To avoid a divide-by-zero, returns `None` if `self.committee_count` is
    /// zero.
    ///
    /// Will also return `None` if the index is out of bounds. Ties between
    /// committee sizes are broken by the integer-floor division, exactly as
    /// `compute_committee` in the consensus spec.
    fn compute_committee_range(&self, index: usize) -> Option<Range<usize>> {
        compute_committee_range_in_epoch(self.epoch_committee_count(), index, self.shuffling.len())
    }

    /// Returns the index of some validator in `self.shuffling`.
    ///
    /// Always returns `None` for a non-initialized epoch.
    pub fn shuffled_position(&self, validator_index: usize) -> Option<usize> {
        self.shuffling_positions
            .get(validator_index)?
            .map(|p| p.get() - 1)
    }

    /// Returns the attestation duty of `validator_index`, if it is a member
    /// of any committee in the initialized epoch.
    pub fn get_attestation_duty(&self, validator_index: usize) -> Option<AttestationDuty> {
        let initialized_epoch = self.initialized_epoch?;
        let position = self.shuffled_position(validator_index)?;

        (0..self.epoch_committee_count()).find_map(|nth| {
            let range = self.compute_committee_range(nth)?;
            if !range.contains(&position) {
                return None;
            }

            let slot = initialized_epoch
                .start_slot(self.slots_per_epoch)
                .saturating_add(nth as u64 / self.committees_per_slot);
            Some(AttestationDuty {
                slot,
                index: nth as u64 % self.committees_per_slot,
                committee_position: position - range.start,
                committee_len: range.len(),
            })
        })
    }
}

/// Computes the position of the given `committee_index` with respect to all
/// committees in the epoch.
///
/// The return result may be used to slice the shuffled indices of the epoch,
/// yielding the validators in the given committee.
pub fn compute_committee_range_in_epoch(
    epoch_committee_count: usize,
    index_in_epoch: usize,
    shuffling_len: usize,
) -> Option<Range<usize>> {
    if epoch_committee_count == 0 || index_in_epoch >= epoch_committee_count {
        return None;
    }

    let start = (shuffling_len * index_in_epoch) / epoch_committee_count;
    let end = (shuffling_len * (index_in_epoch + 1)) / epoch_committee_count;

    Some(start..end)
}

/// Returns the total number of committees in an epoch.
pub fn epoch_committee_count(committees_per_slot: usize, slots_per_epoch: usize) -> usize {
    committees_per_slot * slots_per_epoch
}

/// Returns a list of all `validators` indices where the validator is active
/// at the given `epoch`.
pub fn get_active_validator_indices(validators: &[crate::Validator], epoch: Epoch) -> Vec<usize> {
    let mut active = Vec::with_capacity(validators.len());

    for (index, validator) in validators.iter().enumerate() {
        if validator.is_active_at(epoch) {
            active.push(index)
        }
    }

    active.shrink_to_fit();

    active
}
