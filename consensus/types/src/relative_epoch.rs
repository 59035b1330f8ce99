use crate::{Epoch, Slot};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Error {
    EpochTooLow { base: Epoch, other: Epoch },
    EpochTooHigh { base: Epoch, other: Epoch },
}

/// Defines the epochs relative to some epoch. Most useful when referring to
/// the committee caches attached to a `BeaconState`, which are rotated rather
/// than recomputed as the state advances.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RelativeEpoch {
    /// The prior epoch.
    Previous,
    /// The current epoch.
    Current,
    /// The next epoch.
    Next,
}

impl RelativeEpoch {
    /// Returns the `epoch` that `self` refers to, with respect to the `base`
    /// epoch.
    pub fn into_epoch(self, base: Epoch) -> Epoch {
        match self {
            // Due to saturating nature of epoch, check for current first.
            RelativeEpoch::Current => base,
            RelativeEpoch::Previous => base.saturating_sub(1_u64),
            RelativeEpoch::Next => base.saturating_add(1_u64),
        }
    }

    /// Converts the `other` epoch into a `RelativeEpoch`, with respect to
    /// `base`.
    ///
    /// ## Errors
    ///
    /// - `EpochTooLow` when `other` is more than 1 prior to `base`.
    /// - `EpochTooHigh` when `other` is more than 1 after `base`.
    pub fn from_epoch(base: Epoch, other: Epoch) -> Result<Self, Error> {
        if other == base {
            Ok(RelativeEpoch::Current)
        } else if other.saturating_add(1_u64) == base {
            Ok(RelativeEpoch::Previous)
        } else if other == base.saturating_add(1_u64) {
            Ok(RelativeEpoch::Next)
        } else if other < base {
            Err(Error::EpochTooLow { base, other })
        } else {
            Err(Error::EpochTooHigh { base, other })
        }
    }

    /// Convenience function for `from_epoch` on the epochs of two slots.
    pub fn from_slot(base: Slot, other: Slot, slots_per_epoch: u64) -> Result<Self, Error> {
        Self::from_epoch(base.epoch(slots_per_epoch), other.epoch(slots_per_epoch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_epoch() {
        let base = Epoch::new(10);

        assert_eq!(RelativeEpoch::Current.into_epoch(base), base);
        assert_eq!(RelativeEpoch::Previous.into_epoch(base), base - 1_u64);
        assert_eq!(RelativeEpoch::Next.into_epoch(base), base + 1_u64);
    }

    #[test]
    fn from_epoch() {
        let base = Epoch::new(10);

        assert_eq!(
            RelativeEpoch::from_epoch(base, base - 1_u64),
            Ok(RelativeEpoch::Previous)
        );
        assert_eq!(
            RelativeEpoch::from_epoch(base, base),
            Ok(RelativeEpoch::Current)
        );
        assert_eq!(
            RelativeEpoch::from_epoch(base, base + 1_u64),
            Ok(RelativeEpoch::Next)
        );
        assert_eq!(
            RelativeEpoch::from_epoch(base, base - 2_u64),
            Err(Error::EpochTooLow {
                base,
                other: base - 2_u64
            })
        );
        assert_eq!(
            RelativeEpoch::from_epoch(base, base + 2_u64),
            Err(Error::EpochTooHigh {
                base,
                other: base + 2_u64
            })
        );
    }
}
