use crate::PublicKeyBytes;
use std::collections::HashMap;
use std::sync::Arc;

type ValidatorIndex = usize;

/// A map from validator public key to registry index, kept in lock-step with
/// the state's validator list.
///
/// The backing map is behind an `Arc` so that cloning a state shares it;
/// the first insertion after a clone forks the map (copy-on-write).
#[derive(Debug, PartialEq, Clone, Default)]
pub struct PubkeyCache {
    /// Maintain the number of keys added to the map. It is not sufficient to
    /// count the map because the registry may contain duplicate keys.
    len: usize,
    map: Arc<HashMap<PublicKeyBytes, ValidatorIndex>>,
}

impl PubkeyCache {
    /// Returns the number of validator indices added to the map so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a validator index into the map.
    ///
    /// The added index must equal the number of validators already added to
    /// the map. This ensures that an index is never skipped.
    pub fn insert(&mut self, pubkey: PublicKeyBytes, index: ValidatorIndex) -> bool {
        if index == self.len {
            Arc::make_mut(&mut self.map).insert(pubkey, index);
            self.len = self
                .len
                .checked_add(1)
                .expect("map length cannot exceed usize");
            true
        } else {
            false
        }
    }

    /// Looks up a validator index's by their public key.
    pub fn get(&self, pubkey: &PublicKeyBytes) -> Option<ValidatorIndex> {
        self.map.get(pubkey).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubkey(i: u64) -> PublicKeyBytes {
        let mut bytes = [0; 48];
        bytes[0..8].copy_from_slice(&i.to_le_bytes());
        PublicKeyBytes::deserialize(&bytes).unwrap()
    }

    #[test]
    fn rejects_out_of_order_insertion() {
        let mut cache = PubkeyCache::default();

        assert!(cache.insert(pubkey(0), 0));
        assert!(!cache.insert(pubkey(1), 2));
        assert!(cache.insert(pubkey(1), 1));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.get(&pubkey(0)), Some(0));
        assert_eq!(cache.get(&pubkey(1)), Some(1));
        assert_eq!(cache.get(&pubkey(9)), None);
    }

    #[test]
    fn clones_share_until_write() {
        let mut cache = PubkeyCache::default();
        cache.insert(pubkey(0), 0);

        let snapshot = cache.clone();
        cache.insert(pubkey(1), 1);

        // The fork is invisible to the clone.
        assert_eq!(snapshot.get(&pubkey(1)), None);
        assert_eq!(cache.get(&pubkey(1)), Some(1));
    }
}
