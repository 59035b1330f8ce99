//! A read-side façade over the canonical head and finality checkpoints.
//!
//! The head is *set* by the fork-choice driver, never by the state-transition
//! functions; everything here is accessors for the many tasks that need a
//! consistent view of "where the chain is". Every returned object is copied
//! out from under the lock, so the head can move behind a reader's back
//! without aliasing.

use crate::{BeaconChainError, BeaconDb, BeaconSnapshot, ForkChoiceStore, StateGen};
use parking_lot::RwLock;
use slog::{debug, Logger};
use types::{
    BeaconState, ChainSpec, Checkpoint, Domain, Epoch, Eth1Data, EthSpec, Fork, Hash256,
    SignedBeaconBlock, Slot,
};

struct ChainInfoInner<E: EthSpec> {
    head: Option<BeaconSnapshot<E>>,
    finalized_checkpoint: Option<Checkpoint>,
    current_justified_checkpoint: Option<Checkpoint>,
    previous_justified_checkpoint: Option<Checkpoint>,
    genesis_time: u64,
}

/// See the module-level documentation.
pub struct ChainInfo<E: EthSpec, Db, Sg, Fc> {
    inner: RwLock<ChainInfoInner<E>>,
    db: Db,
    state_gen: Sg,
    fork_choice: Fc,
    spec: ChainSpec,
    log: Logger,
}

impl<E, Db, Sg, Fc> ChainInfo<E, Db, Sg, Fc>
where
    E: EthSpec,
    Db: BeaconDb<E>,
    Sg: StateGen<E>,
    Fc: ForkChoiceStore,
{
    pub fn new(db: Db, state_gen: Sg, fork_choice: Fc, spec: ChainSpec, log: Logger) -> Self {
        Self {
            inner: RwLock::new(ChainInfoInner {
                head: None,
                finalized_checkpoint: None,
                current_justified_checkpoint: None,
                previous_justified_checkpoint: None,
                genesis_time: 0,
            }),
            db,
            state_gen,
            fork_choice,
            spec,
            log,
        }
    }

    /*
     * Write side, driven by fork choice.
     */

    /// Install a new canonical head and the checkpoints that accompany it.
    pub fn update_head(&self, snapshot: BeaconSnapshot<E>) {
        let mut inner = self.inner.write();
        inner.genesis_time = snapshot.beacon_state.genesis_time();
        inner.finalized_checkpoint = Some(snapshot.beacon_state.finalized_checkpoint());
        inner.current_justified_checkpoint =
            Some(snapshot.beacon_state.current_justified_checkpoint());
        inner.previous_justified_checkpoint =
            Some(snapshot.beacon_state.previous_justified_checkpoint());
        inner.head = Some(snapshot);
    }

    /*
     * Head accessors.
     *
     * All are nil-tolerant: before the first head is installed they return
     * zero-valued defaults rather than erroring, since read-side callers
     * handle "no chain yet" uniformly that way.
     */

    pub fn head_slot(&self) -> Slot {
        self.inner
            .read()
            .head
            .as_ref()
            .map(|head| head.beacon_block.slot())
            .unwrap_or_else(|| Slot::new(0))
    }

    pub fn head_root(&self) -> Hash256 {
        self.inner
            .read()
            .head
            .as_ref()
            .map(|head| head.beacon_block_root)
            .unwrap_or_else(Hash256::zero)
    }

    /// The head block, falling through to the database when no in-memory
    /// head exists.
    pub fn head_block(&self) -> Option<SignedBeaconBlock<E>> {
        let from_memory = self
            .inner
            .read()
            .head
            .as_ref()
            .map(|head| head.beacon_block.clone());

        from_memory.or_else(|| self.db.head_block())
    }

    /// The head state, falling through to the state-regeneration service
    /// when no in-memory head exists.
    pub fn head_state(&self) -> Result<BeaconState<E>, BeaconChainError> {
        let (state, state_root) = {
            let inner = self.inner.read();
            match inner.head.as_ref() {
                Some(head) => (Some(head.beacon_state.clone()), head.beacon_state_root),
                None => (None, Hash256::zero()),
            }
        };

        if let Some(state) = state {
            return Ok(state);
        }

        debug!(
            self.log,
            "Falling through to the state store for the head state";
            "state_root" => ?state_root,
        );
        self.state_gen
            .state_by_root(state_root)
            .ok_or(BeaconChainError::HeadStateUnavailable)
    }

    /*
     * Checkpoints.
     */

    pub fn finalized_checkpt(&self) -> Checkpoint {
        self.inner
            .read()
            .finalized_checkpoint
            .unwrap_or_default()
    }

    pub fn current_justified_checkpt(&self) -> Checkpoint {
        self.inner
            .read()
            .current_justified_checkpoint
            .unwrap_or_default()
    }

    pub fn previous_justified_checkpt(&self) -> Checkpoint {
        self.inner
            .read()
            .previous_justified_checkpoint
            .unwrap_or_default()
    }

    /// Returns `true` if the block with this root is finalized or reported
    /// canonical by the fork choice.
    pub fn is_canonical(&self, block_root: Hash256) -> bool {
        self.db.is_finalized_block(block_root) || self.fork_choice.is_canonical(block_root)
    }

    /*
     * Values derived from the head state, under the read lock.
     */

    /// The indices of validators active in `epoch`, per the head state.
    pub fn head_validator_indices(&self, epoch: Epoch) -> Vec<usize> {
        self.inner
            .read()
            .head
            .as_ref()
            .map(|head| head.beacon_state.get_active_validator_indices(epoch))
            .unwrap_or_default()
    }

    /// The attester seed for `epoch`, per the head state.
    pub fn head_seed(&self, epoch: Epoch) -> Result<Hash256, BeaconChainError> {
        self.inner
            .read()
            .head
            .as_ref()
            .map(|head| {
                head.beacon_state
                    .get_seed(epoch, Domain::BeaconAttester, &self.spec)
                    .map_err(Into::into)
            })
            .unwrap_or_else(|| Ok(Hash256::zero()))
    }

    pub fn head_eth1_data(&self) -> Eth1Data {
        self.inner
            .read()
            .head
            .as_ref()
            .map(|head| head.beacon_state.eth1_data().clone())
            .unwrap_or_default()
    }

    pub fn current_fork(&self) -> Fork {
        self.inner
            .read()
            .head
            .as_ref()
            .map(|head| *head.beacon_state.fork())
            .unwrap_or_default()
    }

    pub fn genesis_time(&self) -> u64 {
        self.inner.read().genesis_time
    }

    /// Passthrough to the fork-choice store, for introspection.
    pub fn proto_array_store(&self) -> Fc::Snapshot {
        self.fork_choice.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use types::test_utils::TestingBeaconStateBuilder;
    use types::{MinimalEthSpec, Signature};

    type E = MinimalEthSpec;

    #[derive(Default)]
    struct NullDb {
        finalized: HashSet<Hash256>,
    }

    impl BeaconDb<E> for NullDb {
        fn head_block(&self) -> Option<SignedBeaconBlock<E>> {
            None
        }
        fn is_finalized_block(&self, block_root: Hash256) -> bool {
            self.finalized.contains(&block_root)
        }
    }

    #[derive(Default)]
    struct NullStateGen;

    impl StateGen<E> for NullStateGen {
        fn state_by_root(&self, _state_root: Hash256) -> Option<BeaconState<E>> {
            None
        }
    }

    struct StaticForkChoice {
        canonical: HashSet<Hash256>,
    }

    impl ForkChoiceStore for StaticForkChoice {
        type Snapshot = usize;

        fn is_canonical(&self, block_root: Hash256) -> bool {
            self.canonical.contains(&block_root)
        }

        fn store(&self) -> usize {
            self.canonical.len()
        }
    }

    fn null_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn chain_info(
        finalized: HashSet<Hash256>,
        canonical: HashSet<Hash256>,
    ) -> ChainInfo<E, NullDb, NullStateGen, StaticForkChoice> {
        ChainInfo::new(
            NullDb { finalized },
            NullStateGen,
            StaticForkChoice { canonical },
            E::default_spec(),
            null_logger(),
        )
    }

    #[test]
    fn nil_head_returns_defaults() {
        let info = chain_info(HashSet::new(), HashSet::new());

        assert_eq!(info.head_slot(), Slot::new(0));
        assert_eq!(info.head_root(), Hash256::zero());
        assert_eq!(info.finalized_checkpt(), Checkpoint::default());
        assert_eq!(info.current_justified_checkpt(), Checkpoint::default());
        assert_eq!(info.previous_justified_checkpt(), Checkpoint::default());
        assert!(info.head_block().is_none());
        assert!(matches!(
            info.head_state(),
            Err(BeaconChainError::HeadStateUnavailable)
        ));
    }

    #[test]
    fn installed_head_is_visible_and_copied() {
        let spec = E::default_spec();
        let mut builder = TestingBeaconStateBuilder::<E>::from_deterministic_keypairs(8, &spec);
        builder.build_caches(&spec);
        let (mut state, _) = builder.build();

        let block = SignedBeaconBlock {
            message: types::BeaconBlock::empty(&spec),
            signature: Signature::empty(),
        };
        let block_root = block.canonical_root();
        let state_root = state.update_tree_hash_cache().unwrap();

        let info = chain_info(HashSet::new(), HashSet::new());
        info.update_head(BeaconSnapshot {
            beacon_block: block,
            beacon_block_root: block_root,
            beacon_state: state.clone(),
            beacon_state_root: state_root,
        });

        assert_eq!(info.head_root(), block_root);
        assert_eq!(info.genesis_time(), state.genesis_time());

        // The returned state is the reader's own: mutating it does not
        // affect the head.
        let mut reader_state = info.head_state().unwrap();
        *reader_state.slot_mut() = Slot::new(99);
        assert_eq!(info.head_state().unwrap().slot(), state.slot());

        // Head-derived accessors.
        assert_eq!(
            info.head_validator_indices(state.current_epoch()).len(),
            8
        );
        assert_eq!(info.head_eth1_data(), state.eth1_data().clone());
        assert_eq!(info.current_fork(), *state.fork());
        assert!(!info.head_seed(state.current_epoch()).unwrap().is_zero());
    }

    #[test]
    fn canonicality_is_finalized_or_fork_choice() {
        let finalized = Hash256::from_low_u64_be(1);
        let canonical = Hash256::from_low_u64_be(2);
        let unknown = Hash256::from_low_u64_be(3);

        let info = chain_info(
            [finalized].into_iter().collect(),
            [canonical].into_iter().collect(),
        );

        assert!(info.is_canonical(finalized));
        assert!(info.is_canonical(canonical));
        assert!(!info.is_canonical(unknown));

        assert_eq!(info.proto_array_store(), 1);
    }
}
