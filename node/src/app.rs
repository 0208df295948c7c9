//! Application state machine
//!
//! Routes each transaction to its module handler against a write-buffering
//! cache, so a rejected transaction leaves the committed store untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tidemark_checkpoint::{CheckpointHandler, CheckpointKeeper, CheckpointQuery};
use tidemark_consensus::validator_updates;
use tidemark_core::{
    CheckpointParams, Clock, KvStore, RootChainOracle, RootHashValidator, StateRoot,
    StateVersion, TidemarkResult, ValidatorUpdate, VersionedStore,
};
use tidemark_delegation::{DelegationHandler, DelegationKeeper, DelegationQuery};
use tidemark_staking::{StakingKeeper, StakingQuery};
use tidemark_state::CacheStore;
use tracing::{debug, error, info, warn};

use crate::genesis::AppGenesis;
use crate::tx::{Transaction, TxEvent};

/// Read-only request routed to one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "module", rename_all = "snake_case")]
pub enum Query {
    Staking(StakingQuery),
    Delegation(DelegationQuery),
    Checkpoint(CheckpointQuery),
}

/// The replicated application over a versioned store
pub struct App<S: VersionedStore> {
    store: S,
    staking: StakingKeeper,
    delegation: DelegationKeeper<StakingKeeper>,
    checkpoint: CheckpointKeeper,
    oracle: Arc<dyn RootChainOracle>,
    root_validator: Arc<dyn RootHashValidator>,
    clock: Arc<dyn Clock>,
}

impl<S: VersionedStore> App<S> {
    pub fn new(
        store: S,
        params: CheckpointParams,
        oracle: Arc<dyn RootChainOracle>,
        root_validator: Arc<dyn RootHashValidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            staking: StakingKeeper::new(),
            delegation: DelegationKeeper::new(StakingKeeper::new()),
            checkpoint: CheckpointKeeper::new(params),
            oracle,
            root_validator,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn staking(&self) -> &StakingKeeper {
        &self.staking
    }

    pub fn delegation(&self) -> &DelegationKeeper<StakingKeeper> {
        &self.delegation
    }

    pub fn checkpoint(&self) -> &CheckpointKeeper {
        &self.checkpoint
    }

    pub fn version(&self) -> StateVersion {
        self.store.version()
    }

    pub fn state_root(&self) -> TidemarkResult<StateRoot> {
        self.store.root()
    }

    /// Write every module's genesis and return the initial validator updates
    ///
    /// Nothing is committed unless all modules accept their genesis.
    pub fn init_chain(&mut self, genesis: &AppGenesis) -> TidemarkResult<Vec<ValidatorUpdate>> {
        let mut cache = CacheStore::new(&self.store);
        tidemark_staking::init_genesis(&self.staking, &mut cache, &genesis.staking)?;
        tidemark_delegation::init_genesis(&self.delegation, &mut cache, &genesis.delegation)?;
        tidemark_checkpoint::init_genesis(&self.checkpoint, &mut cache, &genesis.checkpoint)?;
        let set = self.staking.get_validator_set(&cache)?;
        let changes = cache.into_changes();

        let version = self.store.apply_batch(changes)?;
        let root = self.store.root()?;
        info!(
            version = version.0,
            validators = set.len(),
            %root,
            "Chain initialized"
        );
        Ok(validator_updates(&set.validators))
    }

    pub fn export_genesis(&self) -> TidemarkResult<AppGenesis> {
        Ok(AppGenesis {
            staking: tidemark_staking::export_genesis(&self.staking, &self.store)?,
            delegation: tidemark_delegation::export_genesis(&self.delegation, &self.store)?,
            checkpoint: tidemark_checkpoint::export_genesis(&self.checkpoint, &self.store)?,
        })
    }

    /// Run one transaction, committing its writes only if it is accepted
    pub fn deliver_tx(&mut self, tx: &Transaction) -> TidemarkResult<TxEvent> {
        let mut cache = CacheStore::new(&self.store);
        let event = match self.execute(&mut cache, tx) {
            Ok(event) => event,
            Err(err) => {
                warn!(kind = tx.kind(), code = err.code(), error = %err, "Transaction rejected");
                return Err(err);
            }
        };
        let changes = cache.into_changes();
        let writes = changes.len();

        let version = self.store.apply_batch(changes)?;
        debug!(kind = tx.kind(), writes, version = version.0, "Transaction committed");
        Ok(event)
    }

    fn execute(&self, store: &mut dyn KvStore, tx: &Transaction) -> TidemarkResult<TxEvent> {
        let event = match tx {
            Transaction::Checkpoint(msg) => self.checkpoint_handler().handle_checkpoint(store, msg)?.into(),
            Transaction::CheckpointAck(msg) => {
                self.checkpoint_handler().handle_checkpoint_ack(store, msg)?.into()
            }
            Transaction::CheckpointNoAck(msg) => {
                self.checkpoint_handler().handle_checkpoint_no_ack(store, msg)?.into()
            }
            Transaction::DelegatorJoin(msg) => self.delegation_handler().handle_join(store, msg)?.into(),
            Transaction::DelegatorBond(msg) => self.delegation_handler().handle_bond(store, msg)?.into(),
            Transaction::DelegatorUnbond(msg) => {
                self.delegation_handler().handle_unbond(store, msg)?.into()
            }
        };
        Ok(event)
    }

    fn checkpoint_handler(&self) -> CheckpointHandler<'_> {
        CheckpointHandler::new(
            &self.checkpoint,
            &self.staking,
            self.oracle.as_ref(),
            self.root_validator.as_ref(),
            self.clock.as_ref(),
        )
    }

    fn delegation_handler(&self) -> DelegationHandler<'_, StakingKeeper> {
        DelegationHandler::new(
            &self.delegation,
            self.oracle.as_ref(),
            self.checkpoint.params().confirmation_blocks,
        )
    }

    /// Reconcile the validator set after a block with transactions
    ///
    /// A change set the validator set rejects is logged and dropped; only
    /// storage failures surface as errors.
    pub fn end_block(&mut self, num_txs: usize) -> TidemarkResult<Vec<ValidatorUpdate>> {
        if num_txs == 0 {
            return Ok(Vec::new());
        }

        let ack_count = self.checkpoint.get_ack_count(&self.store)?;
        let mut cache = CacheStore::new(&self.store);
        let updates = match self.staking.apply_validator_set_changes(&mut cache, ack_count) {
            Ok(updates) => updates,
            Err(err) => {
                error!(error = %err, ack_count, "Unable to update validator set");
                return Ok(Vec::new());
            }
        };
        let changes = cache.into_changes();
        if !changes.is_empty() {
            self.store.apply_batch(changes)?;
        }

        if !updates.is_empty() {
            info!(updates = updates.len(), ack_count, "Validator updates for consensus");
        }
        Ok(updates)
    }

    /// Deliver a block of transactions and run end-block
    pub fn deliver_block(
        &mut self,
        txs: &[Transaction],
    ) -> TidemarkResult<(Vec<TidemarkResult<TxEvent>>, Vec<ValidatorUpdate>)> {
        let outcomes: Vec<_> = txs.iter().map(|tx| self.deliver_tx(tx)).collect();
        let updates = self.end_block(txs.len())?;
        Ok((outcomes, updates))
    }

    pub fn query(&self, query: &Query) -> TidemarkResult<Value> {
        match query {
            Query::Staking(q) => {
                let ack_count = self.checkpoint.get_ack_count(&self.store)?;
                tidemark_staking::query(&self.staking, &self.store, ack_count, q)
            }
            Query::Delegation(q) => tidemark_delegation::query(&self.delegation, &self.store, q),
            Query::Checkpoint(q) => tidemark_checkpoint::query(&self.checkpoint, &self.store, q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_checkpoint::MsgCheckpointNoAck;
    use tidemark_core::{
        Address, FixtureOracle, Hash, ManualClock, TidemarkError, Validator, ValidatorId,
    };
    use tidemark_crypto::keys::KeyPair;
    use tidemark_state::MemoryStore;

    fn accept_all(_start: u64, _end: u64, _root: &Hash) -> bool {
        true
    }

    fn test_app() -> App<MemoryStore> {
        App::new(
            MemoryStore::new(),
            CheckpointParams::default(),
            Arc::new(FixtureOracle::default()),
            Arc::new(accept_all),
            Arc::new(ManualClock::new(10_000)),
        )
    }

    fn two_validator_genesis() -> AppGenesis {
        let a = KeyPair::from_seed(&[1; 32]);
        let b = KeyPair::from_seed(&[2; 32]);
        let mut genesis = AppGenesis::single_validator(&a, 10);
        genesis.staking = genesis
            .staking
            .add_validator(Validator::new(ValidatorId::new(2), b.address(), b.public_key(), 10));
        genesis
    }

    #[test]
    fn test_init_chain() {
        let mut app = test_app();
        let updates = app.init_chain(&two_validator_genesis()).unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(app.version().0, 1);
        assert!(app.staking().get_current_proposer(app.store()).unwrap().is_some());
    }

    #[test]
    fn test_invalid_genesis_writes_nothing() {
        let mut app = test_app();
        let mut genesis = two_validator_genesis();
        genesis.staking.validators[1].id = ValidatorId::new(1);

        assert!(matches!(app.init_chain(&genesis), Err(TidemarkError::InvalidGenesis(_))));
        assert!(app.store().is_empty());
    }

    #[test]
    fn test_rejected_tx_leaves_store_untouched() {
        let mut app = test_app();
        app.init_chain(&two_validator_genesis()).unwrap();
        let before = app.store().all_entries();

        let tx = Transaction::CheckpointNoAck(MsgCheckpointNoAck { from: Address([1; 32]), timestamp: 10 });
        assert_eq!(app.deliver_tx(&tx), Err(TidemarkError::InvalidNoACK));
        assert_eq!(app.store().all_entries(), before);
    }

    #[test]
    fn test_no_ack_rotates_proposer() {
        let mut app = test_app();
        app.init_chain(&two_validator_genesis()).unwrap();
        let first = app.staking().get_current_proposer(app.store()).unwrap().unwrap().signer;

        let tx = Transaction::CheckpointNoAck(MsgCheckpointNoAck { from: Address([1; 32]), timestamp: 5_000 });
        let (outcomes, updates) = app.deliver_block(&[tx]).unwrap();
        assert!(outcomes[0].is_ok());
        assert!(updates.is_empty());

        let second = app.staking().get_current_proposer(app.store()).unwrap().unwrap().signer;
        assert_ne!(first, second);
    }

    #[test]
    fn test_end_block_without_txs_is_noop() {
        let mut app = test_app();
        app.init_chain(&two_validator_genesis()).unwrap();
        let version = app.version();
        assert!(app.end_block(0).unwrap().is_empty());
        assert_eq!(app.version(), version);
    }

    #[test]
    fn test_query_routing() {
        let mut app = test_app();
        app.init_chain(&two_validator_genesis()).unwrap();

        let q: Query = serde_json::from_str(r#"{"module":"checkpoint","query":"ack_count"}"#).unwrap();
        assert_eq!(app.query(&q).unwrap(), Value::from(0u64));

        let q: Query = serde_json::from_str(r#"{"module":"staking","query":"proposer_bonus_percent"}"#).unwrap();
        assert_eq!(app.query(&q).unwrap(), Value::from(10u64));

        let q = Query::Delegation(DelegationQuery::Delegators);
        assert_eq!(app.query(&q).unwrap(), Value::Array(Vec::new()));
    }

    #[test]
    fn test_export_matches_import() {
        let mut app = test_app();
        let genesis = two_validator_genesis();
        app.init_chain(&genesis).unwrap();

        let exported = app.export_genesis().unwrap();
        assert_eq!(exported.staking.validators.len(), 2);
        assert_eq!(exported.checkpoint, genesis.checkpoint);

        let mut replica = test_app();
        replica.init_chain(&exported).unwrap();
        assert_eq!(replica.state_root().unwrap(), app.state_root().unwrap());
    }
}
