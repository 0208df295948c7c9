//! Delegation message handlers

use serde::{Deserialize, Serialize};
use tidemark_core::{
    DelegatorAccount, DelegatorId, Delegator, EventKind, KvStore, Receipt, RootChainEvent,
    RootChainOracle, TidemarkError, TidemarkResult, TxHash, ValidatorDirectory, ValidatorId,
};
use tracing::{debug, error, info};

use crate::keeper::DelegationKeeper;
use crate::msg::{event_sequence, MsgDelegatorBond, MsgDelegatorJoin, MsgDelegatorUnbond};
use crate::shares::{F32ShareMath, ShareMath};

/// Result of an accepted delegation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DelegationEvent {
    DelegatorJoined {
        id: DelegatorId,
    },
    DelegatorBonded {
        id: DelegatorId,
        validator: ValidatorId,
        shares: f32,
    },
    DelegatorUnbonded {
        id: DelegatorId,
        validator: ValidatorId,
        reward: f32,
    },
}

/// Replays root-chain delegation events against the store
pub struct DelegationHandler<'a, D, M = F32ShareMath> {
    keeper: &'a DelegationKeeper<D, M>,
    oracle: &'a dyn RootChainOracle,
    confirmation_blocks: u64,
}

impl<'a, D: ValidatorDirectory, M: ShareMath> DelegationHandler<'a, D, M> {
    pub fn new(
        keeper: &'a DelegationKeeper<D, M>,
        oracle: &'a dyn RootChainOracle,
        confirmation_blocks: u64,
    ) -> Self {
        Self {
            keeper,
            oracle,
            confirmation_blocks,
        }
    }

    pub fn handle_join(
        &self,
        store: &mut dyn KvStore,
        msg: &MsgDelegatorJoin,
    ) -> TidemarkResult<DelegationEvent> {
        debug!(id = %msg.id, tx = %msg.tx_hash, "Handling delegator join");
        msg.validate_basic()?;

        if !self.oracle.is_tx_confirmed(&msg.tx_hash) {
            return Err(self.wait_for_confirmation());
        }

        let fetched = self.oracle.delegator(msg.id).map_err(|err| {
            error!(id = %msg.id, error = %err, "Unable to fetch delegator from root chain");
            TidemarkError::NoDelegator
        })?;
        if fetched.id != msg.id {
            return Err(TidemarkError::InvalidMsg(format!(
                "root chain returned delegator {} for {}",
                fetched.id, msg.id
            )));
        }

        if self.keeper.get_delegator(store, msg.id)?.is_some() {
            error!(id = %msg.id, "Delegator id already taken");
            return Err(TidemarkError::DelegatorAlreadyJoined);
        }

        self.keeper.add_delegator(store, &Delegator::new(msg.id))?;
        self.keeper
            .add_delegator_account(store, &DelegatorAccount::new(msg.id))?;

        info!(id = %msg.id, "Delegator joined");
        Ok(DelegationEvent::DelegatorJoined { id: msg.id })
    }

    pub fn handle_bond(
        &self,
        store: &mut dyn KvStore,
        msg: &MsgDelegatorBond,
    ) -> TidemarkResult<DelegationEvent> {
        debug!(id = %msg.id, tx = %msg.tx_hash, log_index = msg.log_index, "Handling delegator bond");
        msg.validate_basic()?;

        let receipt = self.receipt(&msg.tx_hash)?;
        let (delegator_id, validator_id, amount) =
            match self.oracle.decode_event(&receipt, msg.log_index, EventKind::DelegatorBond)? {
                RootChainEvent::DelegatorBond {
                    delegator_id,
                    validator_id,
                    amount,
                } => (delegator_id, validator_id, amount),
                other => {
                    return Err(TidemarkError::InvalidMsg(format!(
                        "expected bond event, found {:?}",
                        other.kind()
                    )))
                }
            };
        check_event_delegator(msg.id, delegator_id)?;

        let sequence = event_sequence(receipt.block_number, msg.log_index);
        let delegator = self.fresh_delegator(store, msg.id, sequence)?;
        if delegator.is_bonded() && delegator.val_id != validator_id {
            error!(id = %msg.id, bonded = %delegator.val_id, requested = %validator_id, "Delegator bonded elsewhere");
            return Err(TidemarkError::DelegatorAlreadyBonded(delegator.val_id));
        }

        let shares = self
            .keeper
            .bond_delegator(store, msg.id, validator_id, amount, sequence)?;

        Ok(DelegationEvent::DelegatorBonded {
            id: msg.id,
            validator: validator_id,
            shares,
        })
    }

    pub fn handle_unbond(
        &self,
        store: &mut dyn KvStore,
        msg: &MsgDelegatorUnbond,
    ) -> TidemarkResult<DelegationEvent> {
        debug!(id = %msg.id, tx = %msg.tx_hash, log_index = msg.log_index, "Handling delegator unbond");
        msg.validate_basic()?;

        let receipt = self.receipt(&msg.tx_hash)?;
        let (delegator_id, validator_id) =
            match self.oracle.decode_event(&receipt, msg.log_index, EventKind::DelegatorUnbond)? {
                RootChainEvent::DelegatorUnbond {
                    delegator_id,
                    validator_id,
                } => (delegator_id, validator_id),
                other => {
                    return Err(TidemarkError::InvalidMsg(format!(
                        "expected unbond event, found {:?}",
                        other.kind()
                    )))
                }
            };
        check_event_delegator(msg.id, delegator_id)?;

        let sequence = event_sequence(receipt.block_number, msg.log_index);
        let delegator = self.fresh_delegator(store, msg.id, sequence)?;
        if delegator.is_bonded() && delegator.val_id != validator_id {
            return Err(TidemarkError::InvalidMsg(format!(
                "delegator {} is bonded to {}, not {}",
                msg.id, delegator.val_id, validator_id
            )));
        }

        let result = self.keeper.unbond_delegator(store, msg.id, sequence)?;

        Ok(DelegationEvent::DelegatorUnbonded {
            id: msg.id,
            validator: result.validator,
            reward: result.reward,
        })
    }

    fn receipt(&self, tx_hash: &TxHash) -> TidemarkResult<Receipt> {
        self.oracle
            .confirmed_receipt(tx_hash)?
            .ok_or_else(|| self.wait_for_confirmation())
    }

    /// Stored delegator, rejecting events not newer than its last update
    fn fresh_delegator(
        &self,
        store: &dyn KvStore,
        id: DelegatorId,
        sequence: u64,
    ) -> TidemarkResult<Delegator> {
        let delegator = self
            .keeper
            .get_delegator(store, id)?
            .ok_or(TidemarkError::NoDelegator)?;
        if sequence <= delegator.last_updated {
            error!(id = %id, sequence, last_updated = delegator.last_updated, "Stale delegation event");
            return Err(TidemarkError::OldTx);
        }
        Ok(delegator)
    }

    fn wait_for_confirmation(&self) -> TidemarkError {
        TidemarkError::WaitForConfirmation {
            confirmations: self.confirmation_blocks,
        }
    }
}

fn check_event_delegator(expected: DelegatorId, found: DelegatorId) -> TidemarkResult<()> {
    if expected != found {
        return Err(TidemarkError::InvalidMsg(format!(
            "event is for delegator {}, message for {}",
            found, expected
        )));
    }
    Ok(())
}
