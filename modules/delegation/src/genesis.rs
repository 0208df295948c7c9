//! Delegation genesis state

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tidemark_core::{
    Delegator, DelegatorAccount, KvStore, TidemarkError, TidemarkResult, ValidatorDirectory,
};
use tracing::info;

use crate::keeper::DelegationKeeper;
use crate::shares::ShareMath;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub delegators: Vec<Delegator>,
    #[serde(default)]
    pub delegator_accounts: Vec<DelegatorAccount>,
}

pub fn validate_genesis(genesis: &GenesisState) -> TidemarkResult<()> {
    let mut ids = BTreeSet::new();
    for delegator in &genesis.delegators {
        if !ids.insert(delegator.id) {
            return Err(TidemarkError::InvalidGenesis(format!(
                "duplicate delegator id {}",
                delegator.id
            )));
        }
    }
    for account in &genesis.delegator_accounts {
        if !ids.contains(&account.id) {
            return Err(TidemarkError::InvalidGenesis(format!(
                "account for unknown delegator {}",
                account.id
            )));
        }
        if account.shares < 0.0 {
            return Err(TidemarkError::InvalidGenesis(format!(
                "negative shares for delegator {}",
                account.id
            )));
        }
    }
    Ok(())
}

/// Write genesis delegators; each gets an empty account unless one is given
pub fn init_genesis<D: ValidatorDirectory, M: ShareMath>(
    keeper: &DelegationKeeper<D, M>,
    store: &mut dyn KvStore,
    genesis: &GenesisState,
) -> TidemarkResult<()> {
    validate_genesis(genesis)?;

    for delegator in &genesis.delegators {
        keeper.add_delegator(store, delegator)?;
        let account = genesis
            .delegator_accounts
            .iter()
            .find(|a| a.id == delegator.id)
            .cloned()
            .unwrap_or_else(|| DelegatorAccount::new(delegator.id));
        keeper.add_delegator_account(store, &account)?;
    }

    info!(delegators = genesis.delegators.len(), "Initialized delegation genesis");
    Ok(())
}

pub fn export_genesis<D: ValidatorDirectory, M: ShareMath>(
    keeper: &DelegationKeeper<D, M>,
    store: &dyn KvStore,
) -> TidemarkResult<GenesisState> {
    Ok(GenesisState {
        delegators: keeper.get_all_delegators(store)?,
        delegator_accounts: keeper.get_all_delegator_accounts(store)?,
    })
}
