//! Staking queries

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidemark_core::{Address, KvStore, TidemarkError, TidemarkResult, ValidatorId};

use crate::keeper::StakingKeeper;

/// Read-only staking endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum StakingQuery {
    ValidatorSet,
    Validator { id: ValidatorId },
    ValidatorAccount { id: ValidatorId },
    ValidatorStatus { signer: Address },
    ProposerBonusPercent,
}

/// Answer `query` as JSON
///
/// `ack_count` decides which validators count as current.
pub fn query(
    keeper: &StakingKeeper,
    store: &dyn KvStore,
    ack_count: u64,
    query: &StakingQuery,
) -> TidemarkResult<Value> {
    let value = match query {
        StakingQuery::ValidatorSet => serde_json::to_value(keeper.get_validator_set(store)?)?,
        StakingQuery::Validator { id } => {
            let validator = keeper
                .get_validator(store, *id)?
                .ok_or(TidemarkError::NoValidator)?;
            serde_json::to_value(validator)?
        }
        StakingQuery::ValidatorAccount { id } => {
            let account = keeper
                .get_validator_account(store, *id)?
                .ok_or(TidemarkError::NoValidator)?;
            serde_json::to_value(account)?
        }
        StakingQuery::ValidatorStatus { signer } => {
            Value::Bool(keeper.is_current_validator_by_address(store, signer, ack_count)?)
        }
        StakingQuery::ProposerBonusPercent => {
            Value::from(keeper.get_proposer_bonus_percent(store)?)
        }
    };
    Ok(value)
}
