//! Delegation queries

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidemark_core::{DelegatorId, KvStore, TidemarkError, TidemarkResult, ValidatorDirectory};

use crate::keeper::DelegationKeeper;
use crate::shares::ShareMath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum DelegationQuery {
    Delegator { id: DelegatorId },
    DelegatorAccount { id: DelegatorId },
    Delegators,
}

pub fn query<D: ValidatorDirectory, M: ShareMath>(
    keeper: &DelegationKeeper<D, M>,
    store: &dyn KvStore,
    query: &DelegationQuery,
) -> TidemarkResult<Value> {
    let value = match query {
        DelegationQuery::Delegator { id } => serde_json::to_value(
            keeper
                .get_delegator(store, *id)?
                .ok_or(TidemarkError::NoDelegator)?,
        )?,
        DelegationQuery::DelegatorAccount { id } => serde_json::to_value(
            keeper
                .get_delegator_account(store, *id)?
                .ok_or(TidemarkError::NoDelegatorAccount)?,
        )?,
        DelegationQuery::Delegators => serde_json::to_value(keeper.get_all_delegators(store)?)?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::Delegator;
    use tidemark_staking::StakingKeeper;
    use tidemark_state::MemoryStore;

    #[test]
    fn test_delegator_query() {
        let keeper = DelegationKeeper::new(StakingKeeper::new());
        let mut store = MemoryStore::new();
        keeper.add_delegator(&mut store, &Delegator::new(DelegatorId(4))).unwrap();

        let value = query(&keeper, &store, &DelegationQuery::Delegator { id: DelegatorId(4) }).unwrap();
        assert_eq!(value["id"], Value::from(4u64));
        assert_eq!(value["val_id"], Value::from(0u64));

        assert_eq!(
            query(&keeper, &store, &DelegationQuery::DelegatorAccount { id: DelegatorId(4) }),
            Err(TidemarkError::NoDelegatorAccount)
        );
    }
}
