//! Checkpoint queries

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidemark_core::{KvStore, TidemarkError, TidemarkResult};

use crate::keeper::CheckpointKeeper;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum CheckpointQuery {
    AckCount,
    LastCheckpoint,
    Checkpoint { number: u64 },
    Headers,
    Buffer,
    LastNoAck,
}

pub fn query(
    keeper: &CheckpointKeeper,
    store: &dyn KvStore,
    query: &CheckpointQuery,
) -> TidemarkResult<Value> {
    let value = match query {
        CheckpointQuery::AckCount => Value::from(keeper.get_ack_count(store)?),
        CheckpointQuery::LastCheckpoint => serde_json::to_value(keeper.get_last_checkpoint(store)?)?,
        CheckpointQuery::Checkpoint { number } => serde_json::to_value(
            keeper
                .get_checkpoint_by_index(store, *number)?
                .ok_or(TidemarkError::NoCheckpointFound)?,
        )?,
        CheckpointQuery::Headers => serde_json::to_value(keeper.get_checkpoint_headers(store)?)?,
        CheckpointQuery::Buffer => serde_json::to_value(keeper.get_checkpoint_from_buffer(store)?)?,
        CheckpointQuery::LastNoAck => Value::from(keeper.get_last_no_ack(store)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::{Address, CheckpointBlockHeader, CheckpointParams, Hash};
    use tidemark_state::MemoryStore;

    #[test]
    fn test_checkpoint_queries() {
        let keeper = CheckpointKeeper::new(CheckpointParams::default());
        let mut store = MemoryStore::new();

        assert_eq!(query(&keeper, &store, &CheckpointQuery::AckCount).unwrap(), Value::from(0u64));
        assert_eq!(query(&keeper, &store, &CheckpointQuery::Buffer).unwrap(), Value::Null);
        assert_eq!(
            query(&keeper, &store, &CheckpointQuery::LastCheckpoint),
            Err(TidemarkError::NoCheckpointFound)
        );

        let header = CheckpointBlockHeader {
            start_block: 0,
            end_block: 99,
            root_hash: Hash([1; 32]),
            account_root_hash: Hash::ZERO,
            proposer: Address([2; 32]),
            timestamp: 3,
        };
        keeper.add_checkpoint(&mut store, 10_000, &header).unwrap();
        keeper.update_ack_count(&mut store).unwrap();

        let last = query(&keeper, &store, &CheckpointQuery::LastCheckpoint).unwrap();
        assert_eq!(last["end_block"], Value::from(99u64));

        let by_number = query(&keeper, &store, &CheckpointQuery::Checkpoint { number: 10_000 }).unwrap();
        assert_eq!(by_number, last);

        let headers = query(&keeper, &store, &CheckpointQuery::Headers).unwrap();
        assert_eq!(headers[0]["number"], Value::from(10_000u64));
    }

    #[test]
    fn test_query_json_shape() {
        let q: CheckpointQuery = serde_json::from_str(r#"{"query":"checkpoint","number":7}"#).unwrap();
        assert_eq!(q, CheckpointQuery::Checkpoint { number: 7 });
    }
}
