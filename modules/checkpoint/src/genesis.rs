//! Checkpoint genesis state

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tidemark_core::{CheckpointBlockHeader, KvStore, TidemarkError, TidemarkResult};
use tracing::info;

use crate::keeper::{CheckpointKeeper, HeaderEntry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub ack_count: u64,
    #[serde(default)]
    pub buffered_checkpoint: Option<CheckpointBlockHeader>,
    #[serde(default)]
    pub last_no_ack: u64,
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
}

pub fn validate_genesis(keeper: &CheckpointKeeper, genesis: &GenesisState) -> TidemarkResult<()> {
    let mut numbers = BTreeSet::new();
    for entry in &genesis.headers {
        if !numbers.insert(entry.number) {
            return Err(TidemarkError::InvalidGenesis(format!(
                "duplicate header number {}",
                entry.number
            )));
        }
        if entry.header.end_block < entry.header.start_block {
            return Err(TidemarkError::InvalidGenesis(format!(
                "header {} ends before it starts",
                entry.number
            )));
        }
    }

    if genesis.ack_count > 0 {
        let last = keeper.params().child_block_interval.saturating_mul(genesis.ack_count);
        if !numbers.contains(&last) {
            return Err(TidemarkError::InvalidGenesis(format!(
                "ack count {} has no header at {}",
                genesis.ack_count, last
            )));
        }
    }
    Ok(())
}

pub fn init_genesis(
    keeper: &CheckpointKeeper,
    store: &mut dyn KvStore,
    genesis: &GenesisState,
) -> TidemarkResult<()> {
    validate_genesis(keeper, genesis)?;

    for entry in &genesis.headers {
        keeper.add_checkpoint(store, entry.number, &entry.header)?;
    }
    if let Some(buffered) = &genesis.buffered_checkpoint {
        keeper.set_checkpoint_buffer(store, buffered)?;
    }
    keeper.update_ack_count_with_value(store, genesis.ack_count)?;
    keeper.set_last_no_ack(store, genesis.last_no_ack)?;

    info!(
        ack_count = genesis.ack_count,
        headers = genesis.headers.len(),
        buffered = genesis.buffered_checkpoint.is_some(),
        "Initialized checkpoint genesis"
    );
    Ok(())
}

pub fn export_genesis(keeper: &CheckpointKeeper, store: &dyn KvStore) -> TidemarkResult<GenesisState> {
    Ok(GenesisState {
        ack_count: keeper.get_ack_count(store)?,
        buffered_checkpoint: keeper.get_checkpoint_from_buffer(store)?,
        last_no_ack: keeper.get_last_no_ack(store)?,
        headers: keeper.get_checkpoint_headers(store)?,
    })
}
