//! Checkpoint keeper - buffer, confirmed headers and counters

use serde::{Deserialize, Serialize};
use tidemark_core::{
    load, load_prefix, save, CheckpointBlockHeader, CheckpointParams, KvStore, TidemarkError,
    TidemarkResult,
};
use tracing::{debug, error, info};

pub const ACK_COUNT_KEY: &[u8] = &[0x11];
pub const BUFFER_CHECKPOINT_KEY: &[u8] = &[0x12];
pub const HEADER_BLOCK_PREFIX: u8 = 0x13;
pub const LAST_NO_ACK_KEY: &[u8] = &[0x14];

pub fn header_key(header_number: u64) -> Vec<u8> {
    let mut key = vec![HEADER_BLOCK_PREFIX];
    key.extend_from_slice(&header_number.to_be_bytes());
    key
}

/// A confirmed header together with its header number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub number: u64,
    pub header: CheckpointBlockHeader,
}

/// Checkpoint keeper
#[derive(Debug, Clone)]
pub struct CheckpointKeeper {
    params: CheckpointParams,
}

impl CheckpointKeeper {
    pub fn new(params: CheckpointParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CheckpointParams {
        &self.params
    }

    // ============ Confirmed Headers ============

    pub fn add_checkpoint(
        &self,
        store: &mut dyn KvStore,
        header_number: u64,
        header: &CheckpointBlockHeader,
    ) -> TidemarkResult<()> {
        save(store, &header_key(header_number), &HeaderEntry {
            number: header_number,
            header: header.clone(),
        })?;
        info!(header_number, checkpoint = %header, "Added checkpoint to state");
        Ok(())
    }

    pub fn get_checkpoint_by_index(
        &self,
        store: &dyn KvStore,
        header_number: u64,
    ) -> TidemarkResult<Option<CheckpointBlockHeader>> {
        Ok(load::<HeaderEntry>(store, &header_key(header_number))?.map(|entry| entry.header))
    }

    /// Header stored at `child_block_interval × ack_count`
    pub fn get_last_checkpoint(&self, store: &dyn KvStore) -> TidemarkResult<CheckpointBlockHeader> {
        let ack_count = self.get_ack_count(store)?;
        let key = self.params.child_block_interval.saturating_mul(ack_count);
        self.get_checkpoint_by_index(store, key)?.ok_or_else(|| {
            debug!(key, ack_count, "No last checkpoint");
            TidemarkError::NoCheckpointFound
        })
    }

    /// Every confirmed header, ordered by header number
    pub fn get_checkpoint_headers(&self, store: &dyn KvStore) -> TidemarkResult<Vec<HeaderEntry>> {
        load_prefix(store, &[HEADER_BLOCK_PREFIX])
    }

    // ============ Buffer ============

    pub fn set_checkpoint_buffer(
        &self,
        store: &mut dyn KvStore,
        header: &CheckpointBlockHeader,
    ) -> TidemarkResult<()> {
        save(store, BUFFER_CHECKPOINT_KEY, header)
    }

    pub fn get_checkpoint_from_buffer(
        &self,
        store: &dyn KvStore,
    ) -> TidemarkResult<Option<CheckpointBlockHeader>> {
        load(store, BUFFER_CHECKPOINT_KEY).map_err(|err| {
            error!(error = %err, "Unable to decode buffered checkpoint");
            err
        })
    }

    pub fn flush_checkpoint_buffer(&self, store: &mut dyn KvStore) -> TidemarkResult<()> {
        store.delete(BUFFER_CHECKPOINT_KEY)
    }

    // ============ Counters ============

    pub fn get_ack_count(&self, store: &dyn KvStore) -> TidemarkResult<u64> {
        Ok(load(store, ACK_COUNT_KEY)?.unwrap_or(0))
    }

    pub fn update_ack_count_with_value(&self, store: &mut dyn KvStore, value: u64) -> TidemarkResult<()> {
        save(store, ACK_COUNT_KEY, &value)
    }

    pub fn update_ack_count(&self, store: &mut dyn KvStore) -> TidemarkResult<u64> {
        let next = self.get_ack_count(store)? + 1;
        self.update_ack_count_with_value(store, next)?;
        Ok(next)
    }

    pub fn get_last_no_ack(&self, store: &dyn KvStore) -> TidemarkResult<u64> {
        Ok(load(store, LAST_NO_ACK_KEY)?.unwrap_or(0))
    }

    pub fn set_last_no_ack(&self, store: &mut dyn KvStore, timestamp: u64) -> TidemarkResult<()> {
        save(store, LAST_NO_ACK_KEY, &timestamp)
    }
}
