//! Delegation messages
//!
//! Each message points at a root-chain transaction whose receipt carries
//! the event being replayed on the sidechain.

use serde::{Deserialize, Serialize};
use tidemark_core::{Address, DelegatorId, TidemarkError, TidemarkResult, TxHash};

/// Multiplier turning a root-chain block number into an event sequence number
pub const DEFAULT_LOG_INDEX_UNIT: u64 = 100_000;

/// Register a delegator that joined on the root chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegatorJoin {
    pub from: Address,
    pub id: DelegatorId,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

/// Replay a root-chain bond event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegatorBond {
    pub from: Address,
    pub id: DelegatorId,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

/// Replay a root-chain unbond event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegatorUnbond {
    pub from: Address,
    pub id: DelegatorId,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

fn validate_fields(from: &Address, id: DelegatorId) -> TidemarkResult<()> {
    if id.0 == 0 {
        return Err(TidemarkError::InvalidMsg(format!("invalid delegator id {}", id)));
    }
    if from.is_zero() {
        return Err(TidemarkError::InvalidMsg(format!("invalid sender {}", from)));
    }
    Ok(())
}

impl MsgDelegatorJoin {
    pub fn validate_basic(&self) -> TidemarkResult<()> {
        validate_fields(&self.from, self.id)
    }
}

impl MsgDelegatorBond {
    pub fn validate_basic(&self) -> TidemarkResult<()> {
        validate_fields(&self.from, self.id)
    }
}

impl MsgDelegatorUnbond {
    pub fn validate_basic(&self) -> TidemarkResult<()> {
        validate_fields(&self.from, self.id)
    }
}

/// Sequence number of the event at `log_index` in root-chain block `block_number`
pub fn event_sequence(block_number: u64, log_index: u64) -> u64 {
    block_number
        .saturating_mul(DEFAULT_LOG_INDEX_UNIT)
        .saturating_add(log_index)
}
