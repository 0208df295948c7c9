//! Root-chain data as seen through the oracle

use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

/// Header block as recorded by the root-chain contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBlockInfo {
    pub root_hash: Hash,
    pub start_block: u64,
    pub end_block: u64,

    /// Root-chain height the header was created at
    pub created_at: u64,

    pub proposer: Address,
}

/// A single log entry of a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub index: u64,
    pub event: RootChainEvent,
}

/// Confirmed root-chain transaction receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub logs: Vec<ReceiptLog>,
}

/// Kind of event to decode from a receipt log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NewHeaderBlock,
    DelegatorBond,
    DelegatorUnbond,
}

/// Decoded root-chain event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootChainEvent {
    NewHeaderBlock {
        header_block_id: u64,
        start_block: u64,
        end_block: u64,
        reward: Amount,
    },
    DelegatorBond {
        delegator_id: DelegatorId,
        validator_id: ValidatorId,
        amount: Amount,
    },
    DelegatorUnbond {
        delegator_id: DelegatorId,
        validator_id: ValidatorId,
    },
}

impl RootChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RootChainEvent::NewHeaderBlock { .. } => EventKind::NewHeaderBlock,
            RootChainEvent::DelegatorBond { .. } => EventKind::DelegatorBond,
            RootChainEvent::DelegatorUnbond { .. } => EventKind::DelegatorUnbond,
        }
    }
}

impl Receipt {
    /// Find the log at `log_index` and check that it carries an event of `kind`
    pub fn event_at(&self, log_index: u64, kind: EventKind) -> Option<&RootChainEvent> {
        self.logs
            .iter()
            .find(|log| log.index == log_index)
            .map(|log| &log.event)
            .filter(|event| event.kind() == kind)
    }
}

/// Vote data and signatures carried by a checkpoint submission
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VoteSignatures {
    /// The signed payload
    #[serde_as(as = "Hex")]
    pub vote_bytes: Vec<u8>,

    /// Concatenated `(pubkey || signature)` entries, 96 bytes each
    #[serde_as(as = "Hex")]
    pub sig_input: Vec<u8>,

    #[serde_as(as = "Hex")]
    #[serde(default)]
    pub tx_data: Vec<u8>,
}
