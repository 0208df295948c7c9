//! Transactions accepted by the application and their outcomes

use serde::{Deserialize, Serialize};
use tidemark_checkpoint::{CheckpointEvent, MsgCheckpoint, MsgCheckpointAck, MsgCheckpointNoAck};
use tidemark_core::{TidemarkError, TidemarkResult};
use tidemark_delegation::{DelegationEvent, MsgDelegatorBond, MsgDelegatorJoin, MsgDelegatorUnbond};

/// Every message kind the state machine understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    Checkpoint(MsgCheckpoint),
    CheckpointAck(MsgCheckpointAck),
    CheckpointNoAck(MsgCheckpointNoAck),
    DelegatorJoin(MsgDelegatorJoin),
    DelegatorBond(MsgDelegatorBond),
    DelegatorUnbond(MsgDelegatorUnbond),
}

impl Transaction {
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::Checkpoint(_) => "checkpoint",
            Transaction::CheckpointAck(_) => "checkpoint_ack",
            Transaction::CheckpointNoAck(_) => "checkpoint_no_ack",
            Transaction::DelegatorJoin(_) => "delegator_join",
            Transaction::DelegatorBond(_) => "delegator_bond",
            Transaction::DelegatorUnbond(_) => "delegator_unbond",
        }
    }

    /// Parse a JSON array of transactions
    pub fn batch_from_json(json: &str) -> TidemarkResult<Vec<Transaction>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Event emitted by an accepted transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TxEvent {
    Checkpoint(CheckpointEvent),
    Delegation(DelegationEvent),
}

impl From<CheckpointEvent> for TxEvent {
    fn from(event: CheckpointEvent) -> Self {
        TxEvent::Checkpoint(event)
    }
}

impl From<DelegationEvent> for TxEvent {
    fn from(event: DelegationEvent) -> Self {
        TxEvent::Delegation(event)
    }
}

/// Printable outcome of one delivered transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxResult {
    pub index: usize,
    pub kind: String,
    /// Zero on success, otherwise the error code
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<TxEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl TxResult {
    pub fn new(index: usize, tx: &Transaction, outcome: &Result<TxEvent, TidemarkError>) -> Self {
        match outcome {
            Ok(event) => Self {
                index,
                kind: tx.kind().to_string(),
                code: 0,
                event: Some(event.clone()),
                log: None,
            },
            Err(err) => Self {
                index,
                kind: tx.kind().to_string(),
                code: err.code(),
                event: None,
                log: Some(err.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_json() {
        let json = r#"[
            {"type": "checkpoint_no_ack", "from": "0101010101010101010101010101010101010101010101010101010101010101", "timestamp": 5000}
        ]"#;
        let batch = Transaction::batch_from_json(json).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind(), "checkpoint_no_ack");
    }

    #[test]
    fn test_result_codes() {
        let tx = Transaction::CheckpointNoAck(MsgCheckpointNoAck {
            from: tidemark_core::Address([1; 32]),
            timestamp: 1,
        });
        let failed = TxResult::new(0, &tx, &Err(TidemarkError::TooManyNoACK));
        assert_eq!(failed.code, 1506);
        assert!(!failed.is_ok());

        let ok = TxResult::new(1, &tx, &Ok(CheckpointEvent::CheckpointNoAck { new_proposer: None }.into()));
        assert!(ok.is_ok());
        assert_eq!(ok.log, None);
    }
}
