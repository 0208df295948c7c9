//! Checkpoint messages

use serde::{Deserialize, Serialize};
use tidemark_core::{Address, CheckpointBlockHeader, Hash, TidemarkError, TidemarkResult, TxHash};

/// Propose a child-chain block range for submission to the root chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCheckpoint {
    pub proposer: Address,
    pub start_block: u64,
    pub end_block: u64,
    pub root_hash: Hash,
    pub account_root_hash: Hash,
    pub timestamp: u64,
}

impl MsgCheckpoint {
    pub fn validate_basic(&self) -> TidemarkResult<()> {
        if self.proposer.is_zero() {
            return Err(TidemarkError::InvalidMsg("missing proposer".to_string()));
        }
        if self.end_block < self.start_block {
            return Err(TidemarkError::InvalidMsg(format!(
                "end block {} before start block {}",
                self.end_block, self.start_block
            )));
        }
        Ok(())
    }

    pub fn to_header(&self) -> CheckpointBlockHeader {
        CheckpointBlockHeader {
            start_block: self.start_block,
            end_block: self.end_block,
            root_hash: self.root_hash,
            account_root_hash: self.account_root_hash,
            proposer: self.proposer,
            timestamp: self.timestamp,
        }
    }
}

/// Acknowledge that header `header_block` landed on the root chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCheckpointAck {
    pub from: Address,
    pub header_block: u64,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

impl MsgCheckpointAck {
    pub fn validate_basic(&self) -> TidemarkResult<()> {
        if self.from.is_zero() {
            return Err(TidemarkError::InvalidMsg("missing sender".to_string()));
        }
        Ok(())
    }
}

/// Report that the buffered checkpoint was never acknowledged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCheckpointNoAck {
    pub from: Address,
    pub timestamp: u64,
}

impl MsgCheckpointNoAck {
    pub fn validate_basic(&self) -> TidemarkResult<()> {
        if self.from.is_zero() {
            return Err(TidemarkError::InvalidMsg("missing sender".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_validate_basic() {
        let msg = MsgCheckpoint {
            proposer: Address([1; 32]),
            start_block: 10,
            end_block: 10,
            root_hash: Hash::ZERO,
            account_root_hash: Hash::ZERO,
            timestamp: 1,
        };
        assert!(msg.validate_basic().is_ok());
        assert_eq!(msg.to_header().end_block, 10);

        let reversed = MsgCheckpoint { end_block: 9, ..msg.clone() };
        assert!(matches!(reversed.validate_basic(), Err(TidemarkError::InvalidMsg(_))));

        let anonymous = MsgCheckpoint { proposer: Address::ZERO, ..msg };
        assert!(anonymous.validate_basic().is_err());
    }
}
