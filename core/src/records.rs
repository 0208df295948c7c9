//! Persisted records of the validator directory, the delegation engine
//! and the checkpoint state machine.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validator known to the directory
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    /// Id assigned by the root-chain stake manager
    pub id: ValidatorId,

    /// Signer address, blake3 of `pub_key`
    pub signer: Address,

    pub pub_key: PublicKey,

    /// Own stake-derived power plus bonded delegator power
    pub voting_power: i64,

    /// Sum of bonded delegator power
    pub delegated_power: i64,

    /// Accumulated rewards owed to delegators, in power units
    pub delegator_reward_pool: i64,

    /// Sum of outstanding delegator shares
    pub total_delegator_shares: f32,

    pub start_epoch: u64,

    /// 0 means unbounded
    pub end_epoch: u64,

    /// Weighted round-robin accumulator
    pub proposer_priority: i64,

    /// Sequence number of the last root-chain event applied to this record
    pub last_updated: u64,
}

impl Validator {
    pub fn new(id: ValidatorId, signer: Address, pub_key: PublicKey, voting_power: i64) -> Self {
        Self {
            id,
            signer,
            pub_key,
            voting_power,
            delegated_power: 0,
            delegator_reward_pool: 0,
            total_delegator_shares: 0.0,
            start_epoch: 0,
            end_epoch: 0,
            proposer_priority: 0,
            last_updated: 0,
        }
    }

    pub fn with_epochs(mut self, start_epoch: u64, end_epoch: u64) -> Self {
        self.start_epoch = start_epoch;
        self.end_epoch = end_epoch;
        self
    }

    /// Whether the validator is active at the epoch following `ack_count` acks
    pub fn is_current(&self, ack_count: u64) -> bool {
        let epoch = ack_count + 1;
        self.start_epoch <= epoch
            && (self.end_epoch == 0 || self.end_epoch >= epoch)
            && self.voting_power > 0
    }

    /// Structural checks applied to genesis validators
    pub fn validate_basic(&self) -> bool {
        !self.pub_key.is_zero() && !self.signer.is_zero() && self.voting_power >= 0
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validator{{{} {} power={} delegated={} pool={} shares={} epochs={}..{} priority={}}}",
            self.id,
            self.signer,
            self.voting_power,
            self.delegated_power,
            self.delegator_reward_pool,
            self.total_delegator_shares,
            self.start_epoch,
            self.end_epoch,
            self.proposer_priority,
        )
    }
}

/// Reward and slashing balance of a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAccount {
    pub id: ValidatorId,
    pub reward_amount: Amount,
    pub slashed_amount: Amount,
}

impl ValidatorAccount {
    pub fn new(id: ValidatorId) -> Self {
        Self {
            id,
            reward_amount: Amount::ZERO,
            slashed_amount: Amount::ZERO,
        }
    }
}

/// A delegator known to the delegation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegator {
    pub id: DelegatorId,

    /// Power at last bonding
    pub voting_power: i64,

    pub last_updated: u64,

    /// Bonded validator, `ValidatorId::NONE` while unbonded
    pub val_id: ValidatorId,
}

impl Delegator {
    pub fn new(id: DelegatorId) -> Self {
        Self {
            id,
            voting_power: 0,
            last_updated: 0,
            val_id: ValidatorId::NONE,
        }
    }

    pub fn is_bonded(&self) -> bool {
        !self.val_id.is_none()
    }
}

/// Share balance and payouts of a delegator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatorAccount {
    pub id: DelegatorId,
    pub shares: f32,
    pub reward_amount: i64,
    pub slashed_amount: i64,
}

impl DelegatorAccount {
    pub fn new(id: DelegatorId) -> Self {
        Self {
            id,
            shares: 0.0,
            reward_amount: 0,
            slashed_amount: 0,
        }
    }
}

/// A contiguous child-chain block range committed to the root chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointBlockHeader {
    pub start_block: u64,

    /// Inclusive
    pub end_block: u64,

    pub root_hash: Hash,
    pub account_root_hash: Hash,
    pub proposer: Address,

    /// Unix seconds
    pub timestamp: u64,
}

impl fmt::Display for CheckpointBlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checkpoint[{}..{}] root={} proposer={} ts={}",
            self.start_block, self.end_block, self.root_hash, self.proposer, self.timestamp
        )
    }
}

/// Power change handed back to the consensus engine at end of block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PublicKey,
    pub power: i64,
}
