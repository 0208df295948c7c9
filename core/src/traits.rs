//! Core traits defining TIDEMARK interfaces
//!
//! The store abstraction, the collaborators consumed from the outside world
//! (root-chain oracle, root-hash validator, clock) and the narrow interfaces
//! modules use to reach each other.

use crate::chain::*;
use crate::error::TidemarkError;
use crate::records::*;
use crate::types::*;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result type for TIDEMARK operations
pub type TidemarkResult<T> = Result<T, TidemarkError>;

// ============ Store ============

/// Ordered key-value store visited by one transaction at a time
pub trait KvStore: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> TidemarkResult<Option<Vec<u8>>>;

    /// Check if a key exists
    fn has(&self, key: &[u8]) -> TidemarkResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Set a value
    fn set(&mut self, key: &[u8], value: &[u8]) -> TidemarkResult<()>;

    /// Delete a key
    fn delete(&mut self, key: &[u8]) -> TidemarkResult<()>;

    /// All entries under `prefix`, sorted by key
    fn iter_prefix(&self, prefix: &[u8]) -> TidemarkResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Store with a committed version and state root
pub trait VersionedStore: KvStore {
    /// Get the current state version
    fn version(&self) -> StateVersion;

    /// Get the state root hash
    fn root(&self) -> TidemarkResult<StateRoot>;

    /// Apply a batch of changes atomically
    fn apply_batch(&mut self, changes: Vec<StateChange>) -> TidemarkResult<StateVersion>;
}

/// State change operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl StateChange {
    pub fn key(&self) -> &[u8] {
        match self {
            StateChange::Set { key, .. } | StateChange::Delete { key } => key,
        }
    }
}

/// Read a bincode-encoded record
pub fn load<T: DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> TidemarkResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

/// Write a bincode-encoded record
pub fn save<T: Serialize>(store: &mut dyn KvStore, key: &[u8], value: &T) -> TidemarkResult<()> {
    let bytes = bincode::serialize(value)?;
    store.set(key, &bytes)
}

/// Decode every record under `prefix`, in key order
pub fn load_prefix<T: DeserializeOwned>(store: &dyn KvStore, prefix: &[u8]) -> TidemarkResult<Vec<T>> {
    store
        .iter_prefix(prefix)?
        .into_iter()
        .map(|(_, bytes)| bincode::deserialize(&bytes).map_err(TidemarkError::from))
        .collect()
}

// ============ External Collaborators ============

/// Source of the node's current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}

/// Checks that `root` commits to the child-chain blocks `start..=end`
pub trait RootHashValidator: Send + Sync {
    fn validate_range(&self, start: u64, end: u64, root: &Hash) -> bool;
}

impl<F> RootHashValidator for F
where
    F: Fn(u64, u64, &Hash) -> bool + Send + Sync,
{
    fn validate_range(&self, start: u64, end: u64, root: &Hash) -> bool {
        self(start, end, root)
    }
}

/// Read-only view of the root chain
pub trait RootChainOracle: Send + Sync {
    /// Header block recorded by the root-chain contract
    fn header_block(&self, id: u64) -> TidemarkResult<HeaderBlockInfo>;

    /// Latest root-chain block height
    fn latest_root_chain_height(&self) -> TidemarkResult<u64>;

    /// Receipt of `tx_hash`, `None` until it has enough confirmations
    fn confirmed_receipt(&self, tx_hash: &TxHash) -> TidemarkResult<Option<Receipt>>;

    /// Decode the event of `kind` emitted at `log_index`
    fn decode_event(
        &self,
        receipt: &Receipt,
        log_index: u64,
        kind: EventKind,
    ) -> TidemarkResult<RootChainEvent> {
        receipt.event_at(log_index, kind).cloned().ok_or_else(|| {
            TidemarkError::InvalidMsg(format!("no {:?} event at log index {}", kind, log_index))
        })
    }

    /// Vote payload and signatures of a checkpoint submission
    fn vote_signatures(&self, tx_hash: &TxHash) -> TidemarkResult<VoteSignatures>;

    /// Delegator as recorded by the root-chain delegation manager
    fn delegator(&self, id: DelegatorId) -> TidemarkResult<Delegator>;

    fn is_tx_confirmed(&self, tx_hash: &TxHash) -> bool {
        matches!(self.confirmed_receipt(tx_hash), Ok(Some(_)))
    }
}

// ============ Module Interfaces ============

/// Reward per signing validator
pub type SignerRewards = BTreeMap<ValidatorId, Amount>;

/// What the delegation engine needs from the validator directory
pub trait ValidatorDirectory: Send + Sync {
    fn validator(&self, store: &dyn KvStore, id: ValidatorId) -> TidemarkResult<Option<Validator>>;

    fn set_validator(&self, store: &mut dyn KvStore, validator: &Validator) -> TidemarkResult<()>;
}

/// What the checkpoint state machine needs from staking
pub trait CheckpointStaking: Send + Sync {
    /// Elected proposer of the current validator set
    fn current_proposer(&self, store: &dyn KvStore) -> TidemarkResult<Option<Validator>>;

    /// Advance proposer election by `times` rounds
    fn increment_accum(&self, store: &mut dyn KvStore, times: u64) -> TidemarkResult<()>;

    /// All validator accounts, ordered by validator id
    fn validator_accounts(&self, store: &dyn KvStore) -> TidemarkResult<Vec<ValidatorAccount>>;

    /// Split `total_reward` across the signers of a checkpoint
    fn calculate_signer_rewards(
        &self,
        store: &dyn KvStore,
        proposer: &Address,
        votes: &VoteSignatures,
        total_reward: Amount,
    ) -> TidemarkResult<SignerRewards>;

    /// Credit rewards to validator accounts and delegator pools
    fn update_validator_rewards(
        &self,
        store: &mut dyn KvStore,
        rewards: &SignerRewards,
    ) -> TidemarkResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now(), Timestamp(100));
        clock.advance(5);
        assert_eq!(clock.now(), Timestamp(105));
        clock.set(1);
        assert_eq!(clock.now(), Timestamp(1));
    }

    #[test]
    fn test_closure_validator() {
        let validator = |start: u64, end: u64, _root: &Hash| start <= end;
        assert!(validator.validate_range(0, 9, &Hash::ZERO));
        assert!(!validator.validate_range(9, 0, &Hash::ZERO));
    }
}
