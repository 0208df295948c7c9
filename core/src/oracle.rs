//! Fixture-backed root-chain oracle
//!
//! Serves header blocks, receipts, vote signatures and delegators from an
//! in-memory document that can be loaded from JSON. Used by the node binary
//! when no root chain is attached, and by tests.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::chain::*;
use crate::error::TidemarkError;
use crate::records::Delegator;
use crate::traits::{RootChainOracle, TidemarkResult};
use crate::types::*;

/// Vote payload recorded for a checkpoint submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub tx_hash: TxHash,
    pub votes: VoteSignatures,
}

/// Root-chain facts served by [`FixtureOracle`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleFixture {
    #[serde(default)]
    pub header_blocks: BTreeMap<u64, HeaderBlockInfo>,

    /// `None` models a lost root-chain connection
    #[serde(default)]
    pub latest_height: Option<u64>,

    /// Receipts with enough confirmations
    #[serde(default)]
    pub receipts: Vec<Receipt>,

    #[serde(default)]
    pub votes: Vec<VoteRecord>,

    #[serde(default)]
    pub delegators: Vec<Delegator>,
}

/// Oracle answering from an [`OracleFixture`]
#[derive(Debug, Default)]
pub struct FixtureOracle {
    fixture: RwLock<OracleFixture>,
}

impl FixtureOracle {
    pub fn new(fixture: OracleFixture) -> Self {
        Self {
            fixture: RwLock::new(fixture),
        }
    }

    pub fn from_json(json: &str) -> TidemarkResult<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> TidemarkResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn snapshot(&self) -> OracleFixture {
        self.fixture.read().clone()
    }

    pub fn set_latest_height(&self, height: Option<u64>) {
        self.fixture.write().latest_height = height;
    }

    pub fn add_header_block(&self, id: u64, header: HeaderBlockInfo) {
        self.fixture.write().header_blocks.insert(id, header);
    }

    pub fn add_receipt(&self, receipt: Receipt) {
        let mut fixture = self.fixture.write();
        fixture.receipts.retain(|r| r.tx_hash != receipt.tx_hash);
        fixture.receipts.push(receipt);
    }

    pub fn add_votes(&self, tx_hash: TxHash, votes: VoteSignatures) {
        let mut fixture = self.fixture.write();
        fixture.votes.retain(|r| r.tx_hash != tx_hash);
        fixture.votes.push(VoteRecord { tx_hash, votes });
    }

    pub fn add_delegator(&self, delegator: Delegator) {
        let mut fixture = self.fixture.write();
        fixture.delegators.retain(|d| d.id != delegator.id);
        fixture.delegators.push(delegator);
    }
}

impl RootChainOracle for FixtureOracle {
    fn header_block(&self, id: u64) -> TidemarkResult<HeaderBlockInfo> {
        self.fixture
            .read()
            .header_blocks
            .get(&id)
            .cloned()
            .ok_or(TidemarkError::BadAck)
    }

    fn latest_root_chain_height(&self) -> TidemarkResult<u64> {
        self.fixture.read().latest_height.ok_or(TidemarkError::NoConn)
    }

    fn confirmed_receipt(&self, tx_hash: &TxHash) -> TidemarkResult<Option<Receipt>> {
        Ok(self
            .fixture
            .read()
            .receipts
            .iter()
            .find(|r| &r.tx_hash == tx_hash)
            .cloned())
    }

    fn vote_signatures(&self, tx_hash: &TxHash) -> TidemarkResult<VoteSignatures> {
        self.fixture
            .read()
            .votes
            .iter()
            .find(|r| &r.tx_hash == tx_hash)
            .map(|r| r.votes.clone())
            .ok_or_else(|| TidemarkError::FetchCheckpointSigners(format!("no votes for {}", tx_hash)))
    }

    fn delegator(&self, id: DelegatorId) -> TidemarkResult<Delegator> {
        self.fixture
            .read()
            .delegators
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(TidemarkError::NoDelegator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(seed: u8) -> Receipt {
        Receipt {
            tx_hash: Hash([seed; 32]),
            block_number: 7,
            logs: vec![ReceiptLog {
                index: 0,
                event: RootChainEvent::DelegatorUnbond {
                    delegator_id: DelegatorId::new(1),
                    validator_id: ValidatorId::new(1),
                },
            }],
        }
    }

    #[test]
    fn test_missing_facts() {
        let oracle = FixtureOracle::default();
        assert_eq!(oracle.header_block(1), Err(TidemarkError::BadAck));
        assert_eq!(oracle.latest_root_chain_height(), Err(TidemarkError::NoConn));
        assert_eq!(oracle.confirmed_receipt(&Hash::ZERO), Ok(None));
        assert!(!oracle.is_tx_confirmed(&Hash::ZERO));
        assert_eq!(oracle.delegator(DelegatorId::new(1)), Err(TidemarkError::NoDelegator));
    }

    #[test]
    fn test_receipt_and_decode() {
        let oracle = FixtureOracle::default();
        oracle.add_receipt(receipt(1));
        oracle.add_receipt(receipt(1));
        assert_eq!(oracle.snapshot().receipts.len(), 1);

        let found = oracle.confirmed_receipt(&Hash([1; 32])).unwrap().unwrap();
        assert!(oracle.is_tx_confirmed(&Hash([1; 32])));
        assert!(oracle.decode_event(&found, 0, EventKind::DelegatorUnbond).is_ok());
        assert!(matches!(
            oracle.decode_event(&found, 0, EventKind::DelegatorBond),
            Err(TidemarkError::InvalidMsg(_))
        ));
    }

    #[test]
    fn test_fixture_json() {
        let oracle = FixtureOracle::default();
        oracle.set_latest_height(Some(42));
        oracle.add_receipt(receipt(2));
        oracle.add_header_block(
            10_000,
            HeaderBlockInfo {
                root_hash: Hash([3; 32]),
                start_block: 0,
                end_block: 99,
                created_at: 30,
                proposer: Address([4; 32]),
            },
        );

        let json = serde_json::to_string(&oracle.snapshot()).unwrap();
        let restored = FixtureOracle::from_json(&json).unwrap();
        assert_eq!(restored.snapshot(), oracle.snapshot());
        assert_eq!(restored.latest_root_chain_height(), Ok(42));
    }
}
