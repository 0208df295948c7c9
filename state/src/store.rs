//! Shared state primitives: entries and the state root

use serde::{Deserialize, Serialize};
use tidemark_core::{Hash, StateRoot};
use tidemark_crypto::hashing::{hash_multiple, merkle_root};

/// State entry for merkle tree computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl StateEntry {
    pub fn hash(&self) -> Hash {
        // length prefix keeps (ab, c) and (a, bc) apart
        let key_len = (self.key.len() as u64).to_be_bytes();
        hash_multiple(&[&key_len, &self.key, &self.value])
    }
}

/// Compute state root from entries
pub fn compute_state_root(entries: &[StateEntry]) -> StateRoot {
    if entries.is_empty() {
        return Hash::ZERO;
    }

    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let leaves: Vec<Hash> = sorted.iter().map(|e| e.hash()).collect();
    merkle_root(&leaves)
}
