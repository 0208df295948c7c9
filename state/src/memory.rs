//! In-memory state store for tests and one-shot runs

use std::collections::BTreeMap;
use std::ops::Bound;
use tidemark_core::{
    KvStore, StateChange, StateRoot, StateVersion, TidemarkResult, VersionedStore,
};

use crate::store::{compute_state_root, StateEntry};

/// In-memory state store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    version: StateVersion,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            data: data.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn all_entries(&self) -> Vec<StateEntry> {
        self.data
            .iter()
            .map(|(key, value)| StateEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Entries whose key starts with `prefix`, in key order
pub(crate) fn prefix_range(
    data: &BTreeMap<Vec<u8>, Vec<u8>>,
    prefix: &[u8],
) -> Vec<(Vec<u8>, Vec<u8>)> {
    data.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> TidemarkResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> TidemarkResult<bool> {
        Ok(self.data.contains_key(key))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> TidemarkResult<()> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> TidemarkResult<()> {
        self.data.remove(key);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> TidemarkResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(prefix_range(&self.data, prefix))
    }
}

impl VersionedStore for MemoryStore {
    fn version(&self) -> StateVersion {
        self.version
    }

    fn root(&self) -> TidemarkResult<StateRoot> {
        Ok(compute_state_root(&self.all_entries()))
    }

    fn apply_batch(&mut self, changes: Vec<StateChange>) -> TidemarkResult<StateVersion> {
        for change in changes {
            match change {
                StateChange::Set { key, value } => {
                    self.data.insert(key, value);
                }
                StateChange::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }

        self.version = self.version.next();
        Ok(self.version)
    }
}
