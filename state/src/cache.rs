//! Write-buffering overlay used to make each transaction all-or-nothing
//!
//! Reads fall through to the parent store; writes stay in the overlay until
//! the caller turns them into a [`StateChange`] batch. Dropping the cache
//! discards everything the transaction wrote.

use std::collections::BTreeMap;
use tidemark_core::{KvStore, StateChange, TidemarkResult};

use crate::memory::prefix_range;

/// Overlay over a read-only parent store
pub struct CacheStore<'a> {
    parent: &'a dyn KvStore,
    /// `None` marks a deletion
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> CacheStore<'a> {
    pub fn new(parent: &'a dyn KvStore) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Number of keys touched so far
    pub fn dirty_len(&self) -> usize {
        self.writes.len()
    }

    /// Buffered writes in key order
    pub fn into_changes(self) -> Vec<StateChange> {
        self.writes
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => StateChange::Set { key, value },
                None => StateChange::Delete { key },
            })
            .collect()
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> TidemarkResult<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> TidemarkResult<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> TidemarkResult<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> TidemarkResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.iter_prefix(prefix)?.into_iter().collect();

        for (key, value) in self.writes.iter().filter(|(key, _)| key.starts_with(prefix)) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(prefix_range(&merged, prefix))
    }
}
