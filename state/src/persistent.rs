//! Persistent state store using sled database

use sled::transaction::TransactionResult;
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tidemark_core::{
    KvStore, StateChange, StateRoot, StateVersion, TidemarkError, TidemarkResult,
    VersionedStore,
};
use tracing::{debug, error};

use crate::store::{compute_state_root, StateEntry};

const STATE_TREE: &str = "state";
const META_TREE: &str = "meta";
const VERSION_KEY: &[u8] = b"version";

fn storage_err(err: sled::Error) -> TidemarkError {
    TidemarkError::StorageError(err.to_string())
}

/// Persistent state store backed by sled database
pub struct PersistentStore {
    db: Db,
    state: Tree,
    meta: Tree,
    version: StateVersion,
}

impl PersistentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> TidemarkResult<Self> {
        let db = sled::open(path).map_err(storage_err)?;
        let state = db.open_tree(STATE_TREE).map_err(storage_err)?;
        let meta = db.open_tree(META_TREE).map_err(storage_err)?;

        // Load version from disk or start at 0
        let version = match meta.get(VERSION_KEY).map_err(storage_err)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    TidemarkError::StateCorruption("malformed version record".to_string())
                })?;
                StateVersion::new(u64::from_be_bytes(raw))
            }
            None => StateVersion::new(0),
        };

        debug!(version = version.0, "Opened persistent store");

        Ok(Self {
            db,
            state,
            meta,
            version,
        })
    }

    pub fn all_entries(&self) -> TidemarkResult<Vec<StateEntry>> {
        self.state
            .iter()
            .map(|result| {
                result
                    .map(|(key, value)| StateEntry {
                        key: key.to_vec(),
                        value: value.to_vec(),
                    })
                    .map_err(storage_err)
            })
            .collect()
    }

    pub fn compute_root(&self) -> TidemarkResult<StateRoot> {
        Ok(compute_state_root(&self.all_entries()?))
    }

    pub fn flush(&self) -> TidemarkResult<()> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl KvStore for PersistentStore {
    fn get(&self, key: &[u8]) -> TidemarkResult<Option<Vec<u8>>> {
        self.state
            .get(key)
            .map(|opt| opt.map(|v| v.to_vec()))
            .map_err(storage_err)
    }

    fn has(&self, key: &[u8]) -> TidemarkResult<bool> {
        self.state.contains_key(key).map_err(storage_err)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> TidemarkResult<()> {
        self.state.insert(key, value).map_err(storage_err)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> TidemarkResult<()> {
        self.state.remove(key).map_err(storage_err)?;
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> TidemarkResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.state
            .scan_prefix(prefix)
            .map(|result| {
                result
                    .map(|(key, value)| (key.to_vec(), value.to_vec()))
                    .map_err(storage_err)
            })
            .collect()
    }
}

impl VersionedStore for PersistentStore {
    fn version(&self) -> StateVersion {
        self.version
    }

    fn root(&self) -> TidemarkResult<StateRoot> {
        self.compute_root().map_err(|err| {
            error!(error = %err, "Failed to compute state root");
            err
        })
    }

    /// Data and version land in one sled transaction
    fn apply_batch(&mut self, changes: Vec<StateChange>) -> TidemarkResult<StateVersion> {
        let new_version = self.version.next();

        let mut batch = sled::Batch::default();
        for change in changes {
            match change {
                StateChange::Set { key, value } => batch.insert(key, value),
                StateChange::Delete { key } => batch.remove(key),
            }
        }

        let committed: TransactionResult<()> =
            (&self.state, &self.meta).transaction(|(state, meta)| {
                state.apply_batch(&batch)?;
                meta.insert(VERSION_KEY, &new_version.0.to_be_bytes()[..])?;
                Ok(())
            });
        committed.map_err(|err| TidemarkError::StorageError(format!("{:?}", err)))?;

        self.flush()?;
        self.version = new_version;

        debug!(version = new_version.0, "Committed state batch");
        Ok(new_version)
    }
}
