// Path: crates/storage/src/memory.rs
use crate::metrics::metrics;
use lachesis_api::storage::{BatchOp, KvStore, StorageError, WriteBatch};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A volatile, ordered in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("memory store lock poisoned".into())
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self.map.read().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let guard = self.map.read().map_err(poisoned)?;
        Ok(guard
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let bytes = batch.bytes_written();
        let mut guard = self.map.write().map_err(poisoned)?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(k, v) => {
                    guard.insert(k, v);
                }
                BatchOp::Delete(k) => {
                    guard.remove(&k);
                }
                BatchOp::DeletePrefix(p) => {
                    guard.retain(|k, _| !k.starts_with(&p));
                }
            }
        }
        metrics().inc_bytes_written_total(bytes);
        metrics().inc_batches_committed();
        Ok(())
    }
}
