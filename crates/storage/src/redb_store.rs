// Path: crates/storage/src/redb_store.rs
use crate::metrics::metrics;
use lachesis_api::storage::{BatchOp, KvStore, StorageError, WriteBatch};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

/// Every engine record, keyed by the prefix-encoded layout of `lachesis_types::keys`.
const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("RECORDS");

fn backend<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// A durable store backed by a single `redb` table.
///
/// Each [`WriteBatch`] is applied in one write transaction, so a crash either
/// keeps or loses the whole batch.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens (or creates) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;

        // Ensure the table exists so read transactions never see it missing.
        {
            let w = db.begin_write().map_err(backend)?;
            {
                w.open_table(RECORDS).map_err(backend)?;
            }
            w.commit().map_err(backend)?;
        }

        tracing::info!(
            target: "storage",
            path = %path.as_ref().display(),
            "opened redb store"
        );
        Ok(Self { db: Arc::new(db) })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let r = self.db.begin_read().map_err(backend)?;
        let t = r.open_table(RECORDS).map_err(backend)?;
        let out = t.get(key).map_err(backend)?.map(|v| v.value().to_vec());
        Ok(out)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let r = self.db.begin_read().map_err(backend)?;
        let t = r.open_table(RECORDS).map_err(backend)?;
        let mut out = Vec::new();
        for row in t.range(prefix..).map_err(backend)? {
            let (k, v) = row.map_err(backend)?;
            if !k.value().starts_with(prefix) {
                break;
            }
            out.push((k.value().to_vec(), v.value().to_vec()));
        }
        Ok(out)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let bytes = batch.bytes_written();
        let ops = batch.len();
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut table = w.open_table(RECORDS).map_err(backend)?;
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put(k, v) => {
                        table.insert(k.as_slice(), v.as_slice()).map_err(backend)?;
                    }
                    BatchOp::Delete(k) => {
                        table.remove(k.as_slice()).map_err(backend)?;
                    }
                    BatchOp::DeletePrefix(p) => {
                        let keys: Vec<Vec<u8>> = table
                            .range(p.as_slice()..)
                            .map_err(backend)?
                            .take_while(|r| {
                                r.as_ref()
                                    .is_ok_and(|(k, _)| k.value().starts_with(p.as_slice()))
                            })
                            .map(|r| r.map(|(k, _)| k.value().to_vec()))
                            .collect::<Result<_, _>>()
                            .map_err(backend)?;
                        for key in keys {
                            table.remove(key.as_slice()).map_err(backend)?;
                        }
                    }
                }
            }
        }
        w.commit().map_err(backend)?;

        tracing::trace!(target: "storage", ops, bytes, "committed write batch");
        metrics().inc_bytes_written_total(bytes);
        metrics().inc_batches_committed();
        Ok(())
    }
}
