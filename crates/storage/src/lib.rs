// Path: crates/storage/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Key-value backends for the ordering engine.
//!
//! Two implementations of [`lachesis_api::storage::KvStore`] are provided: a
//! volatile [`MemoryStore`] for tests and replay, and a durable [`RedbStore`]
//! keeping every record in a single prefix-encoded `redb` table.

pub mod memory;
pub mod metrics;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use lachesis_api::storage::{KvStore, StorageError};
use lachesis_types::config::StoreConfig;

/// Opens the backend selected by `config`.
pub fn open(config: &StoreConfig) -> Result<Box<dyn KvStore>, StorageError> {
    match config {
        StoreConfig::Memory => Ok(Box::new(MemoryStore::new())),
        StoreConfig::Redb { path } => Ok(Box::new(RedbStore::open(path)?)),
    }
}
