// Path: crates/consensus/src/store.rs

//! Typed access to the engine's persisted state.
//!
//! All engine records live in one [`KvStore`] under the layout defined in
//! [`lachesis_types::keys`]. Reads decode through the canonical codec; writes
//! are staged in a [`StateBatch`] and committed in one atomic write.

use lachesis_api::storage::{KvStore, StorageError, WriteBatch};
use lachesis_types::app::{
    Block, BlockKey, Epoch, EpochState, EventHash, EventRecord, Frame, Genesis, Seq, ValidatorId,
    ValidatorSet,
};
use lachesis_types::codec::{from_bytes_canonical, to_bytes_canonical};
use lachesis_types::keys;
use parity_scale_codec::{Decode, Encode};
use std::collections::{BTreeSet, HashMap};

fn decode<T: Decode>(what: &str, bytes: &[u8]) -> Result<T, StorageError> {
    from_bytes_canonical(bytes).map_err(|e| StorageError::Decode(format!("{what}: {e}")))
}

fn encode<T: Encode>(value: &T) -> Result<Vec<u8>, StorageError> {
    to_bytes_canonical(value).map_err(StorageError::Encode)
}

fn corrupt_key(what: &str, key: &[u8]) -> StorageError {
    StorageError::Decode(format!("malformed {what} key 0x{}", hex::encode(key)))
}

/// Typed reader over the engine's key space.
#[derive(Debug)]
pub struct ConsensusStore<S> {
    kv: S,
}

impl<S: KvStore> ConsensusStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    fn load<T: Decode>(&self, what: &str, key: &[u8]) -> Result<Option<T>, StorageError> {
        self.kv
            .get(key)?
            .map(|bytes| decode(what, &bytes))
            .transpose()
    }

    pub fn genesis(&self) -> Result<Option<Genesis>, StorageError> {
        self.load("genesis", keys::GENESIS_KEY)
    }

    pub fn epoch_state(&self) -> Result<Option<EpochState>, StorageError> {
        self.load("epoch state", keys::EPOCH_STATE_KEY)
    }

    /// The last decided frame of the current epoch; 0 when nothing was decided.
    pub fn last_decided(&self) -> Result<Frame, StorageError> {
        Ok(self
            .load("last decided frame", keys::LAST_DECIDED_KEY)?
            .unwrap_or(0))
    }

    pub fn last_block(&self) -> Result<Option<BlockKey>, StorageError> {
        self.load("last block", keys::LAST_BLOCK_KEY)
    }

    pub fn block(&self, key: BlockKey) -> Result<Option<Block>, StorageError> {
        self.load("block", &keys::block_key(key))
    }

    pub fn has_block(&self, key: BlockKey) -> Result<bool, StorageError> {
        Ok(self.kv.get(&keys::block_key(key))?.is_some())
    }

    /// All blocks of `epoch`, in frame order.
    pub fn blocks(&self, epoch: Epoch) -> Result<Vec<Block>, StorageError> {
        self.kv
            .scan_prefix(&keys::block_prefix(epoch))?
            .iter()
            .map(|(_, v)| decode("block", v))
            .collect()
    }

    /// The validator snapshot of `epoch`.
    pub fn validators(&self, epoch: Epoch) -> Result<Option<ValidatorSet>, StorageError> {
        self.load("validators", &keys::validators_key(epoch))
    }

    /// Every `(frame, is_root)` record of `epoch`.
    pub fn event_records(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<(EventHash, EventRecord)>, StorageError> {
        let prefix = keys::event_prefix(epoch);
        self.kv
            .scan_prefix(&prefix)?
            .iter()
            .map(|(k, v)| {
                let raw = k
                    .strip_prefix(prefix.as_slice())
                    .and_then(|h| <[u8; 32]>::try_from(h).ok())
                    .ok_or_else(|| corrupt_key("event", k))?;
                Ok((EventHash(raw), decode("event record", v)?))
            })
            .collect()
    }

    /// Every root of `epoch` as `(frame, validator, hash)`, in key order.
    pub fn roots(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<(Frame, ValidatorId, EventHash)>, StorageError> {
        self.kv
            .scan_prefix(&keys::root_prefix(epoch))?
            .iter()
            .map(|(k, _)| keys::parse_root_key(epoch, k).ok_or_else(|| corrupt_key("root", k)))
            .collect()
    }

    /// The first-seen hash of every `(creator, seq)` of `epoch`.
    pub fn seq_index(
        &self,
        epoch: Epoch,
    ) -> Result<HashMap<(ValidatorId, Seq), EventHash>, StorageError> {
        self.kv
            .scan_prefix(&keys::seq_prefix(epoch))?
            .iter()
            .map(|(k, v)| {
                let slot = keys::parse_seq_key(epoch, k).ok_or_else(|| corrupt_key("seq", k))?;
                Ok((slot, decode("seq entry", v)?))
            })
            .collect()
    }

    pub fn cheaters(&self, epoch: Epoch) -> Result<BTreeSet<ValidatorId>, StorageError> {
        self.kv
            .scan_prefix(&keys::cheater_prefix(epoch))?
            .iter()
            .map(|(k, _)| {
                keys::parse_cheater_key(epoch, k).ok_or_else(|| corrupt_key("cheater", k))
            })
            .collect()
    }

    /// Applies the staged batch atomically.
    pub fn commit(&self, batch: StateBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.kv.write(batch.inner)
    }
}

/// Typed writes staged for one atomic commit.
#[derive(Debug, Default)]
pub struct StateBatch {
    inner: WriteBatch,
}

impl StateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn put_genesis(&mut self, genesis: &Genesis) -> Result<(), StorageError> {
        self.inner.put(keys::GENESIS_KEY, encode(genesis)?);
        Ok(())
    }

    pub fn put_epoch_state(&mut self, state: &EpochState) -> Result<(), StorageError> {
        self.inner.put(keys::EPOCH_STATE_KEY, encode(state)?);
        Ok(())
    }

    pub fn put_validators(
        &mut self,
        epoch: Epoch,
        validators: &ValidatorSet,
    ) -> Result<(), StorageError> {
        self.inner.put(keys::validators_key(epoch), encode(validators)?);
        Ok(())
    }

    pub fn put_last_decided(&mut self, frame: Frame) -> Result<(), StorageError> {
        self.inner.put(keys::LAST_DECIDED_KEY, encode(&frame)?);
        Ok(())
    }

    pub fn put_last_block(&mut self, key: BlockKey) -> Result<(), StorageError> {
        self.inner.put(keys::LAST_BLOCK_KEY, encode(&key)?);
        Ok(())
    }

    pub fn put_block(&mut self, block: &Block) -> Result<(), StorageError> {
        self.inner.put(keys::block_key(block.key()), encode(block)?);
        Ok(())
    }

    pub fn put_event(
        &mut self,
        epoch: Epoch,
        hash: &EventHash,
        record: EventRecord,
    ) -> Result<(), StorageError> {
        self.inner.put(keys::event_key(epoch, hash), encode(&record)?);
        Ok(())
    }

    pub fn put_root(
        &mut self,
        epoch: Epoch,
        frame: Frame,
        validator: ValidatorId,
        hash: &EventHash,
    ) {
        self.inner
            .put(keys::root_key(epoch, frame, validator, hash), Vec::new());
    }

    pub fn put_seq(
        &mut self,
        epoch: Epoch,
        creator: ValidatorId,
        seq: Seq,
        hash: &EventHash,
    ) -> Result<(), StorageError> {
        self.inner.put(keys::seq_key(epoch, creator, seq), encode(hash)?);
        Ok(())
    }

    pub fn put_cheater(&mut self, epoch: Epoch, validator: ValidatorId) {
        self.inner.put(keys::cheater_key(epoch, validator), Vec::new());
    }

    /// Deletes the per-event records of `epoch`. Blocks and validator snapshots stay.
    pub fn drop_epoch(&mut self, epoch: Epoch) {
        self.inner.delete_prefix(keys::event_prefix(epoch));
        self.inner.delete_prefix(keys::root_prefix(epoch));
        self.inner.delete_prefix(keys::seq_prefix(epoch));
        self.inner.delete_prefix(keys::cheater_prefix(epoch));
    }
}
