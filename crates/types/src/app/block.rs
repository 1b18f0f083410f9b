// Path: crates/types/src/app/block.rs
use super::{Epoch, EventHash, Frame, Seq, ValidatorId, ValidatorSet};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a block: one per decided `(epoch, frame)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct BlockKey {
    /// The epoch the frame was decided in.
    pub epoch: Epoch,
    /// The decided frame.
    pub frame: Frame,
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch, self.frame)
    }
}

/// The sealed result of deciding one frame.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Block {
    /// The epoch the frame was decided in.
    pub epoch: Epoch,
    /// The decided frame.
    pub frame: Frame,
    /// The frame's elected anchor event.
    pub atropos: EventHash,
    /// Validators the Atropos observes forking, in canonical validator order.
    pub cheaters: Vec<ValidatorId>,
    /// The validator set in force when the block was sealed.
    pub validators: ValidatorSet,
}

impl Block {
    /// The `(epoch, frame)` key of this block.
    pub fn key(&self) -> BlockKey {
        BlockKey {
            epoch: self.epoch,
            frame: self.frame,
        }
    }
}

/// The persisted epoch registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct EpochState {
    /// Current epoch.
    pub epoch: Epoch,
    /// Validator set in force for the epoch.
    pub validators: ValidatorSet,
}

/// The starting point of a chain: an epoch and its validator set.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Genesis {
    /// First epoch.
    pub epoch: Epoch,
    /// Validator set of the first epoch.
    pub validators: ValidatorSet,
}

/// What the engine remembers about a processed event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EventRecord {
    /// Assigned frame.
    pub frame: Frame,
    /// Whether the event is a root of `frame`.
    pub is_root: bool,
}

/// Two distinct events sharing a `(creator, seq)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivocation {
    /// The forking validator.
    pub validator: ValidatorId,
    /// The contested sequence number.
    pub seq: Seq,
    /// The event seen first.
    pub existing: EventHash,
    /// The event that collided with it.
    pub conflicting: EventHash,
}
