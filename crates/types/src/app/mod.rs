// Path: crates/types/src/app/mod.rs

//! DAG and consensus records shared by every crate in the workspace.

/// Block, epoch and per-event bookkeeping records.
pub mod block;
/// The DAG event and its content-derived hash.
pub mod event;
/// The weighted validator set and quorum arithmetic.
pub mod validators;

pub use block::*;
pub use event::*;
pub use validators::*;

/// Epoch identifier. Epochs start at [`FIRST_EPOCH`] and increase by one per seal.
pub type Epoch = u32;
/// Frame number within an epoch. `0` means "not assigned yet".
pub type Frame = u32;
/// Lamport timestamp of an event: `1 + max(parents)`.
pub type Lamport = u32;
/// Per-creator sequence number, starting at 1 within each epoch.
pub type Seq = u32;
/// Validator identifier.
pub type ValidatorId = u32;
/// Voting weight of a validator.
pub type Weight = u64;

/// The epoch a fresh genesis starts in unless configured otherwise.
pub const FIRST_EPOCH: Epoch = 1;
/// The first frame of every epoch.
pub const FIRST_FRAME: Frame = 1;
