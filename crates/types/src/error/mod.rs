// Path: crates/types/src/error/mod.rs

//! Error taxonomy of the ordering engine.
//!
//! Three classes matter to callers:
//! * [`ProtocolViolation`]: only possible with at least a third of the weight
//!   Byzantine or with a broken caller contract. Fatal; the engine halts.
//! * [`StorageError`]: the backend failed. Nothing was advanced and the same
//!   input may be retried.
//! * Everything else in [`ConsensusError`] rejects a single input and leaves
//!   the engine untouched.

use crate::app::{BlockKey, Epoch, EventHash, Frame, ValidatorId};
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised by a key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying database failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
    /// A record could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
    /// A stored record could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A record that must exist is missing.
    #[error("Record not found: {0}")]
    NotFound(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORAGE_BACKEND_ERROR",
            Self::Encode(_) => "STORAGE_ENCODE_ERROR",
            Self::Decode(_) => "STORAGE_DECODE_ERROR",
            Self::NotFound(_) => "STORAGE_NOT_FOUND",
        }
    }
}

/// Rejections of a malformed validator set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorSetError {
    /// The set has no members.
    #[error("Validator set is empty")]
    Empty,
    /// A member has zero weight.
    #[error("Validator {0} has zero weight")]
    ZeroWeight(ValidatorId),
    /// A member id appears twice.
    #[error("Validator {0} is listed twice")]
    Duplicate(ValidatorId),
    /// The total weight does not fit quorum arithmetic.
    #[error("Total validator weight overflows")]
    WeightOverflow,
}

impl ErrorCode for ValidatorSetError {
    fn code(&self) -> &'static str {
        match self {
            Self::Empty => "VALIDATORS_EMPTY",
            Self::ZeroWeight(_) => "VALIDATORS_ZERO_WEIGHT",
            Self::Duplicate(_) => "VALIDATORS_DUPLICATE",
            Self::WeightOverflow => "VALIDATORS_WEIGHT_OVERFLOW",
        }
    }
}

/// Errors raised by a causality oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The queried or referenced event was never added.
    #[error("Event {0} is unknown to the causality oracle")]
    UnknownEvent(EventHash),
    /// The event's creator is not in the oracle's validator set.
    #[error("Validator {0} is unknown to the causality oracle")]
    UnknownValidator(ValidatorId),
    /// The event was already added.
    #[error("Event {0} was already added to the causality oracle")]
    Duplicate(EventHash),
    /// The event's self-parent is missing or created by someone else.
    #[error("Event {0} has an invalid self-parent")]
    InvalidSelfParent(EventHash),
}

impl ErrorCode for OracleError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownEvent(_) => "ORACLE_UNKNOWN_EVENT",
            Self::UnknownValidator(_) => "ORACLE_UNKNOWN_VALIDATOR",
            Self::Duplicate(_) => "ORACLE_DUPLICATE_EVENT",
            Self::InvalidSelfParent(_) => "ORACLE_INVALID_SELF_PARENT",
        }
    }
}

/// Fatal inconsistencies. Once one is raised the engine refuses further input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A parent's frame is unknown: parents were not processed before the child.
    #[error("Event {event} references parent {parent} with no known frame")]
    InconsistentParentFrame {
        /// The event being framed.
        event: EventHash,
        /// The parent without a frame.
        parent: EventHash,
    },
    /// A frame was decided out of sequence.
    #[error("Decided frame {got} but expected frame {expected}")]
    FrameSkipped {
        /// `LastDecidedFrame + 1`.
        expected: Frame,
        /// The frame that was decided.
        got: Frame,
    },
    /// A block was sealed with a key not greater than the previous one.
    #[error("Block {got} sealed out of order after {last}")]
    BlockOutOfOrder {
        /// The last delivered block.
        last: BlockKey,
        /// The offending block.
        got: BlockKey,
    },
    /// A block already exists for this key.
    #[error("Block {0} already exists")]
    BlockOverwrite(BlockKey),
    /// The election reached a state only possible with a Byzantine supermajority.
    #[error("Election failed: {0}")]
    Election(String),
    /// A block was delivered but the follow-up state could not be persisted.
    #[error("Block delivery interrupted: {reason}")]
    CommitInterrupted {
        /// The underlying failure.
        reason: String,
    },
    /// The engine halted after an earlier violation.
    #[error("Engine halted after a protocol violation")]
    Halted,
}

impl ErrorCode for ProtocolViolation {
    fn code(&self) -> &'static str {
        match self {
            Self::InconsistentParentFrame { .. } => "PROTOCOL_INCONSISTENT_PARENT_FRAME",
            Self::FrameSkipped { .. } => "PROTOCOL_FRAME_SKIPPED",
            Self::BlockOutOfOrder { .. } => "PROTOCOL_BLOCK_OUT_OF_ORDER",
            Self::BlockOverwrite(_) => "PROTOCOL_BLOCK_OVERWRITE",
            Self::Election(_) => "PROTOCOL_ELECTION_FAILED",
            Self::CommitInterrupted { .. } => "PROTOCOL_COMMIT_INTERRUPTED",
            Self::Halted => "PROTOCOL_HALTED",
        }
    }
}

/// Top-level error of the ordering engine.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A fatal protocol violation.
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    /// The storage backend failed.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
    /// The causality oracle rejected an operation.
    #[error("Causality oracle error: {0}")]
    Oracle(#[from] OracleError),
    /// A supplied validator set is malformed.
    #[error("Invalid validator set: {0}")]
    InvalidValidators(#[from] ValidatorSetError),
    /// The event belongs to another epoch.
    #[error("Event {event} belongs to epoch {got}, current epoch is {expected}")]
    WrongEpoch {
        /// The rejected event.
        event: EventHash,
        /// The current epoch.
        expected: Epoch,
        /// The event's epoch.
        got: Epoch,
    },
    /// The event claims a frame that differs from the computed one.
    #[error("Event {event} claims frame {claimed}, computed frame is {computed}")]
    WrongFrame {
        /// The rejected event.
        event: EventHash,
        /// The frame the event carried.
        claimed: Frame,
        /// The frame the engine computed.
        computed: Frame,
    },
    /// The event was already ingested.
    #[error("Event {0} was already processed")]
    AlreadyProcessed(EventHash),
    /// The event's creator is not a member of the current validator set.
    #[error("Event {event} created by unknown validator {creator}")]
    UnknownCreator {
        /// The rejected event.
        event: EventHash,
        /// Its creator.
        creator: ValidatorId,
    },
    /// Genesis was applied before.
    #[error("Genesis was already applied")]
    GenesisAlreadyApplied,
    /// No genesis has been applied to the store.
    #[error("Genesis has not been applied")]
    GenesisMissing,
    /// The engine must be bootstrapped before ingesting.
    #[error("Engine is not bootstrapped")]
    NotBootstrapped,
    /// The engine was already bootstrapped.
    #[error("Engine is already bootstrapped")]
    AlreadyBootstrapped,
    /// An event required by bootstrap is absent from the event source.
    #[error("Event {0} is missing from the event source")]
    MissingEvent(EventHash),
}

impl ConsensusError {
    /// Whether the error halts the engine.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl ErrorCode for ConsensusError {
    fn code(&self) -> &'static str {
        match self {
            Self::Protocol(v) => v.code(),
            Self::Storage(e) => e.code(),
            Self::Oracle(e) => e.code(),
            Self::InvalidValidators(e) => e.code(),
            Self::WrongEpoch { .. } => "CONSENSUS_WRONG_EPOCH",
            Self::WrongFrame { .. } => "CONSENSUS_WRONG_FRAME",
            Self::AlreadyProcessed(_) => "CONSENSUS_ALREADY_PROCESSED",
            Self::UnknownCreator { .. } => "CONSENSUS_UNKNOWN_CREATOR",
            Self::GenesisAlreadyApplied => "CONSENSUS_GENESIS_ALREADY_APPLIED",
            Self::GenesisMissing => "CONSENSUS_GENESIS_MISSING",
            Self::NotBootstrapped => "CONSENSUS_NOT_BOOTSTRAPPED",
            Self::AlreadyBootstrapped => "CONSENSUS_ALREADY_BOOTSTRAPPED",
            Self::MissingEvent(_) => "CONSENSUS_MISSING_EVENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_protocol_violations_are_fatal() {
        let fatal: ConsensusError = ProtocolViolation::Halted.into();
        assert!(fatal.is_fatal());
        let storage: ConsensusError = StorageError::Backend("disk".into()).into();
        assert!(!storage.is_fatal());
        assert!(!ConsensusError::GenesisMissing.is_fatal());
    }

    #[test]
    fn wrapped_errors_keep_their_codes() {
        let e: ConsensusError = ProtocolViolation::FrameSkipped {
            expected: 3,
            got: 5,
        }
        .into();
        assert_eq!(e.code(), "PROTOCOL_FRAME_SKIPPED");
        let e: ConsensusError = StorageError::NotFound("epoch".into()).into();
        assert_eq!(e.code(), "STORAGE_NOT_FOUND");
        assert!(e.to_string().contains("epoch"));
    }
}
