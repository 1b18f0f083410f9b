// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]
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

//! # Lachesis Types
//!
//! The foundational library of the Lachesis ordering engine, containing the DAG
//! primitives, the weighted validator set, block and epoch records, the canonical
//! codec, the error taxonomy and the configuration objects.
//!
//! ## Architectural Role
//!
//! As the base crate, `lachesis-types` has minimal dependencies and is itself a
//! dependency of every other crate in the workspace. Keeping the shared
//! definitions here prevents circular dependencies between the collaborator
//! traits (`lachesis-api`), the storage backends and the engine.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::ConsensusError> = std::result::Result<T, E>;

/// DAG and consensus records: `Event`, `ValidatorSet`, `Block` and friends.
pub mod app;
/// The canonical, deterministic binary codec for persisted records.
pub mod codec;
/// Configuration structures for the engine, its store and genesis.
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// The persisted key layout.
pub mod keys;
