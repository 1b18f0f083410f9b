// Path: crates/api/src/lib.rs

//! # Lachesis API Crate Lints
//!
//! This crate enforces a strict set of lints to ensure panic-free, documented
//! code. Panics are disallowed in non-test code.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
#![deny(missing_docs)]
//! # Lachesis API
//!
//! The narrow contracts between the ordering engine and its collaborators:
//! the causality oracle, the event source, the key-value store and the
//! application receiving sealed blocks.

/// Application callbacks invoked once per sealed block.
pub mod consensus;
/// Re-exports all error types from the central `lachesis-types` crate.
pub mod error;
/// Read access to the event DAG.
pub mod events;
/// The causality oracle contract.
pub mod oracle;
/// The ordered key-value store contract.
pub mod storage;

/// A curated set of the most commonly used traits and types.
pub mod prelude {
    pub use crate::consensus::{BlockCallbacks, ConsensusCallbacks, FnCallbacks};
    pub use crate::events::EventSource;
    pub use crate::oracle::CausalityOracle;
    pub use crate::storage::{KvStore, WriteBatch};
}
