// Path: crates/consensus/src/lib.rs
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
//! # Lachesis Consensus
//!
//! The ordering engine. Events enter through [`Orderer::process`]; the engine
//! assigns each a frame, detects roots, runs the leaderless election over
//! them and seals one block per decided frame, handing it to the application.
//! The application may end the epoch from any block by returning the next
//! validator set.
//!
//! The causality oracle is injected. [`DagIndex`] is the vector-clock
//! implementation shipped with the crate.

pub mod election;
pub mod forks;
pub mod frame;
pub mod input;
pub mod orderer;
pub mod replay;
pub mod roots;
pub mod store;
pub mod vecfc;

pub use election::{Decision, Election};
pub use frame::FrameInfo;
pub use input::MemoryEventSource;
pub use orderer::{Orderer, ProcessOutcome};
pub use roots::RootAndSlot;
pub use store::ConsensusStore;
pub use vecfc::DagIndex;
