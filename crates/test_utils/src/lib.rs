// Path: crates/test_utils/src/lib.rs
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

//! # Lachesis Test Utilities
//!
//! Seeded randomness, random event DAGs with optional forking validators,
//! causal-order shuffles and assertion macros shared by the workspace tests.

pub mod assertions;
pub mod dag;
pub mod randomness;

#[doc(hidden)]
pub use lachesis_types;

pub use dag::{causal_shuffle, gen_nodes, DagGenerator};
pub use randomness::TestRng;
