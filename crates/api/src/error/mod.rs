// Path: crates/api/src/error/mod.rs

//! Re-exports all core error types from the central `lachesis-types` crate.
pub use lachesis_types::error::*;
