// Path: crates/cli/src/commands/mod.rs
pub mod check;
pub mod generate;
pub mod ingest;
