// Path: crates/cli/src/main.rs
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

//! # Lachesis CLI
//!
//! Replays regression fixtures, records new ones from random DAGs, and drives
//! a persistent ordering engine from an event file.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lachesis_telemetry::init::{init_tracing_with, LogFormat};

mod commands;

use commands::*;

#[derive(Parser, Debug)]
#[clap(
    name = "lachesis",
    version,
    about = "Tools for the Lachesis aBFT ordering engine."
)]
struct Cli {
    /// Print human-readable logs instead of JSON.
    #[clap(long, global = true)]
    pretty: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded fixture and compare the elected Atropoi.
    Check(check::CheckArgs),

    /// Record a fixture from a random event DAG.
    Generate(generate::GenerateArgs),

    /// Feed an event file through an engine backed by the configured store.
    Ingest(ingest::IngestArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.pretty {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    init_tracing_with(format, "info")?;

    match cli.command {
        Commands::Check(args) => check::run(args),
        Commands::Generate(args) => generate::run(args),
        Commands::Ingest(args) => ingest::run(args),
    }
}
