// Path: crates/cli/src/commands/check.rs
use anyhow::{Context, Result};
use clap::Parser;
use lachesis_consensus::replay::{check_fixture, Fixture};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Fixture file written by `generate`.
    #[clap(long)]
    pub fixture: PathBuf,
    /// Skip epochs below this one.
    #[clap(long)]
    pub epoch_min: Option<u32>,
    /// Skip epochs above this one.
    #[clap(long)]
    pub epoch_max: Option<u32>,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.fixture)
        .with_context(|| format!("reading {}", args.fixture.display()))?;
    let fixture = Fixture::from_json(&raw)?;
    let checked = check_fixture(&fixture, args.epoch_min, args.epoch_max)?;
    println!("{} epoch(s) of {} verified", checked, args.fixture.display());
    Ok(())
}
