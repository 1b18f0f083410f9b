// Path: crates/cli/src/commands/generate.rs
use anyhow::{bail, Context, Result};
use clap::Parser;
use lachesis_consensus::replay::{record_epoch, Fixture};
use lachesis_test_utils::{gen_nodes, DagGenerator, TestRng};
use lachesis_types::app::{ValidatorSet, FIRST_EPOCH};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Number of validators, all of weight 1.
    #[clap(long, default_value = "5")]
    pub validators: u32,
    /// Number of events to generate.
    #[clap(long, default_value = "1000")]
    pub events: usize,
    /// Seed of the random generator.
    #[clap(long, default_value = "0")]
    pub seed: u64,
    /// How many of the highest validator ids fork.
    #[clap(long, default_value = "0")]
    pub cheaters: u32,
    /// Upper bound on parents per event, self-parent included.
    #[clap(long, default_value = "3")]
    pub max_parents: usize,
    /// Where to write the fixture.
    #[clap(long)]
    pub out: PathBuf,
    /// Also write the raw events, in generation order, for `ingest`.
    #[clap(long)]
    pub events_out: Option<PathBuf>,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    if args.validators == 0 {
        bail!("at least one validator is required");
    }
    // Forkers must stay below a third of the weight for the fixture to make progress.
    if args.cheaters.saturating_mul(3) >= args.validators {
        bail!(
            "{} cheater(s) out of {} validators reach a third of the weight",
            args.cheaters,
            args.validators
        );
    }

    let nodes = gen_nodes(args.validators);
    let validators = ValidatorSet::from_weights(nodes.iter().map(|id| (*id, 1)))?;
    let cheaters = (args.validators - args.cheaters + 1)..=args.validators;
    let mut rng = TestRng::new(args.seed);
    let events = DagGenerator::new(&nodes)
        .max_parents(args.max_parents)
        .cheaters(cheaters)
        .generate(args.events, &mut rng);

    let epoch = record_epoch(FIRST_EPOCH, validators, &events)?;
    tracing::info!(
        target: "replay",
        "Recorded {} events with {} atropoi",
        epoch.events.len(),
        epoch.atropoi.len()
    );
    let fixture = Fixture {
        epochs: vec![epoch],
    };
    fs::write(&args.out, fixture.to_json()?)
        .with_context(|| format!("writing {}", args.out.display()))?;

    if let Some(path) = &args.events_out {
        fs::write(path, serde_json::to_string_pretty(&events)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    println!("Wrote {} events to {}", events.len(), args.out.display());
    Ok(())
}
