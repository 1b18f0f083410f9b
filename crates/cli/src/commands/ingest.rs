// Path: crates/cli/src/commands/ingest.rs
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use lachesis_api::consensus::FnCallbacks;
use lachesis_consensus::{DagIndex, MemoryEventSource, Orderer};
use lachesis_storage::metrics as storage_metrics;
use lachesis_telemetry::sinks as telemetry_sinks;
use lachesis_types::app::{Block, Event, Genesis};
use lachesis_types::config::{ConsensusConfig, GenesisConfig};
use lachesis_types::error::ConsensusError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Parser, Debug)]
pub struct IngestArgs {
    /// Genesis file (TOML): starting epoch and validators.
    #[clap(long)]
    pub genesis: PathBuf,
    /// Events to ingest (JSON array).
    #[clap(long)]
    pub events: PathBuf,
    /// Engine configuration (TOML). Defaults to an in-memory store.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Seal the epoch after every N-th frame, keeping the validator set.
    #[clap(long)]
    pub seal_every: Option<u32>,
    /// Print Prometheus metrics when done.
    #[clap(long)]
    pub metrics: bool,
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn install_metrics() -> Result<()> {
    let sink = lachesis_telemetry::prometheus::install()?;
    telemetry_sinks::SINK
        .set(sink)
        .map_err(|_| anyhow!("metrics sink already installed"))?;
    storage_metrics::SINK
        .set(sink.as_storage())
        .map_err(|_| anyhow!("storage metrics sink already installed"))?;
    Ok(())
}

pub fn run(args: IngestArgs) -> Result<()> {
    if args.metrics {
        install_metrics()?;
    }
    let genesis = Genesis::try_from(read_toml::<GenesisConfig>(&args.genesis)?)?;
    let config: ConsensusConfig = match &args.config {
        Some(path) => read_toml(path)?,
        None => ConsensusConfig::default(),
    };
    let raw = fs::read_to_string(&args.events)
        .with_context(|| format!("reading {}", args.events.display()))?;
    let mut events: Vec<Event> = serde_json::from_str(&raw)?;
    events.sort_by_key(|e| (e.lamport, e.hash));

    let kv = lachesis_storage::open(&config.store)?;
    let mut engine = Orderer::new(kv, DagIndex::new(), config);
    match engine.apply_genesis(&genesis) {
        Ok(()) | Err(ConsensusError::GenesisAlreadyApplied) => {}
        Err(e) => return Err(e.into()),
    }

    let delivered: Arc<Mutex<Vec<Block>>> = Arc::default();
    let sink = delivered.clone();
    let seal_every = args.seal_every.filter(|n| *n > 0);
    let callbacks = FnCallbacks(move |block: &Block| {
        if let Ok(mut blocks) = sink.lock() {
            blocks.push(block.clone());
        }
        seal_every
            .filter(|n| block.frame % n == 0)
            .map(|_| block.validators.clone())
    });
    let source: MemoryEventSource = events.iter().cloned().collect();
    engine.bootstrap(callbacks, &source)?;

    let (mut processed, mut skipped) = (0usize, 0usize);
    for event in &events {
        if engine.frame_of(&event.hash).is_some() {
            continue;
        }
        let mut event = event.clone();
        let result = engine
            .build(&mut event)
            .and_then(|_| engine.process(&event));
        match result {
            Ok(_) => processed += 1,
            Err(e) if e.is_fatal() => bail!("engine halted at event {}: {}", event.hash, e),
            Err(e) => {
                warn!(target: "consensus", "Skipping event {}: {}", event.hash, e);
                skipped += 1;
            }
        }
    }

    let blocks = delivered
        .lock()
        .map_err(|_| anyhow!("block log poisoned"))?;
    for block in blocks.iter() {
        println!("{}", serde_json::to_string(block)?);
    }
    eprintln!(
        "processed {} event(s), skipped {}, delivered {} block(s); now at epoch {:?}, frame {:?}",
        processed,
        skipped,
        blocks.len(),
        engine.epoch(),
        engine.last_decided_frame()
    );
    if args.metrics {
        print!("{}", lachesis_telemetry::prometheus::render()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{check, generate};

    #[test]
    fn generated_events_ingest_into_redb_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.json");
        let events = dir.path().join("events.json");
        generate::run(generate::GenerateArgs {
            validators: 4,
            events: 300,
            seed: 11,
            cheaters: 1,
            max_parents: 3,
            out: fixture.clone(),
            events_out: Some(events.clone()),
        })
        .unwrap();
        check::run(check::CheckArgs {
            fixture,
            epoch_min: None,
            epoch_max: None,
        })
        .unwrap();

        let genesis = dir.path().join("genesis.toml");
        fs::write(
            &genesis,
            "[[validators]]\nid = 1\nweight = 1\n[[validators]]\nid = 2\nweight = 1\n\
             [[validators]]\nid = 3\nweight = 1\n[[validators]]\nid = 4\nweight = 1\n",
        )
        .unwrap();
        let config = dir.path().join("engine.toml");
        fs::write(
            &config,
            format!(
                "[store]\nbackend = \"redb\"\npath = {:?}\n",
                dir.path().join("state.redb")
            ),
        )
        .unwrap();

        let args = || IngestArgs {
            genesis: genesis.clone(),
            events: events.clone(),
            config: Some(config.clone()),
            seal_every: None,
            metrics: false,
        };
        run(args()).unwrap();
        // A second run finds genesis and every event already in the store.
        run(args()).unwrap();
    }

    #[test]
    fn too_many_cheaters_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate::run(generate::GenerateArgs {
            validators: 3,
            events: 10,
            seed: 0,
            cheaters: 1,
            max_parents: 3,
            out: dir.path().join("f.json"),
            events_out: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("third"));
    }
}
