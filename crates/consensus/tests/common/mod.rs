// Path: crates/consensus/tests/common/mod.rs
#![allow(dead_code)]

use lachesis_api::consensus::FnCallbacks;
use lachesis_api::storage::KvStore;
use lachesis_consensus::{DagIndex, MemoryEventSource, Orderer, ProcessOutcome};
use lachesis_storage::MemoryStore;
use lachesis_types::app::{Block, Event, EventHash, Genesis, ValidatorSet};
use lachesis_types::config::ConsensusConfig;
use std::sync::{Arc, Mutex};

pub type MemEngine = Orderer<MemoryStore, DagIndex>;

/// Blocks delivered to the application, shared with the callbacks.
pub type BlockLog = Arc<Mutex<Vec<Block>>>;

pub fn equal_weights(n: u32) -> ValidatorSet {
    ValidatorSet::from_weights((1..=n).map(|id| (id, 1))).unwrap()
}

/// A bootstrapped engine over `kv` whose callbacks record every block and
/// return whatever `seal_at` returns.
pub fn engine_on<S: KvStore>(
    kv: S,
    validators: &ValidatorSet,
    seal_at: impl Fn(&Block) -> Option<ValidatorSet> + Send + 'static,
) -> (Orderer<S, DagIndex>, BlockLog) {
    let mut engine = Orderer::new(kv, DagIndex::new(), ConsensusConfig::default());
    engine
        .apply_genesis(&Genesis {
            epoch: 1,
            validators: validators.clone(),
        })
        .unwrap();
    let log = BlockLog::default();
    let sink = log.clone();
    engine
        .bootstrap(
            FnCallbacks(move |b: &Block| {
                sink.lock().unwrap().push(b.clone());
                seal_at(b)
            }),
            &MemoryEventSource::new(),
        )
        .unwrap();
    (engine, log)
}

pub fn mem_engine(validators: &ValidatorSet) -> (MemEngine, BlockLog) {
    engine_on(MemoryStore::new(), validators, |_| None)
}

/// Builds, then processes every event, panicking on the first failure.
pub fn ingest_all<S: KvStore>(
    engine: &mut Orderer<S, DagIndex>,
    events: &[Event],
) -> Vec<ProcessOutcome> {
    events
        .iter()
        .map(|e| {
            let mut e = e.clone();
            engine.build(&mut e).unwrap();
            engine.process(&e).unwrap()
        })
        .collect()
}

pub fn atropoi(log: &BlockLog) -> Vec<EventHash> {
    log.lock().unwrap().iter().map(|b| b.atropos).collect()
}

/// Callbacks that accept every block and never seal the epoch.
pub fn no_seal() -> FnCallbacks<fn(&Block) -> Option<ValidatorSet>> {
    FnCallbacks(|_| None)
}
