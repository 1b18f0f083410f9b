// Path: crates/consensus/tests/ordering.rs
mod common;

use common::*;
use lachesis_storage::MemoryStore;
use lachesis_test_utils::{assert_ok, causal_shuffle, gen_nodes, DagGenerator, TestRng};
use lachesis_types::app::{Block, BlockKey, ValidatorSet};
use lachesis_types::error::ConsensusError;
use std::sync::{Arc, RwLock};
use std::thread;

#[test]
fn causal_permutations_elect_the_same_atropoi() {
    let mut rng = TestRng::new(42);
    let validators = equal_weights(5);
    let events = DagGenerator::new(&gen_nodes(5)).generate(600, &mut rng);

    let (mut engine, log) = mem_engine(&validators);
    ingest_all(&mut engine, &events);
    let expected = atropoi(&log);
    assert!(expected.len() >= 3, "too few blocks: {}", expected.len());

    for _ in 0..3 {
        let order = causal_shuffle(&events, &mut rng);
        let (mut engine, log) = mem_engine(&validators);
        ingest_all(&mut engine, &order);
        assert_eq!(atropoi(&log), expected);
    }
}

#[test]
fn frames_are_sealed_in_sequence() {
    let mut rng = TestRng::new(5);
    let validators = ValidatorSet::from_weights([(1, 5), (2, 4), (3, 3), (4, 2), (5, 1)]).unwrap();
    let events = DagGenerator::new(&gen_nodes(5)).generate(500, &mut rng);
    let (mut engine, log) = mem_engine(&validators);

    let mut last = 0;
    for outcome in ingest_all(&mut engine, &events) {
        for key in outcome.blocks {
            assert_eq!(key.epoch, 1);
            assert_eq!(key.frame, last + 1);
            last = key.frame;
        }
    }
    assert_eq!(engine.last_decided_frame(), Some(last));
    let blocks = log.lock().unwrap();
    assert_eq!(blocks.len() as u32, last);
    assert_eq!(engine.blocks(1).unwrap(), *blocks);
}

#[test]
fn a_forking_minority_does_not_stop_ordering() {
    let mut rng = TestRng::new(7);
    let validators = equal_weights(8);
    let events = DagGenerator::new(&gen_nodes(8))
        .max_parents(4)
        .cheaters([8])
        .generate(1_000, &mut rng);

    let (mut engine, log) = mem_engine(&validators);
    let outcomes = ingest_all(&mut engine, &events);
    let forks: Vec<_> = outcomes.iter().filter_map(|o| o.equivocation).collect();
    assert!(!forks.is_empty());
    assert!(forks.iter().all(|f| f.validator == 8 && f.existing != f.conflicting));
    assert_eq!(engine.cheaters(), vec![8]);

    let blocks = log.lock().unwrap().clone();
    assert!(blocks.len() >= 2, "too few blocks: {}", blocks.len());
    assert!(blocks.iter().all(|b| b.cheaters.is_empty() || b.cheaters == vec![8]));

    // Every node reaches the same blocks, cheater lists included.
    let order = causal_shuffle(&events, &mut rng);
    let (mut other, other_log) = mem_engine(&validators);
    ingest_all(&mut other, &order);
    assert_eq!(*other_log.lock().unwrap(), blocks);
}

#[test]
fn cheaters_just_under_a_third_agree_across_orders() {
    let mut rng = TestRng::new(23);
    // Two of seven equal validators fork: 2/7 of the weight, short of a third.
    let validators = equal_weights(7);
    let events = DagGenerator::new(&gen_nodes(7))
        .max_parents(5)
        .cheaters([6, 7])
        .fork_one_in(2)
        .generate(1_500, &mut rng);

    let (mut engine, log) = mem_engine(&validators);
    ingest_all(&mut engine, &events);
    let cheaters = engine.cheaters();
    assert!(!cheaters.is_empty());
    assert!(cheaters.iter().all(|c| [6, 7].contains(c)));

    let blocks = log.lock().unwrap().clone();
    assert!(!blocks.is_empty());
    assert!(blocks.iter().all(|b| b.cheaters.iter().all(|c| [6, 7].contains(c))));

    for _ in 0..3 {
        let order = causal_shuffle(&events, &mut rng);
        let (mut other, other_log) = mem_engine(&validators);
        ingest_all(&mut other, &order);
        assert_eq!(*other_log.lock().unwrap(), blocks);
        assert_eq!(other.cheaters(), cheaters);
    }
}

#[test]
fn epoch_seal_restarts_frames() {
    let mut rng = TestRng::new(9);
    let validators = equal_weights(4);
    let next = ValidatorSet::from_weights([(1, 2), (2, 2), (3, 1), (4, 1)]).unwrap();
    let requested = next.clone();
    let (mut engine, log) = engine_on(MemoryStore::new(), &validators, move |b: &Block| {
        (b.frame == 2).then(|| requested.clone())
    });

    let events = DagGenerator::new(&gen_nodes(4)).generate(400, &mut rng);
    let mut rest = events.iter();
    let mut sealed = None;
    for e in rest.by_ref() {
        let mut e = e.clone();
        assert_ok!(engine.build(&mut e));
        let outcome = assert_ok!(engine.process(&e));
        if outcome.sealed_epoch.is_some() {
            assert_eq!(outcome.blocks.last(), Some(&BlockKey { epoch: 1, frame: 2 }));
            sealed = outcome.sealed_epoch;
            break;
        }
    }
    assert_eq!(sealed, Some(2));
    assert_eq!(engine.epoch(), Some(2));
    assert_eq!(engine.validators(), Some(&next));
    assert_eq!(engine.last_decided_frame(), Some(0));
    assert_eq!(log.lock().unwrap().len(), 2);

    // Leftovers of the old epoch are refused without halting.
    if let Some(stale) = rest.next() {
        assert!(matches!(
            engine.process(stale),
            Err(ConsensusError::WrongEpoch { expected: 2, .. })
        ));
    }
    assert!(!engine.is_halted());

    // The sealed epoch's per-event records are gone, its blocks are not.
    let store = engine.store();
    assert!(store.event_records(1).unwrap().is_empty());
    assert_eq!(store.blocks(1).unwrap().len(), 2);
    assert_eq!(store.validators(2).unwrap(), Some(next.clone()));

    let events = DagGenerator::new(&gen_nodes(4)).epoch(2).generate(300, &mut rng);
    let outcomes = ingest_all(&mut engine, &events);
    assert!(events.first().is_some_and(|e| e.parents.is_empty()));
    for (outcome, event) in outcomes.iter().zip(&events) {
        if event.parents.is_empty() {
            assert_eq!((outcome.frame, outcome.is_root), (1, true));
        }
        if event.self_parent().is_none() {
            assert!(outcome.is_root, "first event of {} is not a root", event.creator);
        }
        assert!(outcome.blocks.iter().all(|key| key.epoch == 2));
    }
    let blocks = log.lock().unwrap();
    let epoch2: Vec<_> = blocks.iter().filter(|b| b.epoch == 2).collect();
    assert!(!epoch2.is_empty());
    assert_eq!(epoch2[0].frame, 1);
    assert_eq!(epoch2[0].validators, next);
}

#[test]
fn readers_share_the_engine() {
    let mut rng = TestRng::new(13);
    let validators = equal_weights(4);
    let events = DagGenerator::new(&gen_nodes(4)).generate(300, &mut rng);
    let (engine, _) = mem_engine(&validators);
    let engine: Arc<RwLock<MemEngine>> = Arc::new(RwLock::new(engine));

    let writer = {
        let engine = engine.clone();
        let events = events.clone();
        thread::spawn(move || {
            for e in &events {
                let mut e = e.clone();
                let mut guard = engine.write().unwrap();
                guard.build(&mut e).unwrap();
                guard.process(&e).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..200 {
                    let frame = engine.read().unwrap().last_decided_frame().unwrap();
                    assert!(frame >= last);
                    last = frame;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    let engine = engine.read().unwrap();
    assert!(events.iter().all(|e| engine.frame_of(&e.hash).is_some()));
}
