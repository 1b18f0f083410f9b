// Path: crates/consensus/tests/frames.rs
mod common;

use common::*;
use lachesis_test_utils::{assert_err, assert_ok, gen_nodes, DagGenerator, TestRng};
use lachesis_types::app::{Event, EventHash, Frame, ValidatorSet};
use lachesis_types::error::ConsensusError;
use std::collections::HashMap;

#[test]
fn lagging_validator_catches_up_in_one_event() {
    const GAP: u32 = 10_000;
    let validators = ValidatorSet::from_weights([(1, 1), (2, 3)]).unwrap();
    let (mut engine, _) = mem_engine(&validators);
    let mut lamport = 0;
    let mut emit = |engine: &mut MemEngine, creator, seq, parents: Vec<EventHash>| {
        lamport += 1;
        let mut e = Event::new(1, creator, seq, lamport, parents);
        assert_ok!(engine.build(&mut e));
        assert_ok!(engine.process(&e));
        e
    };

    let laggy = emit(&mut engine, 1, 1, vec![]);
    let mut parent = emit(&mut engine, 2, 1, vec![]);
    for _ in 0..GAP {
        parent = emit(&mut engine, 2, parent.seq + 1, vec![parent.hash]);
    }
    let last = emit(&mut engine, 1, laggy.seq + 1, vec![laggy.hash, parent.hash]);

    assert_eq!(last.frame, laggy.frame + GAP + 1);
    assert!(engine.is_root(&last.hash));
}

#[test]
fn roots_are_exclusive_and_frames_monotonic() {
    let mut rng = TestRng::new(11);
    let validators = equal_weights(5);
    let events = DagGenerator::new(&gen_nodes(5)).generate(500, &mut rng);
    let (mut engine, log) = mem_engine(&validators);
    let outcomes = ingest_all(&mut engine, &events);

    let frames: HashMap<EventHash, Frame> = events
        .iter()
        .zip(&outcomes)
        .map(|(e, o)| (e.hash, o.frame))
        .collect();
    for (event, outcome) in events.iter().zip(&outcomes) {
        for parent in &event.parents {
            assert!(frames[parent] <= outcome.frame);
        }
        // A root sits one frame above its highest parent, unless it opens its
        // creator's chain; parentless roots open frame 1.
        let highest = event.parents.iter().map(|p| frames[p]).max();
        if event.self_parent().is_none() {
            assert!(outcome.is_root);
            assert!(outcome.frame == highest.unwrap_or(1) || Some(outcome.frame - 1) == highest);
        } else if outcome.is_root {
            assert_eq!(Some(outcome.frame - 1), highest);
        } else {
            assert_eq!(Some(outcome.frame), highest);
        }
    }

    let mut seen = HashMap::new();
    for frame in 1..=frames.values().copied().max().unwrap() {
        for root in engine.frame_roots(frame) {
            assert_eq!(root.frame, frame);
            assert!(seen.insert(root.hash, frame).is_none(), "root in two frames");
        }
    }
    assert!(!log.lock().unwrap().is_empty());
}

#[test]
fn first_events_with_parents_are_roots() {
    let validators = equal_weights(4);
    let (mut engine, _) = mem_engine(&validators);
    let a1 = Event::new(1, 1, 1, 1, vec![]);
    assert_ok!(engine.process(&a1));
    for creator in 2..=4 {
        let first = Event::new(1, creator, 1, 2, vec![a1.hash]);
        let outcome = assert_ok!(engine.process(&first));
        assert_eq!((outcome.frame, outcome.is_root), (1, true));
    }
    assert_eq!(engine.frame_roots(1).len(), 4);

    // Seen by all four first roots, a1 is now forkless-caused by a quorum.
    let b1 = engine.frame_roots(1).iter().find(|r| r.validator == 2).unwrap().hash;
    let c1 = engine.frame_roots(1).iter().find(|r| r.validator == 3).unwrap().hash;
    let d1 = engine.frame_roots(1).iter().find(|r| r.validator == 4).unwrap().hash;
    let a2 = Event::new(1, 1, 2, 3, vec![a1.hash, b1, c1, d1]);
    let outcome = assert_ok!(engine.process(&a2));
    assert_eq!(outcome.frame, 1);
    assert!(!outcome.is_root);
}

#[test]
fn build_assigns_the_frame_process_will_compute() {
    let validators = equal_weights(3);
    let (mut engine, _) = mem_engine(&validators);
    let mut e = Event::new(1, 1, 1, 1, vec![]);
    let info = assert_ok!(engine.build(&mut e));
    assert_eq!((info.frame, info.is_root), (1, true));
    assert_eq!(e.frame, 1);
    // Building stages nothing.
    assert_eq!(engine.frame_of(&e.hash), None);
    assert_ok!(engine.build(&mut e));

    let outcome = assert_ok!(engine.process(&e));
    assert_eq!(outcome.frame, 1);
    assert!(outcome.is_root);
}

#[test]
fn claimed_frame_must_match() {
    let validators = equal_weights(3);
    let (mut engine, _) = mem_engine(&validators);
    let mut e = Event::new(1, 1, 1, 1, vec![]);
    e.frame = 4;
    let err = assert_err!(engine.process(&e));
    assert!(matches!(
        err,
        ConsensusError::WrongFrame {
            claimed: 4,
            computed: 1,
            ..
        }
    ));
    assert!(!engine.is_halted());

    e.frame = 0;
    assert_ok!(engine.process(&e));
}

#[test]
fn rejections_leave_the_engine_usable() {
    let validators = equal_weights(3);
    let (mut engine, _) = mem_engine(&validators);
    let e = Event::new(1, 1, 1, 1, vec![]);
    assert_ok!(engine.process(&e));

    assert!(matches!(
        engine.process(&e),
        Err(ConsensusError::AlreadyProcessed(_))
    ));
    assert!(matches!(
        engine.process(&Event::new(2, 1, 1, 1, vec![])),
        Err(ConsensusError::WrongEpoch {
            expected: 1,
            got: 2,
            ..
        })
    ));
    assert!(matches!(
        engine.process(&Event::new(1, 9, 1, 1, vec![])),
        Err(ConsensusError::UnknownCreator { creator: 9, .. })
    ));
    assert!(!engine.is_halted());
    assert_ok!(engine.process(&Event::new(1, 2, 1, 1, vec![])));
}
