// Path: crates/consensus/src/replay.rs

//! Regression replay of recorded event sets.
//!
//! A [`Fixture`] holds, per epoch, the validator set, every event with its
//! recorded hash and frame, and the Atropos sequence a previous run elected.
//! [`check_epoch`] replays one epoch on a fresh in-memory engine in ascending
//! Lamport order and compares the elected Atropoi position by position.

use crate::input::MemoryEventSource;
use crate::orderer::Orderer;
use crate::vecfc::DagIndex;
use lachesis_api::consensus::FnCallbacks;
use lachesis_storage::MemoryStore;
use lachesis_types::app::{
    Block, Epoch, Event, EventHash, Frame, Genesis, Lamport, Seq, ValidatorId, ValidatorSet,
};
use lachesis_types::config::ConsensusConfig;
use lachesis_types::error::{ConsensusError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureEvent {
    pub hash: EventHash,
    pub creator: ValidatorId,
    pub seq: Seq,
    pub lamport: Lamport,
    /// The frame assigned when the event was recorded; 0 if unknown.
    #[serde(default)]
    pub frame: Frame,
    pub parents: Vec<EventHash>,
}

/// One recorded epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureEpoch {
    pub epoch: Epoch,
    pub validators: ValidatorSet,
    pub events: Vec<FixtureEvent>,
    /// Elected Atropoi in frame order.
    pub atropoi: Vec<EventHash>,
}

/// A recorded event set, one entry per epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub epochs: Vec<FixtureEpoch>,
}

impl Fixture {
    pub fn from_json(s: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The lowest and highest recorded epoch.
    pub fn epoch_range(&self) -> Option<(Epoch, Epoch)> {
        let min = self.epochs.iter().map(|e| e.epoch).min()?;
        let max = self.epochs.iter().map(|e| e.epoch).max()?;
        Some((min, max))
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Epoch {epoch}: event {event} references parent {parent} absent from the fixture")]
    IncompleteFixture {
        epoch: Epoch,
        event: EventHash,
        parent: EventHash,
    },
    #[error("Epoch {epoch}: event {event} recorded at frame {recorded}, rebuilt at {rebuilt}")]
    FrameMismatch {
        epoch: Epoch,
        event: EventHash,
        recorded: Frame,
        rebuilt: Frame,
    },
    #[error("Epoch {epoch}: expected at least {expected} atropoi, got {got}")]
    AtroposCount {
        epoch: Epoch,
        expected: usize,
        got: usize,
    },
    #[error("Epoch {epoch}: atropos at position {position} is {got}, expected {expected}")]
    AtroposMismatch {
        epoch: Epoch,
        position: usize,
        expected: EventHash,
        got: EventHash,
    },
    #[error("Invalid epoch range [{min}, {max}]")]
    InvalidRange { min: Epoch, max: Epoch },
    #[error("Fixture contains no epochs")]
    Empty,
    #[error("Epoch {epoch}: {source}")]
    Consensus {
        epoch: Epoch,
        #[source]
        source: ConsensusError,
    },
    #[error("Malformed fixture: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for ReplayError {
    fn code(&self) -> &'static str {
        match self {
            Self::IncompleteFixture { .. } => "REPLAY_INCOMPLETE_FIXTURE",
            Self::FrameMismatch { .. } => "REPLAY_FRAME_MISMATCH",
            Self::AtroposCount { .. } => "REPLAY_ATROPOS_COUNT",
            Self::AtroposMismatch { .. } => "REPLAY_ATROPOS_MISMATCH",
            Self::InvalidRange { .. } => "REPLAY_INVALID_RANGE",
            Self::Empty => "REPLAY_EMPTY",
            Self::Consensus { source, .. } => source.code(),
            Self::Json(_) => "REPLAY_MALFORMED_FIXTURE",
        }
    }
}

type ReplayEngine = Orderer<MemoryStore, DagIndex>;

/// A fresh in-memory engine whose genesis is `epoch`.
fn fresh_engine(epoch: Epoch, validators: &ValidatorSet) -> Result<ReplayEngine, ConsensusError> {
    let mut engine = Orderer::new(
        MemoryStore::new(),
        DagIndex::new(),
        ConsensusConfig::default(),
    );
    engine.apply_genesis(&Genesis {
        epoch,
        validators: validators.clone(),
    })?;
    engine.bootstrap(
        FnCallbacks(|_: &Block| None::<ValidatorSet>),
        &MemoryEventSource::new(),
    )?;
    Ok(engine)
}

/// Builds and processes `events` in ascending Lamport order on a fresh engine.
/// Returns the events with their frames and the elected Atropoi.
fn run_epoch(
    epoch: Epoch,
    validators: &ValidatorSet,
    events: &[FixtureEvent],
) -> Result<(Vec<FixtureEvent>, Vec<EventHash>), ReplayError> {
    let known: HashSet<EventHash> = events.iter().map(|e| e.hash).collect();
    let mut ordered: Vec<&FixtureEvent> = events.iter().collect();
    ordered.sort_by_key(|e| (e.lamport, e.hash));

    let consensus = |source| ReplayError::Consensus { epoch, source };
    let mut engine = fresh_engine(epoch, validators).map_err(consensus)?;
    let mut framed = Vec::with_capacity(ordered.len());

    for recorded in ordered {
        if let Some(parent) = recorded.parents.iter().find(|p| !known.contains(p)) {
            return Err(ReplayError::IncompleteFixture {
                epoch,
                event: recorded.hash,
                parent: *parent,
            });
        }
        let mut event = Event::new(
            epoch,
            recorded.creator,
            recorded.seq,
            recorded.lamport,
            recorded.parents.clone(),
        )
        .with_hash(recorded.hash);
        let info = engine.build(&mut event).map_err(consensus)?;
        if recorded.frame != 0 && recorded.frame != info.frame {
            return Err(ReplayError::FrameMismatch {
                epoch,
                event: recorded.hash,
                recorded: recorded.frame,
                rebuilt: info.frame,
            });
        }
        engine.process(&event).map_err(consensus)?;
        framed.push(FixtureEvent {
            frame: info.frame,
            ..recorded.clone()
        });
    }

    let atropoi = engine
        .blocks(epoch)
        .map_err(consensus)?
        .into_iter()
        .map(|b| b.atropos)
        .collect();
    Ok((framed, atropoi))
}

/// Replays one recorded epoch. Returns the number of Atropoi elected.
pub fn check_epoch(fixture: &FixtureEpoch) -> Result<usize, ReplayError> {
    let epoch = fixture.epoch;
    let (_, got) = run_epoch(epoch, &fixture.validators, &fixture.events)?;
    if fixture.atropoi.len() > got.len() {
        return Err(ReplayError::AtroposCount {
            epoch,
            expected: fixture.atropoi.len(),
            got: got.len(),
        });
    }
    for (position, (expected, got)) in fixture.atropoi.iter().zip(&got).enumerate() {
        if expected != got {
            return Err(ReplayError::AtroposMismatch {
                epoch,
                position,
                expected: *expected,
                got: *got,
            });
        }
    }
    info!(
        target: "replay",
        "Epoch {} verified: {} events, {} atropoi",
        epoch,
        fixture.events.len(),
        got.len()
    );
    Ok(got.len())
}

/// Replays every recorded epoch within `[min, max]` (inclusive, clamped to the
/// recorded range). Returns the number of epochs checked.
pub fn check_fixture(
    fixture: &Fixture,
    min: Option<Epoch>,
    max: Option<Epoch>,
) -> Result<usize, ReplayError> {
    let (lo, hi) = fixture.epoch_range().ok_or(ReplayError::Empty)?;
    let lo = min.map_or(lo, |m| m.max(lo));
    let hi = max.map_or(hi, |m| m.min(hi));
    if lo > hi {
        return Err(ReplayError::InvalidRange { min: lo, max: hi });
    }
    let mut checked = 0;
    for epoch in fixture
        .epochs
        .iter()
        .filter(|e| (lo..=hi).contains(&e.epoch))
    {
        check_epoch(epoch)?;
        checked += 1;
    }
    Ok(checked)
}

/// Records `events` of one epoch: frames and Atropoi are computed by a fresh
/// engine. Event epochs are ignored; every event is replayed in `epoch`.
pub fn record_epoch(
    epoch: Epoch,
    validators: ValidatorSet,
    events: &[Event],
) -> Result<FixtureEpoch, ReplayError> {
    let events: Vec<FixtureEvent> = events
        .iter()
        .map(|e| FixtureEvent {
            hash: e.hash,
            creator: e.creator,
            seq: e.seq,
            lamport: e.lamport,
            frame: 0,
            parents: e.parents.clone(),
        })
        .collect();
    let (events, atropoi) = run_epoch(epoch, &validators, &events)?;
    Ok(FixtureEpoch {
        epoch,
        validators,
        events,
        atropoi,
    })
}
