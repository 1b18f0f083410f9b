// Path: crates/consensus/src/orderer.rs

//! The ordering engine: frame assignment, election, block sealing and the
//! epoch lifecycle, on top of an injected causality oracle and a key-value
//! store.
//!
//! Every mutating entry point takes `&mut self` and every query takes `&self`,
//! so an `RwLock<Orderer<..>>` serves concurrent readers. Ingestion is
//! all-or-nothing until the first block of a call reaches the application;
//! after that point a failure halts the engine.

use crate::election::{Decision, Election};
use crate::forks::ForkTracker;
use crate::frame::{calc_frame, FrameInfo};
use crate::roots::{RootAndSlot, RootIndex};
use crate::store::{ConsensusStore, StateBatch};
use lachesis_api::consensus::ConsensusCallbacks;
use lachesis_api::events::EventSource;
use lachesis_api::oracle::CausalityOracle;
use lachesis_api::storage::KvStore;
use lachesis_storage::metrics::metrics as storage_metrics;
use lachesis_telemetry::time::Timer;
use lachesis_telemetry::{consensus_metrics, error_metrics};
use lachesis_types::app::{
    Block, BlockKey, Epoch, EpochState, Equivocation, Event, EventHash, EventRecord, Frame,
    Genesis, Seq, ValidatorId, ValidatorSet,
};
use lachesis_types::config::ConsensusConfig;
use lachesis_types::error::{ConsensusError, ErrorCode, ProtocolViolation};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// What a successful [`Orderer::process`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// The frame assigned to the event.
    pub frame: Frame,
    /// Whether the event became a root of `frame`.
    pub is_root: bool,
    /// The fork this event revealed, if any.
    pub equivocation: Option<Equivocation>,
    /// Blocks sealed and delivered during the call, in order.
    pub blocks: Vec<BlockKey>,
    /// The new epoch, if the application sealed the old one.
    pub sealed_epoch: Option<Epoch>,
}

/// Per-epoch in-memory state, rebuilt from the store on bootstrap.
#[derive(Debug)]
struct EpochRuntime {
    epoch: Epoch,
    validators: ValidatorSet,
    last_decided: Frame,
    last_block: Option<BlockKey>,
    events: HashMap<EventHash, EventRecord>,
    roots: RootIndex,
    forks: ForkTracker,
    election: Election,
}

impl EpochRuntime {
    fn new(epoch: Epoch, validators: ValidatorSet, last_block: Option<BlockKey>) -> Self {
        Self {
            epoch,
            election: Election::new(validators.clone(), 1),
            validators,
            last_decided: 0,
            last_block,
            events: HashMap::new(),
            roots: RootIndex::new(),
            forks: ForkTracker::new(),
        }
    }
}

/// The result of framing an event, before anything is committed.
struct Staged {
    info: FrameInfo,
    equivocation: Option<Equivocation>,
    new_cheater: bool,
}

/// The Lachesis ordering engine.
pub struct Orderer<S: KvStore, O: CausalityOracle> {
    store: ConsensusStore<S>,
    oracle: O,
    config: ConsensusConfig,
    callbacks: Option<Mutex<Box<dyn ConsensusCallbacks>>>,
    runtime: Option<EpochRuntime>,
    halted: bool,
}

impl<S: KvStore, O: CausalityOracle> std::fmt::Debug for Orderer<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orderer")
            .field("epoch", &self.epoch())
            .field("last_decided", &self.last_decided_frame())
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

impl<S: KvStore, O: CausalityOracle> Orderer<S, O> {
    pub fn new(store: S, oracle: O, config: ConsensusConfig) -> Self {
        Self {
            store: ConsensusStore::new(store),
            oracle,
            config,
            callbacks: None,
            runtime: None,
            halted: false,
        }
    }

    /// Writes the genesis epoch. Allowed once per store.
    pub fn apply_genesis(&mut self, genesis: &Genesis) -> Result<(), ConsensusError> {
        if self.store.genesis()?.is_some() {
            return Err(ConsensusError::GenesisAlreadyApplied);
        }
        let mut batch = StateBatch::new();
        batch.put_genesis(genesis)?;
        batch.put_epoch_state(&EpochState {
            epoch: genesis.epoch,
            validators: genesis.validators.clone(),
        })?;
        batch.put_validators(genesis.epoch, &genesis.validators)?;
        batch.put_last_decided(0)?;
        self.store.commit(batch)?;
        info!(
            target: "consensus",
            "Applied genesis at epoch {} with {} validators",
            genesis.epoch,
            genesis.validators.len()
        );
        Ok(())
    }

    /// Restores the current epoch from the store and installs the application
    /// callbacks. Events of the epoch are fetched from `source` and re-indexed
    /// by the oracle; frames and roots come from the store.
    pub fn bootstrap<C, E>(&mut self, callbacks: C, source: &E) -> Result<(), ConsensusError>
    where
        C: ConsensusCallbacks + 'static,
        E: EventSource + ?Sized,
    {
        self.ensure_not_halted()?;
        if self.runtime.is_some() {
            return Err(ConsensusError::AlreadyBootstrapped);
        }
        let state = self
            .store
            .epoch_state()?
            .ok_or(ConsensusError::GenesisMissing)?;
        let epoch = state.epoch;
        let records = self.store.event_records(epoch)?;
        let cheaters = self.store.cheaters(epoch)?;

        let mut events = Vec::with_capacity(records.len());
        for (hash, _) in &records {
            let event = source
                .get_event(hash)
                .ok_or(ConsensusError::MissingEvent(*hash))?;
            events.push(event);
        }
        events.sort_by_key(|e| (e.lamport, e.hash));

        self.oracle.reset(&state.validators);
        for cheater in &cheaters {
            self.oracle.mark_cheater(*cheater);
        }
        for event in &events {
            if let Err(e) = self.oracle.add_event(event) {
                self.oracle.reset(&state.validators);
                return Err(e.into());
            }
        }
        self.oracle.flush();

        let mut rt = EpochRuntime::new(epoch, state.validators, self.store.last_block()?);
        rt.last_decided = self.store.last_decided()?;
        rt.events = records.into_iter().collect();
        for (frame, validator, hash) in self.store.roots(epoch)? {
            rt.roots.insert(RootAndSlot {
                frame,
                validator,
                hash,
            });
        }
        rt.forks = ForkTracker::load(self.store.seq_index(epoch)?, cheaters);

        info!(
            target: "consensus",
            "Bootstrapped epoch {} at frame {} with {} events and {} roots",
            epoch,
            rt.last_decided,
            rt.events.len(),
            rt.roots.len()
        );
        self.runtime = Some(rt);
        self.callbacks = Some(Mutex::new(Box::new(callbacks)));

        // Replays the election over the restored roots; frames that became
        // decidable before a restart are sealed now.
        let result = match self.decide_pending() {
            Ok(Some(block)) => self.deliver_and_advance(block).map(|_| ()),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        self.observe(result)
    }

    /// Computes the frame of `event` and stores it in the event, without
    /// ingesting anything.
    pub fn build(&mut self, event: &mut Event) -> Result<FrameInfo, ConsensusError> {
        let result = self.stage(event).map(|staged| {
            self.oracle.drop_not_flushed();
            staged.info
        });
        let info = self.observe(result)?;
        event.frame = info.frame;
        Ok(info)
    }

    /// Ingests `event`. Its parents must have been processed before.
    pub fn process(&mut self, event: &Event) -> Result<ProcessOutcome, ConsensusError> {
        let _timer = Timer::new(consensus_metrics());
        let result = self.ingest(event);
        self.observe(result)
    }

    fn ingest(&mut self, event: &Event) -> Result<ProcessOutcome, ConsensusError> {
        let staged = self.stage(event)?;
        let mut outcome = ProcessOutcome {
            frame: staged.info.frame,
            is_root: staged.info.is_root,
            equivocation: staged.equivocation,
            blocks: Vec::new(),
            sealed_epoch: None,
        };
        let block = match self.commit_event(event, &staged) {
            Ok(block) => block,
            Err(e) => {
                self.oracle.drop_not_flushed();
                return Err(e);
            }
        };
        if let Some(block) = block {
            let (blocks, sealed) = self.deliver_and_advance(block).map_err(|e| {
                if e.is_fatal() {
                    e
                } else {
                    ProtocolViolation::CommitInterrupted {
                        reason: e.to_string(),
                    }
                    .into()
                }
            })?;
            outcome.blocks = blocks;
            outcome.sealed_epoch = sealed;
        }
        Ok(outcome)
    }

    /// Records the error in metrics and logs, halting on a protocol violation.
    fn observe<T>(&mut self, result: Result<T, ConsensusError>) -> Result<T, ConsensusError> {
        if let Err(e) = &result {
            error_metrics().inc_error("consensus", e.code());
            if e.is_fatal() {
                if !self.halted {
                    error!(target: "consensus", "Halting ordering engine: {}", e);
                }
                self.halted = true;
            } else {
                warn!(target: "consensus", "Rejected: {}", e);
            }
        }
        result
    }

    fn ensure_not_halted(&self) -> Result<(), ConsensusError> {
        if self.halted {
            return Err(ProtocolViolation::Halted.into());
        }
        Ok(())
    }

    /// Validates `event`, adds it to the oracle and computes its frame. On
    /// success the oracle holds unflushed changes; on failure it is rolled back.
    fn stage(&mut self, event: &Event) -> Result<Staged, ConsensusError> {
        self.ensure_not_halted()?;
        let rt = self.runtime.as_ref().ok_or(ConsensusError::NotBootstrapped)?;
        if event.epoch != rt.epoch {
            return Err(ConsensusError::WrongEpoch {
                event: event.hash,
                expected: rt.epoch,
                got: event.epoch,
            });
        }
        if !rt.validators.contains(event.creator) {
            return Err(ConsensusError::UnknownCreator {
                event: event.hash,
                creator: event.creator,
            });
        }
        if rt.events.contains_key(&event.hash) {
            return Err(ConsensusError::AlreadyProcessed(event.hash));
        }

        let mut max_parent_frame = None;
        for parent in &event.parents {
            let record = rt.events.get(parent).ok_or(
                ProtocolViolation::InconsistentParentFrame {
                    event: event.hash,
                    parent: *parent,
                },
            )?;
            max_parent_frame = max_parent_frame.max(Some(record.frame));
        }

        let equivocation = rt.forks.check(event);
        let new_cheater = equivocation.is_some() && !rt.forks.is_cheater(event.creator);
        if let Some(eq) = &equivocation {
            warn!(
                target: "consensus",
                "Validator {} forked at seq {}: {} conflicts with {}",
                eq.validator, eq.seq, eq.conflicting, eq.existing
            );
        }
        if new_cheater {
            self.oracle.mark_cheater(event.creator);
        }

        let framed = self
            .oracle
            .add_event(event)
            .and_then(|()| {
                calc_frame(event, max_parent_frame, &rt.roots, &rt.validators, &self.oracle)
            })
            .map_err(ConsensusError::from)
            .and_then(|info| {
                if event.frame != 0 && event.frame != info.frame {
                    Err(ConsensusError::WrongFrame {
                        event: event.hash,
                        claimed: event.frame,
                        computed: info.frame,
                    })
                } else {
                    Ok(info)
                }
            });
        match framed {
            Ok(info) => Ok(Staged {
                info,
                equivocation,
                new_cheater,
            }),
            Err(e) => {
                self.oracle.drop_not_flushed();
                Err(e)
            }
        }
    }

    /// Persists a staged event together with the block it may decide, then
    /// applies it to the in-memory state.
    fn commit_event(
        &mut self,
        event: &Event,
        staged: &Staged,
    ) -> Result<Option<Block>, ConsensusError> {
        let rt = self.runtime.as_ref().ok_or(ConsensusError::NotBootstrapped)?;
        let FrameInfo { frame, is_root } = staged.info;

        let mut batch = StateBatch::new();
        batch.put_event(rt.epoch, &event.hash, staged.info_record())?;
        if rt.forks.is_first(event) {
            batch.put_seq(rt.epoch, event.creator, event.seq, &event.hash)?;
        }
        if staged.new_cheater {
            batch.put_cheater(rt.epoch, event.creator);
        }

        let root = RootAndSlot {
            frame,
            validator: event.creator,
            hash: event.hash,
        };
        let mut election = None;
        let mut block = None;
        if is_root {
            batch.put_root(rt.epoch, frame, event.creator, &event.hash);
            let mut next = rt.election.clone();
            if let Some(decision) = next.process_root(&root, &rt.roots, &self.oracle)? {
                block = Some(self.seal_block(rt, decision, &mut batch)?);
            }
            election = Some(next);
        }

        self.store.commit(batch)?;
        self.oracle.flush();

        let rt = self.runtime.as_mut().ok_or(ConsensusError::NotBootstrapped)?;
        rt.events.insert(event.hash, staged.info_record());
        rt.forks.record(event);
        if staged.new_cheater {
            rt.forks.mark(event.creator);
        }
        consensus_metrics().inc_events_processed();
        if staged.equivocation.is_some() {
            consensus_metrics().inc_equivocations();
        }
        if is_root {
            rt.roots.insert(root);
            consensus_metrics().inc_roots();
            debug!(target: "consensus", "Event {} is a root of frame {}", event.hash, frame);
        } else {
            debug!(target: "consensus", "Event {} assigned frame {}", event.hash, frame);
        }
        if let Some(election) = election {
            rt.election = election;
        }
        if let Some(block) = &block {
            rt.last_decided = block.frame;
            rt.last_block = Some(block.key());
        }
        Ok(block)
    }

    /// Builds the block of a decided frame and stages it in `batch`.
    fn seal_block(
        &self,
        rt: &EpochRuntime,
        decision: Decision,
        batch: &mut StateBatch,
    ) -> Result<Block, ConsensusError> {
        let expected = rt.last_decided + 1;
        if decision.frame != expected {
            return Err(ProtocolViolation::FrameSkipped {
                expected,
                got: decision.frame,
            }
            .into());
        }
        let observed = self.oracle.observed_cheaters(&decision.atropos)?;
        let cheaters = rt
            .validators
            .sorted_ids()
            .filter(|v| observed.contains(v) && rt.forks.is_cheater(*v))
            .collect();
        let block = Block {
            epoch: rt.epoch,
            frame: decision.frame,
            atropos: decision.atropos,
            cheaters,
            validators: rt.validators.clone(),
        };
        let key = block.key();
        if let Some(last) = rt.last_block {
            let in_order = if key.epoch == last.epoch {
                key.frame == last.frame + 1
            } else {
                key.epoch > last.epoch && key.frame == 1
            };
            if !in_order {
                return Err(ProtocolViolation::BlockOutOfOrder { last, got: key }.into());
            }
        }
        if self.store.has_block(key)? {
            return Err(ProtocolViolation::BlockOverwrite(key).into());
        }
        batch.put_block(&block)?;
        batch.put_last_decided(block.frame)?;
        batch.put_last_block(key)?;
        Ok(block)
    }

    /// Restarts the election at the frame after the last decided one and
    /// replays every known root. A decision is persisted and its block returned.
    fn decide_pending(&mut self) -> Result<Option<Block>, ConsensusError> {
        let rt = self.runtime.as_mut().ok_or(ConsensusError::NotBootstrapped)?;
        rt.election.reset(rt.validators.clone(), rt.last_decided + 1);
        let mut decision = None;
        'frames: for frame in rt.last_decided + 2..=rt.roots.max_frame().unwrap_or(0) {
            for root in rt.roots.frame_roots(frame) {
                decision = rt.election.process_root(root, &rt.roots, &self.oracle)?;
                if decision.is_some() {
                    break 'frames;
                }
            }
        }
        let Some(decision) = decision else {
            return Ok(None);
        };

        let rt = self.runtime.as_ref().ok_or(ConsensusError::NotBootstrapped)?;
        let mut batch = StateBatch::new();
        let block = self.seal_block(rt, decision, &mut batch)?;
        self.store.commit(batch)?;
        let rt = self.runtime.as_mut().ok_or(ConsensusError::NotBootstrapped)?;
        rt.last_decided = block.frame;
        rt.last_block = Some(block.key());
        Ok(Some(block))
    }

    /// Hands `first` to the application and keeps deciding frames from known
    /// roots until the election needs more events or the epoch is sealed.
    fn deliver_and_advance(
        &mut self,
        first: Block,
    ) -> Result<(Vec<BlockKey>, Option<Epoch>), ConsensusError> {
        let mut delivered = Vec::new();
        let mut next = Some(first);
        while let Some(block) = next.take() {
            info!(
                target: "consensus",
                "Sealed block {} atropos={} cheaters={:?}",
                block.key(),
                block.atropos,
                block.cheaters
            );
            consensus_metrics().inc_blocks_sealed();
            consensus_metrics().set_last_decided_frame(u64::from(block.frame));
            delivered.push(block.key());

            let callbacks = self.callbacks.as_mut().ok_or(ConsensusError::NotBootstrapped)?;
            let callbacks = callbacks.get_mut().unwrap_or_else(PoisonError::into_inner);
            let sealed = callbacks.begin_block(&block).end_block();

            if let Some(validators) = sealed {
                let epoch = self.seal_epoch(validators)?;
                return Ok((delivered, Some(epoch)));
            }
            next = self.decide_pending()?;
        }
        Ok((delivered, None))
    }

    /// Installs the next epoch with `validators` and clears the per-epoch state.
    fn seal_epoch(&mut self, validators: ValidatorSet) -> Result<Epoch, ConsensusError> {
        let rt = self.runtime.as_ref().ok_or(ConsensusError::NotBootstrapped)?;
        let old = rt.epoch;
        let last_block = rt.last_block;
        let epoch = old.saturating_add(1);

        let mut batch = StateBatch::new();
        batch.put_epoch_state(&EpochState {
            epoch,
            validators: validators.clone(),
        })?;
        batch.put_validators(epoch, &validators)?;
        batch.put_last_decided(0)?;
        if self.config.drop_sealed_epochs {
            batch.drop_epoch(old);
        }
        self.store.commit(batch)?;
        if self.config.drop_sealed_epochs {
            storage_metrics().inc_epochs_dropped();
        }

        self.oracle.reset(&validators);
        info!(
            target: "consensus",
            "Sealed epoch {}; epoch {} starts with {} validators (total weight {})",
            old,
            epoch,
            validators.len(),
            validators.total_weight()
        );
        self.runtime = Some(EpochRuntime::new(epoch, validators, last_block));
        consensus_metrics().inc_epochs_sealed();
        consensus_metrics().set_last_decided_frame(0);
        Ok(epoch)
    }

    // --- Queries ---

    /// The current epoch, once bootstrapped.
    pub fn epoch(&self) -> Option<Epoch> {
        self.runtime.as_ref().map(|rt| rt.epoch)
    }

    /// The validator set of the current epoch.
    pub fn validators(&self) -> Option<&ValidatorSet> {
        self.runtime.as_ref().map(|rt| &rt.validators)
    }

    /// The last decided frame of the current epoch.
    pub fn last_decided_frame(&self) -> Option<Frame> {
        self.runtime.as_ref().map(|rt| rt.last_decided)
    }

    /// The key of the last delivered block.
    pub fn last_block(&self) -> Option<BlockKey> {
        self.runtime.as_ref().and_then(|rt| rt.last_block)
    }

    /// The frame of a processed event of the current epoch.
    pub fn frame_of(&self, hash: &EventHash) -> Option<Frame> {
        self.record(hash).map(|r| r.frame)
    }

    pub fn is_root(&self, hash: &EventHash) -> bool {
        self.record(hash).is_some_and(|r| r.is_root)
    }

    fn record(&self, hash: &EventHash) -> Option<&EventRecord> {
        self.runtime.as_ref().and_then(|rt| rt.events.get(hash))
    }

    /// Validators caught forking in the current epoch, in ascending id order.
    pub fn cheaters(&self) -> Vec<ValidatorId> {
        self.runtime
            .as_ref()
            .map(|rt| rt.forks.cheaters().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Roots of `frame` in the current epoch, in slot order.
    pub fn frame_roots(&self, frame: Frame) -> &[RootAndSlot] {
        self.runtime
            .as_ref()
            .map(|rt| rt.roots.frame_roots(frame))
            .unwrap_or_default()
    }

    /// A sealed block.
    pub fn block(&self, key: BlockKey) -> Result<Option<Block>, ConsensusError> {
        Ok(self.store.block(key)?)
    }

    /// All sealed blocks of `epoch`, in frame order.
    pub fn blocks(&self, epoch: Epoch) -> Result<Vec<Block>, ConsensusError> {
        Ok(self.store.blocks(epoch)?)
    }

    /// The highest sequence `from` observes per validator.
    pub fn highest_events_observed(
        &self,
        from: &EventHash,
    ) -> Result<BTreeMap<ValidatorId, Seq>, ConsensusError> {
        Ok(self.oracle.highest_events_observed(from)?)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn store(&self) -> &ConsensusStore<S> {
        &self.store
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl Staged {
    fn info_record(&self) -> EventRecord {
        EventRecord {
            frame: self.info.frame,
            is_root: self.info.is_root,
        }
    }
}
