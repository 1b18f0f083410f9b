// Path: crates/api/src/oracle/mod.rs

//! The causality oracle contract.
//!
//! The oracle indexes the DAG and answers the causal questions the engine asks:
//! whether one event *forkless-causes* another, and what an event observes.
//! Insertions are staged: [`CausalityOracle::flush`] makes them permanent and
//! [`CausalityOracle::drop_not_flushed`] discards everything since the last
//! flush, which is how the engine rolls back a failed ingestion.

use lachesis_types::app::{Event, EventHash, Seq, ValidatorId, ValidatorSet};
use lachesis_types::error::OracleError;
use std::collections::{BTreeMap, BTreeSet};

/// Answers causal queries over the DAG of one epoch.
pub trait CausalityOracle: Send + Sync {
    /// Forgets every event and adopts a new validator set.
    fn reset(&mut self, validators: &ValidatorSet);

    /// Indexes an event whose parents were all added before. Staged until flushed.
    fn add_event(&mut self, event: &Event) -> Result<(), OracleError>;

    /// Makes all staged changes permanent.
    fn flush(&mut self);

    /// Discards all changes made since the last flush.
    fn drop_not_flushed(&mut self);

    /// Records that `validator` forked. From now on, in every query issued from an
    /// event that observes the fork, the validator contributes zero weight.
    /// Staged like [`CausalityOracle::add_event`].
    fn mark_cheater(&mut self, validator: ValidatorId);

    /// Whether `a` forkless-causes `b`: `a` observes `b` through a quorum of
    /// non-forking validators and `a` does not observe `b`'s creator forking.
    fn forkless_cause(&self, a: &EventHash, b: &EventHash) -> Result<bool, OracleError>;

    /// The highest sequence number `from` observes for each validator it observes
    /// without a fork.
    fn highest_events_observed(
        &self,
        from: &EventHash,
    ) -> Result<BTreeMap<ValidatorId, Seq>, OracleError>;

    /// Validators that `from` observes forking.
    fn observed_cheaters(&self, from: &EventHash) -> Result<BTreeSet<ValidatorId>, OracleError>;
}

impl<T: CausalityOracle + ?Sized> CausalityOracle for Box<T> {
    fn reset(&mut self, validators: &ValidatorSet) {
        (**self).reset(validators)
    }
    fn add_event(&mut self, event: &Event) -> Result<(), OracleError> {
        (**self).add_event(event)
    }
    fn flush(&mut self) {
        (**self).flush()
    }
    fn drop_not_flushed(&mut self) {
        (**self).drop_not_flushed()
    }
    fn mark_cheater(&mut self, validator: ValidatorId) {
        (**self).mark_cheater(validator)
    }
    fn forkless_cause(&self, a: &EventHash, b: &EventHash) -> Result<bool, OracleError> {
        (**self).forkless_cause(a, b)
    }
    fn highest_events_observed(
        &self,
        from: &EventHash,
    ) -> Result<BTreeMap<ValidatorId, Seq>, OracleError> {
        (**self).highest_events_observed(from)
    }
    fn observed_cheaters(&self, from: &EventHash) -> Result<BTreeSet<ValidatorId>, OracleError> {
        (**self).observed_cheaters(from)
    }
}
