// Path: crates/consensus/src/vecfc.rs

//! A vector-clock causality oracle.
//!
//! Every indexed event carries two vectors over the validator set:
//! * *highest before* (`hb`): the highest event of each validator the event
//!   observes, plus a per-validator fork flag;
//! * *lowest after* (`la`): per validator, the lowest event of each of its
//!   branches that observes this event. An honest validator has one branch.
//!
//! `a` forkless-causes `b` when, summed over validators that `a` does not see
//! forking, the weight of those whose `hb` in `a` lies on a branch above one of
//! their `la` entries in `b` is a quorum. Fork detection is only performed for
//! validators marked through [`CausalityOracle::mark_cheater`]; the engine marks
//! a cheater before its second branch is indexed.

use lachesis_api::oracle::CausalityOracle;
use lachesis_types::app::{Event, EventHash, Seq, ValidatorId, ValidatorSet};
use lachesis_types::error::OracleError;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observed {
    seq: Seq,
    id: EventHash,
}

#[derive(Debug, Clone)]
struct Vertex {
    creator: usize,
    seq: Seq,
    self_parent: Option<EventHash>,
    parents: Vec<EventHash>,
    hb: Vec<Option<Observed>>,
    forks: Vec<bool>,
    la: Vec<Vec<Observed>>,
}

#[derive(Debug, Clone)]
enum Undo {
    Added(EventHash),
    LowestAfter { at: EventHash, slot: usize },
    Marked(usize),
}

/// Reference implementation of [`CausalityOracle`].
#[derive(Debug, Clone, Default)]
pub struct DagIndex {
    validators: Option<ValidatorSet>,
    vertices: HashMap<EventHash, Vertex>,
    marked: BTreeSet<usize>,
    journal: Vec<Undo>,
}

impl DagIndex {
    /// An empty index; call [`CausalityOracle::reset`] before adding events.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty index over `validators`.
    pub fn with_validators(validators: &ValidatorSet) -> Self {
        let mut index = Self::new();
        index.reset(validators);
        index
    }

    /// Number of indexed events.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn vertex(&self, id: &EventHash) -> Result<&Vertex, OracleError> {
        self.vertices.get(id).ok_or(OracleError::UnknownEvent(*id))
    }

    /// Whether `lower` is `higher` itself or one of its self-ancestors.
    fn same_branch(&self, higher: Observed, lower: Observed) -> bool {
        if higher.seq < lower.seq {
            return false;
        }
        let mut cursor = Some(higher.id);
        let mut seq = higher.seq;
        while let Some(id) = cursor {
            if seq == lower.seq {
                return id == lower.id;
            }
            cursor = self.vertices.get(&id).and_then(|v| v.self_parent);
            seq = seq.saturating_sub(1);
        }
        false
    }

    /// Whether `higher` observes `lower`, both being events of validator `i`.
    /// A validator that was never marked has a single chain.
    fn on_branch(&self, i: usize, higher: Observed, lower: Observed) -> bool {
        if self.marked.contains(&i) {
            self.same_branch(higher, lower)
        } else {
            higher.seq >= lower.seq
        }
    }

    /// Folds `other` into `acc` for validator slot `i`, flagging forks of marked cheaters.
    fn merge_slot(
        &self,
        i: usize,
        acc: &mut Option<Observed>,
        fork: &mut bool,
        other: Option<Observed>,
    ) {
        let Some(theirs) = other else {
            return;
        };
        let Some(ours) = *acc else {
            *acc = Some(theirs);
            return;
        };
        if ours == theirs {
            return;
        }
        let (high, low) = if (theirs.seq, theirs.id) > (ours.seq, ours.id) {
            (theirs, ours)
        } else {
            (ours, theirs)
        };
        if self.marked.contains(&i) && !self.same_branch(high, low) {
            *fork = true;
        }
        *acc = Some(high);
    }

    /// Records `event` as the lowest observer on its branch of every ancestor
    /// its self-parent does not already observe.
    fn fill_lowest_after(&mut self, event: &Event, creator: usize) {
        let own = Observed {
            seq: event.seq,
            id: event.hash,
        };
        let mut stack: Vec<EventHash> = event.parents.clone();
        while let Some(id) = stack.pop() {
            let covered = match self.vertices.get(&id).and_then(|v| v.la.get(creator)) {
                Some(entries) => entries.iter().any(|l| self.on_branch(creator, own, *l)),
                None => true,
            };
            if covered {
                continue;
            }
            if let Some(v) = self.vertices.get_mut(&id) {
                if let Some(entries) = v.la.get_mut(creator) {
                    entries.push(own);
                    stack.extend(v.parents.iter().copied());
                    self.journal.push(Undo::LowestAfter { at: id, slot: creator });
                }
            }
        }
    }
}

impl CausalityOracle for DagIndex {
    fn reset(&mut self, validators: &ValidatorSet) {
        self.validators = Some(validators.clone());
        self.vertices.clear();
        self.marked.clear();
        self.journal.clear();
    }

    fn add_event(&mut self, event: &Event) -> Result<(), OracleError> {
        let validators = self
            .validators
            .as_ref()
            .ok_or(OracleError::UnknownValidator(event.creator))?;
        let n = validators.len();
        let creator = validators
            .index_of(event.creator)
            .ok_or(OracleError::UnknownValidator(event.creator))?;
        if self.vertices.contains_key(&event.hash) {
            return Err(OracleError::Duplicate(event.hash));
        }
        if let Some(sp) = event.self_parent() {
            let parent = self.vertex(sp)?;
            if parent.creator != creator || parent.seq.checked_add(1) != Some(event.seq) {
                return Err(OracleError::InvalidSelfParent(event.hash));
            }
        }

        let mut hb: Vec<Option<Observed>> = vec![None; n];
        let mut forks = vec![false; n];
        for p in &event.parents {
            let parent = self.vertex(p)?;
            for (i, (acc, fork)) in hb.iter_mut().zip(forks.iter_mut()).enumerate() {
                if parent.forks.get(i).copied().unwrap_or(false) {
                    *fork = true;
                }
                let theirs = parent.hb.get(i).copied().flatten();
                self.merge_slot(i, acc, fork, theirs);
            }
        }
        // The event itself is the highest observation of its creator.
        if let (Some(acc), Some(fork)) = (hb.get_mut(creator), forks.get_mut(creator)) {
            let own = Observed {
                seq: event.seq,
                id: event.hash,
            };
            if let Some(prev) = *acc {
                let on_chain = match event.self_parent() {
                    Some(sp) => self.same_branch(
                        Observed {
                            seq: event.seq.saturating_sub(1),
                            id: *sp,
                        },
                        prev,
                    ),
                    None => false,
                };
                if self.marked.contains(&creator) && !on_chain {
                    *fork = true;
                }
            }
            *acc = Some(own);
        }

        let mut la = vec![Vec::new(); n];
        if let Some(slot) = la.get_mut(creator) {
            slot.push(Observed {
                seq: event.seq,
                id: event.hash,
            });
        }

        self.vertices.insert(
            event.hash,
            Vertex {
                creator,
                seq: event.seq,
                self_parent: event.self_parent().copied(),
                parents: event.parents.clone(),
                hb,
                forks,
                la,
            },
        );
        self.journal.push(Undo::Added(event.hash));
        self.fill_lowest_after(event, creator);
        Ok(())
    }

    fn flush(&mut self) {
        self.journal.clear();
    }

    fn drop_not_flushed(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Added(id) => {
                    self.vertices.remove(&id);
                }
                Undo::LowestAfter { at, slot } => {
                    if let Some(s) = self.vertices.get_mut(&at).and_then(|v| v.la.get_mut(slot)) {
                        s.pop();
                    }
                }
                Undo::Marked(i) => {
                    self.marked.remove(&i);
                }
            }
        }
    }

    fn mark_cheater(&mut self, validator: ValidatorId) {
        let idx = self.validators.as_ref().and_then(|v| v.index_of(validator));
        if let Some(i) = idx {
            if self.marked.insert(i) {
                self.journal.push(Undo::Marked(i));
            }
        }
    }

    fn forkless_cause(&self, a: &EventHash, b: &EventHash) -> Result<bool, OracleError> {
        let validators = self
            .validators
            .as_ref()
            .ok_or(OracleError::UnknownEvent(*a))?;
        let va = self.vertex(a)?;
        let vb = self.vertex(b)?;
        if va.forks.get(vb.creator).copied().unwrap_or(true) {
            return Ok(false);
        }
        let mut counter = validators.new_counter();
        for (i, member) in validators.iter().enumerate() {
            if va.forks.get(i).copied().unwrap_or(true) {
                continue;
            }
            let Some(highest) = va.hb.get(i).copied().flatten() else {
                continue;
            };
            let observes = vb
                .la
                .get(i)
                .is_some_and(|entries| entries.iter().any(|l| self.on_branch(i, highest, *l)));
            if observes {
                counter.count(member.id);
            }
        }
        Ok(counter.has_quorum())
    }

    fn highest_events_observed(
        &self,
        from: &EventHash,
    ) -> Result<BTreeMap<ValidatorId, Seq>, OracleError> {
        let v = self.vertex(from)?;
        let mut out = BTreeMap::new();
        if let Some(validators) = &self.validators {
            for (i, member) in validators.iter().enumerate() {
                if v.forks.get(i).copied().unwrap_or(false) {
                    continue;
                }
                if let Some(h) = v.hb.get(i).copied().flatten() {
                    out.insert(member.id, h.seq);
                }
            }
        }
        Ok(out)
    }

    fn observed_cheaters(&self, from: &EventHash) -> Result<BTreeSet<ValidatorId>, OracleError> {
        let v = self.vertex(from)?;
        let mut out = BTreeSet::new();
        if let Some(validators) = &self.validators {
            for (i, member) in validators.iter().enumerate() {
                if v.forks.get(i).copied().unwrap_or(false) {
                    out.insert(member.id);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(weights: &[(ValidatorId, u64)]) -> ValidatorSet {
        ValidatorSet::from_weights(weights.iter().copied()).unwrap()
    }

    fn ev(creator: ValidatorId, seq: Seq, lamport: u32, parents: &[&Event]) -> Event {
        Event::new(1, creator, seq, lamport, parents.iter().map(|p| p.hash).collect())
    }

    #[test]
    fn forkless_cause_needs_a_quorum_of_observers() {
        let vs = set(&[(1, 1), (2, 1), (3, 1), (4, 1)]);
        let mut dag = DagIndex::with_validators(&vs);
        let a1 = ev(1, 1, 1, &[]);
        let b1 = ev(2, 1, 1, &[]);
        let c1 = ev(3, 1, 1, &[]);
        let d1 = ev(4, 1, 1, &[]);
        for e in [&a1, &b1, &c1, &d1] {
            dag.add_event(e).unwrap();
        }
        // b2 and c2 observe a1; a2 observes itself.
        let a2 = ev(1, 2, 2, &[&a1]);
        let b2 = ev(2, 2, 2, &[&b1, &a1]);
        let c2 = ev(3, 2, 2, &[&c1, &a1]);
        for e in [&a2, &b2, &c2] {
            dag.add_event(e).unwrap();
        }
        let d2 = ev(4, 2, 3, &[&d1, &b2]);
        dag.add_event(&d2).unwrap();
        // d2 sees a1 through 1 (a1 itself) and 2 (b2) and 4 (d2): 3 of 4.
        assert!(dag.forkless_cause(&d2.hash, &a1.hash).unwrap());
        // d2 does not observe c1 at all.
        assert!(!dag.forkless_cause(&d2.hash, &c1.hash).unwrap());

        let d3 = ev(4, 3, 4, &[&d2]);
        dag.add_event(&d3).unwrap();
        // Only b and d observe b1 from d3's point of view.
        assert!(!dag.forkless_cause(&d3.hash, &b1.hash).unwrap());
    }

    #[test]
    fn rollback_restores_lowest_after() {
        let vs = set(&[(1, 1), (2, 1), (3, 1)]);
        let mut dag = DagIndex::with_validators(&vs);
        let a1 = ev(1, 1, 1, &[]);
        let b1 = ev(2, 1, 1, &[]);
        let c1 = ev(3, 1, 1, &[]);
        for e in [&a1, &b1, &c1] {
            dag.add_event(e).unwrap();
        }
        dag.flush();

        let b2 = ev(2, 2, 2, &[&b1, &a1]);
        let c2 = ev(3, 2, 2, &[&c1, &a1]);
        dag.add_event(&b2).unwrap();
        dag.add_event(&c2).unwrap();
        dag.drop_not_flushed();

        assert_eq!(dag.len(), 3);
        assert!(matches!(
            dag.forkless_cause(&b2.hash, &a1.hash),
            Err(OracleError::UnknownEvent(_))
        ));
        // Re-adding after rollback behaves as if nothing happened.
        dag.add_event(&b2).unwrap();
        let obs = dag.highest_events_observed(&b2.hash).unwrap();
        assert_eq!(obs.get(&1), Some(&1));
        assert_eq!(obs.get(&2), Some(&2));
        assert_eq!(obs.get(&3), None);
    }

    #[test]
    fn marked_cheater_loses_weight_for_observers_of_the_fork() {
        let vs = set(&[(1, 1), (2, 1), (3, 1), (4, 1)]);
        let mut dag = DagIndex::with_validators(&vs);
        let a1 = ev(1, 1, 1, &[]);
        let b1 = ev(2, 1, 1, &[]);
        let c1 = ev(3, 1, 1, &[]);
        let d1 = ev(4, 1, 1, &[]);
        for e in [&a1, &b1, &c1, &d1] {
            dag.add_event(e).unwrap();
        }
        // Validator 4 forks at seq 2.
        let d2 = ev(4, 2, 2, &[&d1, &a1]);
        let d2x = ev(4, 2, 2, &[&d1, &b1]);
        dag.add_event(&d2).unwrap();
        dag.mark_cheater(4);
        dag.add_event(&d2x).unwrap();

        let b2 = ev(2, 2, 3, &[&b1, &d2]);
        let c2 = ev(3, 2, 3, &[&c1, &d2x]);
        dag.add_event(&b2).unwrap();
        dag.add_event(&c2).unwrap();
        assert!(dag.observed_cheaters(&b2.hash).unwrap().is_empty());

        let a2 = ev(1, 2, 4, &[&a1, &b2, &c2]);
        dag.add_event(&a2).unwrap();
        assert_eq!(
            dag.observed_cheaters(&a2.hash).unwrap(),
            BTreeSet::from([4])
        );
        assert!(!dag.highest_events_observed(&a2.hash).unwrap().contains_key(&4));
        // a2 never forkless-causes an event of the cheater it sees forking.
        assert!(!dag.forkless_cause(&a2.hash, &d1.hash).unwrap());
    }

    /// Indexes `events` in order, marking a creator once it reuses a sequence number.
    fn index_marking_forks(vs: &ValidatorSet, events: &[&Event]) -> DagIndex {
        let mut dag = DagIndex::with_validators(vs);
        let mut slots = std::collections::HashSet::new();
        for e in events {
            if !slots.insert((e.creator, e.seq)) {
                dag.mark_cheater(e.creator);
            }
            dag.add_event(e).unwrap();
        }
        dag
    }

    #[test]
    fn fork_branches_keep_separate_observers() {
        let vs = set(&[(1, 1), (2, 1), (3, 1), (4, 1)]);
        let a1 = ev(1, 1, 1, &[]);
        let b1 = ev(2, 1, 1, &[]);
        let c1 = ev(3, 1, 1, &[]);
        let d1 = ev(4, 1, 1, &[]);
        // Validator 4 forks: d2x observes a1 right away, the other branch only at d4.
        let d2x = ev(4, 2, 2, &[&d1, &a1]);
        let d2 = ev(4, 2, 2, &[&d1]);
        let d3 = ev(4, 3, 3, &[&d2]);
        let d4 = ev(4, 4, 4, &[&d3, &a1]);
        let b2 = ev(2, 2, 4, &[&b1, &a1, &d3]);

        let orders = [
            vec![&a1, &b1, &c1, &d1, &d2x, &d2, &d3, &d4, &b2],
            vec![&a1, &b1, &c1, &d1, &d2, &d3, &d4, &d2x, &b2],
            vec![&a1, &b1, &c1, &d1, &d2, &d3, &b2, &d2x, &d4],
        ];
        for order in &orders {
            let dag = index_marking_forks(&vs, order);
            // b2 reaches validator 4 through d3, which does not observe a1.
            assert!(!dag.forkless_cause(&b2.hash, &a1.hash).unwrap());
            assert!(dag.observed_cheaters(&b2.hash).unwrap().is_empty());
        }

        let answers: Vec<_> = orders
            .iter()
            .map(|order| {
                let dag = index_marking_forks(&vs, order);
                [&a1, &b1, &d1, &d2, &d2x]
                    .iter()
                    .map(|target| dag.forkless_cause(&b2.hash, &target.hash).unwrap())
                    .collect::<Vec<_>>()
            })
            .collect();
        assert!(answers.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn rejects_broken_self_parent() {
        let vs = set(&[(1, 1), (2, 1)]);
        let mut dag = DagIndex::with_validators(&vs);
        let a1 = ev(1, 1, 1, &[]);
        let b1 = ev(2, 1, 1, &[]);
        dag.add_event(&a1).unwrap();
        dag.add_event(&b1).unwrap();
        let bad = ev(1, 2, 2, &[&b1]);
        assert!(matches!(
            dag.add_event(&bad),
            Err(OracleError::InvalidSelfParent(_))
        ));
        let gap = ev(1, 3, 2, &[&a1]);
        assert!(matches!(
            dag.add_event(&gap),
            Err(OracleError::InvalidSelfParent(_))
        ));
        let stranger = ev(9, 1, 1, &[]);
        assert!(matches!(
            dag.add_event(&stranger),
            Err(OracleError::UnknownValidator(9))
        ));
    }
}
