// Path: crates/consensus/src/election.rs

//! Leaderless virtual voting over roots.
//!
//! The election decides one frame at a time. Every validator owns a candidate
//! slot in the frame being decided. Roots of the next frame vote "yes" for a slot
//! when they forkless-cause that validator's root; roots of later frames adopt
//! the weighted majority of the votes of the previous-frame roots they
//! forkless-cause. A vote becomes final as soon as either side holds a quorum.
//! The frame's Atropos is the root of the first slot, in canonical validator
//! order, decided "yes" after all slots before it were decided "no".

use crate::roots::{RootAndSlot, RootIndex};
use lachesis_api::oracle::CausalityOracle;
use lachesis_types::app::{EventHash, Frame, ValidatorId, ValidatorSet};
use lachesis_types::error::{ConsensusError, ProtocolViolation};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A decided frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub frame: Frame,
    pub atropos: EventHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Vote {
    yes: bool,
    decided: bool,
    observed_root: Option<EventHash>,
}

fn violation(msg: String) -> ConsensusError {
    ProtocolViolation::Election(msg).into()
}

/// Election state for the lowest undecided frame.
#[derive(Debug, Clone)]
pub struct Election {
    frame_to_decide: Frame,
    validators: ValidatorSet,
    votes: HashMap<(EventHash, ValidatorId), Vote>,
    decided: BTreeMap<ValidatorId, Vote>,
    processed: HashSet<EventHash>,
}

impl Election {
    pub fn new(validators: ValidatorSet, frame_to_decide: Frame) -> Self {
        Self {
            frame_to_decide,
            validators,
            votes: HashMap::new(),
            decided: BTreeMap::new(),
            processed: HashSet::new(),
        }
    }

    /// Drops all votes and starts deciding `frame_to_decide`.
    pub fn reset(&mut self, validators: ValidatorSet, frame_to_decide: Frame) {
        *self = Self::new(validators, frame_to_decide);
    }

    /// Casts the votes of `root`. Returns the decision once the frame is decided.
    ///
    /// Roots must be processed in an order where every root comes after the
    /// previous-frame roots it forkless-causes.
    pub fn process_root<O: CausalityOracle + ?Sized>(
        &mut self,
        root: &RootAndSlot,
        roots: &RootIndex,
        oracle: &O,
    ) -> Result<Option<Decision>, ConsensusError> {
        if let Some(decision) = self.choose_atropos()? {
            return Ok(Some(decision));
        }
        if root.frame <= self.frame_to_decide || !self.processed.insert(root.hash) {
            return Ok(None);
        }
        let round = root.frame - self.frame_to_decide;
        let prev_frame = root.frame - 1;

        let undecided: Vec<ValidatorId> = self
            .validators
            .sorted_ids()
            .filter(|v| !self.decided.contains_key(v))
            .collect();

        // Roots of the previous frame that `root` forkless-causes, in slot order.
        let mut observed = Vec::new();
        for prev in roots.frame_roots(prev_frame) {
            if oracle.forkless_cause(&root.hash, &prev.hash)? {
                observed.push(*prev);
            }
        }

        for subject in undecided {
            let vote = if round == 1 {
                let seen = observed.iter().find(|r| r.validator == subject);
                Vote {
                    yes: seen.is_some(),
                    decided: false,
                    observed_root: seen.map(|r| r.hash),
                }
            } else {
                self.aggregate(root, subject, &observed)?
            };
            if vote.decided {
                self.decided.insert(subject, vote);
            }
            self.votes.insert((root.hash, subject), vote);
        }

        self.choose_atropos()
    }

    fn aggregate(
        &self,
        root: &RootAndSlot,
        subject: ValidatorId,
        observed: &[RootAndSlot],
    ) -> Result<Vote, ConsensusError> {
        let mut yes = self.validators.new_counter();
        let mut no = self.validators.new_counter();
        let mut all = self.validators.new_counter();
        let mut subject_root: Option<EventHash> = None;

        for prev in observed {
            let Some(vote) = self.votes.get(&(prev.hash, subject)) else {
                return Err(violation(format!(
                    "root {} found no vote of {} for validator {subject}; roots processed out of order",
                    root.hash, prev.hash
                )));
            };
            if vote.yes {
                if let (Some(known), Some(seen)) = (subject_root, vote.observed_root) {
                    if known != seen {
                        return Err(violation(format!(
                            "validator {subject} forkless caused by two fork roots {known} and {seen} in frame {}",
                            self.frame_to_decide
                        )));
                    }
                }
                subject_root = vote.observed_root;
                yes.count(prev.validator);
            } else {
                no.count(prev.validator);
            }
            if !all.count(prev.validator) {
                return Err(violation(format!(
                    "root {} forkless causes two roots of validator {} in frame {}",
                    root.hash, prev.validator, prev.frame
                )));
            }
        }
        if !all.has_quorum() {
            return Err(violation(format!(
                "root {} forkless causes less than a quorum of frame {} roots",
                root.hash,
                root.frame - 1
            )));
        }

        let is_yes = yes.sum() >= no.sum();
        Ok(Vote {
            yes: is_yes,
            decided: yes.has_quorum() || no.has_quorum(),
            observed_root: if is_yes { subject_root } else { None },
        })
    }

    fn choose_atropos(&self) -> Result<Option<Decision>, ConsensusError> {
        for validator in self.validators.sorted_ids() {
            let Some(vote) = self.decided.get(&validator) else {
                return Ok(None);
            };
            if vote.yes {
                let atropos = vote.observed_root.ok_or_else(|| {
                    violation(format!(
                        "slot of validator {validator} decided yes without a root in frame {}",
                        self.frame_to_decide
                    ))
                })?;
                return Ok(Some(Decision {
                    frame: self.frame_to_decide,
                    atropos,
                }));
            }
        }
        Err(violation(format!(
            "every slot of frame {} decided no",
            self.frame_to_decide
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::calc_frame;
    use crate::vecfc::DagIndex;
    use lachesis_types::app::Event;

    struct Dag {
        index: DagIndex,
        roots: RootIndex,
        /// Roots in the order they were created.
        created: Vec<RootAndSlot>,
        layers: Vec<Vec<Event>>,
    }

    /// Fully connected DAG: every event of a round references every event of the
    /// previous round. Frames advance every second round.
    fn full_rounds(vs: &ValidatorSet, rounds: u32) -> Dag {
        let mut dag = Dag {
            index: DagIndex::with_validators(vs),
            roots: RootIndex::new(),
            created: Vec::new(),
            layers: Vec::new(),
        };
        let mut frames = HashMap::new();
        let ids: Vec<_> = vs.sorted_ids().collect();
        for r in 1..=rounds {
            let mut layer = Vec::new();
            for (i, id) in ids.iter().enumerate() {
                let parents = match dag.layers.last() {
                    None => vec![],
                    Some(prev) => {
                        let mut p = vec![prev[i].hash];
                        p.extend(prev.iter().filter(|e| e.creator != *id).map(|e| e.hash));
                        p
                    }
                };
                let e = Event::new(1, *id, r, r, parents);
                dag.index.add_event(&e).unwrap();
                let max_parent = e.parents.iter().map(|p| frames[p]).max();
                let info = calc_frame(&e, max_parent, &dag.roots, vs, &dag.index).unwrap();
                frames.insert(e.hash, info.frame);
                if info.is_root {
                    let root = RootAndSlot {
                        frame: info.frame,
                        validator: *id,
                        hash: e.hash,
                    };
                    dag.roots.insert(root);
                    dag.created.push(root);
                }
                layer.push(e);
            }
            dag.layers.push(layer);
        }
        dag
    }

    #[test]
    fn fully_connected_dag_elects_first_validator() {
        let vs = ValidatorSet::from_weights([(1, 1), (2, 1), (3, 1), (4, 1)]).unwrap();
        let dag = full_rounds(&vs, 7);
        assert_eq!(dag.roots.max_frame(), Some(4));
        let mut election = Election::new(vs.clone(), 1);

        let mut decision = None;
        for root in &dag.created {
            if let Some(d) = election.process_root(root, &dag.roots, &dag.index).unwrap() {
                decision.get_or_insert(d);
            }
        }
        let decision = decision.expect("frame 1 decided");
        assert_eq!(decision.frame, 1);
        assert_eq!(decision.atropos, dag.layers[0][0].hash);
    }

    #[test]
    fn stale_roots_are_ignored() {
        let vs = ValidatorSet::from_weights([(1, 1), (2, 1), (3, 1)]).unwrap();
        let dag = full_rounds(&vs, 3);
        let mut election = Election::new(vs, 2);
        for root in &dag.created {
            assert_eq!(election.process_root(root, &dag.roots, &dag.index).unwrap(), None);
        }
        assert!(election.votes.is_empty());
    }

    #[test]
    fn missing_previous_votes_are_a_violation() {
        let vs = ValidatorSet::from_weights([(1, 1), (2, 1), (3, 1)]).unwrap();
        let dag = full_rounds(&vs, 5);
        let (dag, roots) = (dag.index, dag.roots);
        let mut election = Election::new(vs, 1);
        // Skip the first voting round entirely.
        let third = roots.frame_roots(3)[0];
        let err = election.process_root(&third, &roots, &dag).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Protocol(ProtocolViolation::Election(_))
        ));
    }
}
