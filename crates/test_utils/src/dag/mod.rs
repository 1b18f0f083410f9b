// Path: crates/test_utils/src/dag/mod.rs

//! Random event DAGs for engine tests.
//!
//! Events are produced in a causal order: every parent is generated before its
//! children. Honest validators extend a single chain. Cheaters may open a second
//! branch by reusing the self-parent of their current head, producing two events
//! with the same `(creator, seq)`.

use crate::randomness::TestRng;
use lachesis_types::app::{Epoch, Event, EventHash, Lamport, ValidatorId, FIRST_EPOCH};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Validator ids `1..=n`.
pub fn gen_nodes(n: u32) -> Vec<ValidatorId> {
    (1..=n).collect()
}

/// Generates random events over a fixed validator list.
#[derive(Debug, Clone)]
pub struct DagGenerator {
    validators: Vec<ValidatorId>,
    epoch: Epoch,
    max_parents: usize,
    cheaters: BTreeSet<ValidatorId>,
    fork_one_in: u32,
    heads: BTreeMap<ValidatorId, Vec<Event>>,
    lamports: HashMap<EventHash, Lamport>,
    seen: HashSet<EventHash>,
}

impl DagGenerator {
    pub fn new(validators: &[ValidatorId]) -> Self {
        Self {
            validators: validators.to_vec(),
            epoch: FIRST_EPOCH,
            max_parents: 3,
            cheaters: BTreeSet::new(),
            fork_one_in: 3,
            heads: BTreeMap::new(),
            lamports: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    pub fn epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = epoch;
        self
    }

    /// Upper bound on parents per event, self-parent included.
    pub fn max_parents(mut self, n: usize) -> Self {
        self.max_parents = n.max(1);
        self
    }

    /// Validators allowed to fork.
    pub fn cheaters(mut self, ids: impl IntoIterator<Item = ValidatorId>) -> Self {
        self.cheaters = ids.into_iter().collect();
        self
    }

    /// A cheater opens its second branch with probability `1 / n` per event.
    pub fn fork_one_in(mut self, n: u32) -> Self {
        self.fork_one_in = n;
        self
    }

    /// Generates `count` more events, in causal order.
    pub fn generate(&mut self, count: usize, rng: &mut TestRng) -> Vec<Event> {
        let mut out = Vec::with_capacity(count);
        let mut attempts = 0;
        while out.len() < count && attempts < count * 10 + 100 {
            attempts += 1;
            if let Some(event) = self.next_event(rng) {
                out.push(event);
            }
        }
        out
    }

    /// One random event, or `None` if the attempt collided with an existing hash.
    pub fn next_event(&mut self, rng: &mut TestRng) -> Option<Event> {
        let creator = *rng.pick(&self.validators)?;
        let own = self.heads.get(&creator).cloned().unwrap_or_default();
        let branch = if own.is_empty() {
            None
        } else {
            Some(rng.index(own.len()))
        };
        let head = branch.and_then(|i| own.get(i));
        let fork = self.cheaters.contains(&creator)
            && own.len() < 2
            && head.is_some()
            && rng.one_in(self.fork_one_in);

        let (self_parent, seq) = match head {
            None => (None, 1),
            Some(h) if fork => (h.self_parent().copied(), h.seq),
            Some(h) => (Some(h.hash), h.seq + 1),
        };

        let mut others: Vec<ValidatorId> = self
            .heads
            .keys()
            .copied()
            .filter(|v| *v != creator)
            .collect();
        rng.shuffle(&mut others);
        others.truncate(self.max_parents.saturating_sub(1));

        let mut parents: Vec<EventHash> = self_parent.into_iter().collect();
        for v in others {
            let Some(heads) = self.heads.get(&v) else {
                continue;
            };
            if let Some(p) = rng.pick(heads) {
                parents.push(p.hash);
            }
        }
        let lamport = parents
            .iter()
            .filter_map(|p| self.lamports.get(p))
            .max()
            .copied()
            .unwrap_or(0)
            + 1;

        let event = Event::new(self.epoch, creator, seq, lamport, parents);
        if !self.seen.insert(event.hash) {
            return None;
        }
        self.lamports.insert(event.hash, lamport);
        let heads = self.heads.entry(creator).or_default();
        match branch.and_then(|i| heads.get_mut(i)) {
            Some(slot) if !fork => *slot = event.clone(),
            _ => heads.push(event.clone()),
        }
        Some(event)
    }
}

/// A random topological order of `events`: every parent present in `events`
/// precedes its children.
pub fn causal_shuffle(events: &[Event], rng: &mut TestRng) -> Vec<Event> {
    let position: HashMap<EventHash, usize> =
        events.iter().enumerate().map(|(i, e)| (e.hash, i)).collect();
    let mut pending = vec![0usize; events.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); events.len()];
    for (i, e) in events.iter().enumerate() {
        for p in &e.parents {
            if let Some(&pi) = position.get(p) {
                if let Some(n) = pending.get_mut(i) {
                    *n += 1;
                }
                if let Some(c) = children.get_mut(pi) {
                    c.push(i);
                }
            }
        }
    }

    let mut ready: Vec<usize> = (0..events.len())
        .filter(|i| pending.get(*i) == Some(&0))
        .collect();
    let mut out = Vec::with_capacity(events.len());
    while !ready.is_empty() {
        let next = ready.swap_remove(rng.index(ready.len()));
        if let Some(e) = events.get(next) {
            out.push(e.clone());
        }
        for &c in children.get(next).map(Vec::as_slice).unwrap_or_default() {
            if let Some(n) = pending.get_mut(c) {
                *n -= 1;
                if *n == 0 {
                    ready.push(c);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_causal(events: &[Event]) {
        let mut seen = HashSet::new();
        for e in events {
            for p in &e.parents {
                assert!(seen.contains(p), "parent {p} of {} not emitted first", e.hash);
            }
            seen.insert(e.hash);
        }
    }

    #[test]
    fn honest_dag_is_causal_and_fork_free() {
        let mut rng = TestRng::new(1);
        let events = DagGenerator::new(&gen_nodes(5)).generate(200, &mut rng);
        assert_eq!(events.len(), 200);
        assert_causal(&events);
        let slots: HashSet<_> = events.iter().map(|e| (e.creator, e.seq)).collect();
        assert_eq!(slots.len(), events.len());
    }

    #[test]
    fn cheaters_fork() {
        let mut rng = TestRng::new(2);
        let events = DagGenerator::new(&gen_nodes(4))
            .cheaters([4])
            .fork_one_in(1)
            .generate(300, &mut rng);
        let forked = events.iter().filter(|e| e.creator == 4).count()
            > events
                .iter()
                .filter(|e| e.creator == 4)
                .map(|e| e.seq)
                .collect::<HashSet<_>>()
                .len();
        assert!(forked);
        let honest: Vec<_> = events.iter().filter(|e| e.creator != 4).collect();
        let slots: HashSet<_> = honest.iter().map(|e| (e.creator, e.seq)).collect();
        assert_eq!(slots.len(), honest.len());
    }

    #[test]
    fn shuffle_keeps_causality() {
        let mut rng = TestRng::new(3);
        let events = DagGenerator::new(&gen_nodes(4)).generate(150, &mut rng);
        let shuffled = causal_shuffle(&events, &mut rng);
        assert_eq!(shuffled.len(), events.len());
        assert_causal(&shuffled);
    }
}
