// Path: crates/consensus/src/forks.rs

//! Fork (equivocation) bookkeeping for the current epoch.

use lachesis_types::app::{Equivocation, Event, EventHash, Seq, ValidatorId};
use std::collections::{BTreeSet, HashMap};

/// Remembers the first event seen for each `(creator, seq)` and the validators
/// caught forking.
#[derive(Debug, Clone, Default)]
pub struct ForkTracker {
    seen: HashMap<(ValidatorId, Seq), EventHash>,
    cheaters: BTreeSet<ValidatorId>,
}

impl ForkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the tracker from persisted entries.
    pub fn load(
        seen: impl IntoIterator<Item = ((ValidatorId, Seq), EventHash)>,
        cheaters: impl IntoIterator<Item = ValidatorId>,
    ) -> Self {
        Self {
            seen: seen.into_iter().collect(),
            cheaters: cheaters.into_iter().collect(),
        }
    }

    /// Reports a collision of `event` with an earlier event, without recording anything.
    pub fn check(&self, event: &Event) -> Option<Equivocation> {
        match self.seen.get(&(event.creator, event.seq)) {
            Some(existing) if *existing != event.hash => Some(Equivocation {
                validator: event.creator,
                seq: event.seq,
                existing: *existing,
                conflicting: event.hash,
            }),
            _ => None,
        }
    }

    /// Whether `(creator, seq)` has no entry yet.
    pub fn is_first(&self, event: &Event) -> bool {
        !self.seen.contains_key(&(event.creator, event.seq))
    }

    /// Records `event`; the first hash for a `(creator, seq)` is kept.
    pub fn record(&mut self, event: &Event) {
        self.seen
            .entry((event.creator, event.seq))
            .or_insert(event.hash);
    }

    /// Marks `validator` as a cheater. Returns true if it was not one already.
    pub fn mark(&mut self, validator: ValidatorId) -> bool {
        self.cheaters.insert(validator)
    }

    pub fn is_cheater(&self, validator: ValidatorId) -> bool {
        self.cheaters.contains(&validator)
    }

    /// Cheaters in ascending id order.
    pub fn cheaters(&self) -> &BTreeSet<ValidatorId> {
        &self.cheaters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_event_with_same_seq_is_a_fork() {
        let mut t = ForkTracker::new();
        let a = Event::new(1, 5, 1, 1, vec![]);
        let b = Event::new(1, 5, 1, 2, vec![]);
        assert!(t.check(&a).is_none());
        t.record(&a);
        assert!(t.check(&a).is_none());

        let eq = t.check(&b).unwrap();
        assert_eq!(eq.validator, 5);
        assert_eq!(eq.existing, a.hash);
        assert_eq!(eq.conflicting, b.hash);

        assert!(t.mark(5));
        assert!(!t.mark(5));
        t.record(&b);
        // The first hash stays authoritative.
        assert_eq!(t.check(&b).map(|e| e.existing), Some(a.hash));
        assert!(t.is_cheater(5));
    }
}
