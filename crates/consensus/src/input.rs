// Path: crates/consensus/src/input.rs

//! An in-memory event source.

use lachesis_api::events::EventSource;
use lachesis_types::app::{Event, EventHash};
use std::collections::HashMap;

/// Hash-addressed events kept in a map. Used by replay, tests and the CLI.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    events: HashMap<EventHash, Event>,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSource for MemoryEventSource {
    fn has_event(&self, hash: &EventHash) -> bool {
        self.events.contains_key(hash)
    }

    fn get_event(&self, hash: &EventHash) -> Option<Event> {
        self.events.get(hash).cloned()
    }
}

impl FromIterator<Event> for MemoryEventSource {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().map(|e| (e.hash, e)).collect(),
        }
    }
}
