// Path: crates/api/src/events/mod.rs

//! Read access to the event DAG.

use lachesis_types::app::{Event, EventHash};
use std::sync::Arc;

/// Hash-addressed lookup of ingested events. Append-only from the engine's view.
pub trait EventSource {
    /// Whether the event is known.
    fn has_event(&self, hash: &EventHash) -> bool;
    /// Fetches a known event.
    fn get_event(&self, hash: &EventHash) -> Option<Event>;
}

impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    fn has_event(&self, hash: &EventHash) -> bool {
        (**self).has_event(hash)
    }
    fn get_event(&self, hash: &EventHash) -> Option<Event> {
        (**self).get_event(hash)
    }
}
