// Path: crates/consensus/src/roots.rs

//! In-memory index of the roots of the current epoch, grouped by frame.

use lachesis_types::app::{EventHash, Frame, ValidatorId};
use std::collections::BTreeMap;

/// A root and the election slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RootAndSlot {
    /// The frame the event is a root of.
    pub frame: Frame,
    /// The root's creator.
    pub validator: ValidatorId,
    /// The root event.
    pub hash: EventHash,
}

/// Roots per frame, each frame's list ordered by `(validator, hash)`.
#[derive(Debug, Clone, Default)]
pub struct RootIndex {
    frames: BTreeMap<Frame, Vec<RootAndSlot>>,
}

impl RootIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root. Returns false if it was already present.
    pub fn insert(&mut self, root: RootAndSlot) -> bool {
        let list = self.frames.entry(root.frame).or_default();
        match list.binary_search(&root) {
            Ok(_) => false,
            Err(pos) => {
                list.insert(pos, root);
                true
            }
        }
    }

    /// Roots of `frame`, in slot order.
    pub fn frame_roots(&self, frame: Frame) -> &[RootAndSlot] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or_default()
    }

    /// The highest frame with at least one root.
    pub fn max_frame(&self) -> Option<Frame> {
        self.frames.keys().next_back().copied()
    }

    /// Total number of roots.
    pub fn len(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
