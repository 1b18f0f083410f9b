// Path: crates/consensus/src/frame.rs

//! Frame assignment and root detection.

use crate::roots::RootIndex;
use lachesis_api::oracle::CausalityOracle;
use lachesis_types::app::{Event, Frame, ValidatorSet, FIRST_FRAME};
use lachesis_types::error::OracleError;

/// The frame of an event and whether it is a root of that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame: Frame,
    pub is_root: bool,
}

/// Computes the frame of `event`, which must already be indexed by `oracle`.
///
/// `max_parent_frame` is `None` for a parentless event, which is a root of the
/// first frame. Otherwise the event belongs to `F + 1` iff it forkless-causes
/// a quorum of the roots of `F`, the highest parent frame; validators are
/// counted once each. An event without a self-parent opens its creator's
/// chain and is a root of whichever frame it lands in.
pub fn calc_frame<O: CausalityOracle + ?Sized>(
    event: &Event,
    max_parent_frame: Option<Frame>,
    roots: &RootIndex,
    validators: &ValidatorSet,
    oracle: &O,
) -> Result<FrameInfo, OracleError> {
    let Some(frame) = max_parent_frame else {
        return Ok(FrameInfo {
            frame: FIRST_FRAME,
            is_root: true,
        });
    };
    let mut counter = validators.new_counter();
    for root in roots.frame_roots(frame) {
        if oracle.forkless_cause(&event.hash, &root.hash)?
            && counter.count(root.validator)
            && counter.has_quorum()
        {
            return Ok(FrameInfo {
                frame: frame.saturating_add(1),
                is_root: true,
            });
        }
    }
    Ok(FrameInfo {
        frame,
        is_root: event.self_parent().is_none(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roots::RootAndSlot;
    use crate::vecfc::DagIndex;

    #[test]
    fn parentless_event_is_first_frame_root() {
        let vs = ValidatorSet::from_weights([(1, 1)]).unwrap();
        let e = Event::new(1, 1, 1, 1, vec![]);
        let info = calc_frame(&e, None, &RootIndex::new(), &vs, &DagIndex::new()).unwrap();
        assert_eq!(
            info,
            FrameInfo {
                frame: 1,
                is_root: true
            }
        );
    }

    #[test]
    fn first_event_with_parents_is_a_root() {
        let vs = ValidatorSet::from_weights([(1, 1), (2, 1), (3, 1), (4, 1)]).unwrap();
        let mut dag = DagIndex::with_validators(&vs);
        let mut roots = RootIndex::new();

        let a1 = Event::new(1, 1, 1, 1, vec![]);
        dag.add_event(&a1).unwrap();
        roots.insert(RootAndSlot {
            frame: 1,
            validator: 1,
            hash: a1.hash,
        });
        let b1 = Event::new(1, 2, 1, 2, vec![a1.hash]);
        dag.add_event(&b1).unwrap();
        let info = calc_frame(&b1, Some(1), &roots, &vs, &dag).unwrap();
        assert_eq!(
            info,
            FrameInfo {
                frame: 1,
                is_root: true
            }
        );

        // A later event of the same chain that misses the quorum is not a root.
        let b2 = Event::new(1, 2, 2, 3, vec![b1.hash]);
        dag.add_event(&b2).unwrap();
        let info = calc_frame(&b2, Some(1), &roots, &vs, &dag).unwrap();
        assert!(!info.is_root);
    }

    #[test]
    fn heavy_validator_advances_alone() {
        let vs = ValidatorSet::from_weights([(1, 1), (2, 3)]).unwrap();
        let mut dag = DagIndex::with_validators(&vs);
        let mut roots = RootIndex::new();

        let b1 = Event::new(1, 2, 1, 1, vec![]);
        dag.add_event(&b1).unwrap();
        roots.insert(RootAndSlot {
            frame: 1,
            validator: 2,
            hash: b1.hash,
        });
        let b2 = Event::new(1, 2, 2, 2, vec![b1.hash]);
        dag.add_event(&b2).unwrap();
        let info = calc_frame(&b2, Some(1), &roots, &vs, &dag).unwrap();
        assert_eq!(info.frame, 2);
        assert!(info.is_root);

        let a1 = Event::new(1, 1, 1, 1, vec![]);
        dag.add_event(&a1).unwrap();
        roots.insert(RootAndSlot {
            frame: 1,
            validator: 1,
            hash: a1.hash,
        });
        let a2 = Event::new(1, 1, 2, 2, vec![a1.hash]);
        dag.add_event(&a2).unwrap();
        // Validator 1 alone is far from a quorum.
        let info = calc_frame(&a2, Some(1), &roots, &vs, &dag).unwrap();
        assert_eq!(info.frame, 1);
        assert!(!info.is_root);
    }
}
