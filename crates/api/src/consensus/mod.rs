// Path: crates/api/src/consensus/mod.rs

//! Application callbacks invoked once per sealed block.

use lachesis_types::app::{Block, ValidatorSet};

/// The per-block half of the application contract.
pub trait BlockCallbacks {
    /// Finishes the block. Returning a validator set requests an epoch seal:
    /// the returned set governs the next epoch.
    fn end_block(&mut self) -> Option<ValidatorSet>;
}

/// Receives sealed blocks in strictly increasing `(epoch, frame)` order.
pub trait ConsensusCallbacks: Send {
    /// Starts delivery of `block`. The returned handle is finished with
    /// [`BlockCallbacks::end_block`] before the next block begins.
    fn begin_block(&mut self, block: &Block) -> Box<dyn BlockCallbacks + '_>;
}

impl<T: ConsensusCallbacks + ?Sized> ConsensusCallbacks for Box<T> {
    fn begin_block(&mut self, block: &Block) -> Box<dyn BlockCallbacks + '_> {
        (**self).begin_block(block)
    }
}

struct Decided(Option<ValidatorSet>);

impl BlockCallbacks for Decided {
    fn end_block(&mut self) -> Option<ValidatorSet> {
        self.0.take()
    }
}

/// Adapts a closure into [`ConsensusCallbacks`]. The closure sees every block
/// and its return value is handed back from `end_block`.
pub struct FnCallbacks<F>(pub F);

impl<F> ConsensusCallbacks for FnCallbacks<F>
where
    F: FnMut(&Block) -> Option<ValidatorSet> + Send,
{
    fn begin_block(&mut self, block: &Block) -> Box<dyn BlockCallbacks + '_> {
        Box::new(Decided((self.0)(block)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lachesis_types::app::EventHash;

    #[test]
    fn closure_result_is_returned_from_end_block() {
        let next = ValidatorSet::from_weights([(7, 1)]).unwrap();
        let wanted = next.clone();
        let mut seen = Vec::new();
        let mut cb = FnCallbacks(move |b: &Block| {
            seen.push(b.frame);
            (b.frame == 2).then(|| wanted.clone())
        });
        let mut block = Block {
            epoch: 1,
            frame: 1,
            atropos: EventHash::ZERO,
            cheaters: vec![],
            validators: next.clone(),
        };
        assert_eq!(cb.begin_block(&block).end_block(), None);
        block.frame = 2;
        let mut handle = cb.begin_block(&block);
        assert_eq!(handle.end_block(), Some(next));
        assert_eq!(handle.end_block(), None);
    }
}
