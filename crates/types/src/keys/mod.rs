// Path: crates/types/src/keys/mod.rs

//! The persisted key layout.
//!
//! Every engine record lives in a single ordered key space. Keys are a textual
//! namespace followed by big-endian fields, so a prefix scan over
//! `namespace || epoch` yields one epoch's records in `(frame, validator, hash)`
//! order.

use crate::app::{BlockKey, Epoch, EventHash, Frame, Seq, ValidatorId};

/// The applied genesis.
pub const GENESIS_KEY: &[u8] = b"lachesis::genesis";
/// The current [`EpochState`](crate::app::EpochState).
pub const EPOCH_STATE_KEY: &[u8] = b"lachesis::epoch";
/// The last decided frame of the current epoch.
pub const LAST_DECIDED_KEY: &[u8] = b"lachesis::last_decided";
/// The key of the last delivered block.
pub const LAST_BLOCK_KEY: &[u8] = b"lachesis::last_block";

/// Prefix of per-epoch validator snapshots.
pub const VALIDATORS_PREFIX: &[u8] = b"lachesis::validators::";
/// Prefix of per-event `(frame, is_root)` records.
pub const EVENT_PREFIX: &[u8] = b"lachesis::event::";
/// Prefix of per-root slot entries.
pub const ROOT_PREFIX: &[u8] = b"lachesis::root::";
/// Prefix of first-seen `(creator, seq) -> hash` entries.
pub const SEQ_PREFIX: &[u8] = b"lachesis::seq::";
/// Prefix of the per-epoch cheater set.
pub const CHEATER_PREFIX: &[u8] = b"lachesis::cheater::";
/// Prefix of sealed blocks.
pub const BLOCK_PREFIX: &[u8] = b"lachesis::block::";

/// Encodes a u32 into a big-endian byte array, suitable for ordered key scans.
#[inline]
pub fn be32(x: u32) -> [u8; 4] {
    x.to_be_bytes()
}

fn read_be32(b: &[u8]) -> Option<u32> {
    let arr: [u8; 4] = b.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(arr))
}

fn read_hash(b: &[u8]) -> Option<EventHash> {
    let arr: [u8; 32] = b.try_into().ok()?;
    Some(EventHash(arr))
}

fn with_epoch(prefix: &[u8], epoch: Epoch) -> Vec<u8> {
    [prefix, &be32(epoch)].concat()
}

/// Key of the validator snapshot of `epoch`.
pub fn validators_key(epoch: Epoch) -> Vec<u8> {
    with_epoch(VALIDATORS_PREFIX, epoch)
}

/// Scan prefix of all event records of `epoch`.
pub fn event_prefix(epoch: Epoch) -> Vec<u8> {
    with_epoch(EVENT_PREFIX, epoch)
}

/// Key of the event record of `hash`.
pub fn event_key(epoch: Epoch, hash: &EventHash) -> Vec<u8> {
    [event_prefix(epoch).as_slice(), hash.as_bytes()].concat()
}

/// Scan prefix of all roots of `epoch`.
pub fn root_prefix(epoch: Epoch) -> Vec<u8> {
    with_epoch(ROOT_PREFIX, epoch)
}

/// Key of a root entry.
pub fn root_key(epoch: Epoch, frame: Frame, validator: ValidatorId, hash: &EventHash) -> Vec<u8> {
    [
        root_prefix(epoch).as_slice(),
        &be32(frame),
        &be32(validator),
        hash.as_bytes(),
    ]
    .concat()
}

/// Splits a root key into `(frame, validator, hash)`.
pub fn parse_root_key(epoch: Epoch, key: &[u8]) -> Option<(Frame, ValidatorId, EventHash)> {
    let rest = key.strip_prefix(root_prefix(epoch).as_slice())?;
    let frame = read_be32(rest)?;
    let validator = read_be32(rest.get(4..)?)?;
    let hash = read_hash(rest.get(8..)?)?;
    Some((frame, validator, hash))
}

/// Scan prefix of all `(creator, seq)` entries of `epoch`.
pub fn seq_prefix(epoch: Epoch) -> Vec<u8> {
    with_epoch(SEQ_PREFIX, epoch)
}

/// Key of the first-seen hash for `(creator, seq)`.
pub fn seq_key(epoch: Epoch, creator: ValidatorId, seq: Seq) -> Vec<u8> {
    [seq_prefix(epoch).as_slice(), &be32(creator), &be32(seq)].concat()
}

/// Splits a seq key into `(creator, seq)`.
pub fn parse_seq_key(epoch: Epoch, key: &[u8]) -> Option<(ValidatorId, Seq)> {
    let rest = key.strip_prefix(seq_prefix(epoch).as_slice())?;
    Some((read_be32(rest)?, read_be32(rest.get(4..)?)?))
}

/// Scan prefix of the cheater set of `epoch`.
pub fn cheater_prefix(epoch: Epoch) -> Vec<u8> {
    with_epoch(CHEATER_PREFIX, epoch)
}

/// Key marking `validator` as a cheater in `epoch`.
pub fn cheater_key(epoch: Epoch, validator: ValidatorId) -> Vec<u8> {
    [cheater_prefix(epoch).as_slice(), &be32(validator)].concat()
}

/// Extracts the validator from a cheater key.
pub fn parse_cheater_key(epoch: Epoch, key: &[u8]) -> Option<ValidatorId> {
    read_be32(key.strip_prefix(cheater_prefix(epoch).as_slice())?)
}

/// Key of a sealed block.
pub fn block_key(key: BlockKey) -> Vec<u8> {
    [BLOCK_PREFIX, &be32(key.epoch), &be32(key.frame)].concat()
}

/// Scan prefix of the blocks of `epoch`.
pub fn block_prefix(epoch: Epoch) -> Vec<u8> {
    with_epoch(BLOCK_PREFIX, epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_keys_parse_back() {
        let h = EventHash::new(2, 17, [4u8; 24]);
        let key = root_key(2, 9, 3, &h);
        assert_eq!(parse_root_key(2, &key), Some((9, 3, h)));
        assert_eq!(parse_root_key(3, &key), None);
    }

    #[test]
    fn root_keys_sort_by_frame_first() {
        let h = EventHash::new(1, 1, [0xff; 24]);
        let low = root_key(1, 2, 900, &h);
        let high = root_key(1, 3, 1, &EventHash::ZERO);
        assert!(low < high);
    }

    #[test]
    fn namespaces_do_not_overlap() {
        let e = event_key(1, &EventHash::ZERO);
        assert!(!e.starts_with(EPOCH_STATE_KEY));
        assert!(!EPOCH_STATE_KEY.starts_with(EVENT_PREFIX));
        assert!(e.starts_with(&event_prefix(1)));
        assert!(!e.starts_with(&event_prefix(2)));
    }

    #[test]
    fn seq_and_cheater_keys_parse_back() {
        assert_eq!(parse_seq_key(5, &seq_key(5, 7, 11)), Some((7, 11)));
        assert_eq!(parse_cheater_key(5, &cheater_key(5, 7)), Some(7));
        assert_eq!(parse_cheater_key(5, b"junk"), None);
    }
}
