// Path: crates/types/src/codec.rs

//! The canonical, deterministic binary codec for every persisted record.
//!
//! Thin wrappers around `parity-scale-codec` (SCALE). Every record the engine
//! writes (event records, roots, blocks, epoch state) goes through these two
//! functions so that two nodes holding the same logical state also hold the
//! same bytes, and so that event hashes are computed over one agreed layout.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical SCALE byte representation.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Result<Vec<u8>, String> {
    Ok(v.encode())
}

/// Decodes a value from its canonical SCALE byte representation.
///
/// Trailing bytes are rejected: a record that decodes with input left over was
/// not written by [`to_bytes_canonical`] and is reported as corrupt.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Block, EventHash, EventRecord, ValidatorSet};

    #[test]
    fn block_record_survives_the_codec() {
        let validators = ValidatorSet::from_weights([(1, 10), (2, 20)]).unwrap();
        let block = Block {
            epoch: 3,
            frame: 7,
            atropos: EventHash::new(3, 42, [9u8; 24]),
            cheaters: vec![2],
            validators,
        };
        let encoded = to_bytes_canonical(&block).unwrap();
        let decoded = from_bytes_canonical::<Block>(&encoded).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let record = EventRecord {
            frame: 12,
            is_root: true,
        };
        let mut encoded = to_bytes_canonical(&record).unwrap();
        encoded.pop();
        let err = from_bytes_canonical::<EventRecord>(&encoded).unwrap_err();
        assert!(err.contains("canonical decode failed"));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = to_bytes_canonical(&5u32).unwrap();
        encoded.push(0);
        assert!(from_bytes_canonical::<u32>(&encoded).is_err());
    }
}
