// Path: crates/types/src/app/event.rs
use super::{Epoch, Frame, Lamport, Seq, ValidatorId};
use crate::codec;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte event identifier.
///
/// Bytes `0..4` hold the big-endian epoch, bytes `4..8` the big-endian Lamport
/// timestamp and the remaining 24 bytes a content digest, so hashes order by
/// `(epoch, lamport)` first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct EventHash(pub [u8; 32]);

impl EventHash {
    /// The all-zero hash. Never produced by [`Event::compute_hash`].
    pub const ZERO: EventHash = EventHash([0u8; 32]);

    /// Assembles a hash from its epoch, Lamport timestamp and 24-byte digest.
    pub fn new(epoch: Epoch, lamport: Lamport, digest: [u8; 24]) -> Self {
        let mut out = [0u8; 32];
        let (head, tail) = out.split_at_mut(8);
        let (e, l) = head.split_at_mut(4);
        e.copy_from_slice(&epoch.to_be_bytes());
        l.copy_from_slice(&lamport.to_be_bytes());
        tail.copy_from_slice(&digest);
        Self(out)
    }

    /// The epoch encoded in the hash prefix.
    pub fn epoch(&self) -> Epoch {
        let [a, b, c, d, ..] = self.0;
        Epoch::from_be_bytes([a, b, c, d])
    }

    /// The Lamport timestamp encoded in the hash prefix.
    pub fn lamport(&self) -> Lamport {
        let [_, _, _, _, a, b, c, d, ..] = self.0;
        Lamport::from_be_bytes([a, b, c, d])
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| format!("invalid event hash {s}: {e}"))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("event hash must be 32 bytes, got {}", b.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHash({})", hex::encode(self.0))
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for EventHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EventHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A validator-produced DAG vertex.
///
/// For every event with `seq > 1` the first parent is the creator's previous
/// event (the self-parent). `frame` is computed by the engine; `0` means it has
/// not been assigned.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Event {
    /// Content-derived identifier.
    pub hash: EventHash,
    /// The epoch the event belongs to.
    pub epoch: Epoch,
    /// The validator that created the event.
    pub creator: ValidatorId,
    /// Per-creator sequence number.
    pub seq: Seq,
    /// Lamport timestamp.
    pub lamport: Lamport,
    /// Ordered parent hashes, self-parent first.
    pub parents: Vec<EventHash>,
    /// Assigned frame, `0` when unassigned.
    #[serde(default)]
    pub frame: Frame,
}

#[derive(Encode)]
struct HashedFields<'a> {
    epoch: Epoch,
    lamport: Lamport,
    creator: ValidatorId,
    seq: Seq,
    parents: &'a [EventHash],
}

impl Event {
    /// Builds an unframed event and derives its hash from the content.
    pub fn new(
        epoch: Epoch,
        creator: ValidatorId,
        seq: Seq,
        lamport: Lamport,
        parents: Vec<EventHash>,
    ) -> Self {
        let mut event = Self {
            hash: EventHash::ZERO,
            epoch,
            creator,
            seq,
            lamport,
            parents,
            frame: 0,
        };
        event.hash = event.compute_hash();
        event
    }

    /// Replaces the derived hash with a recorded one.
    pub fn with_hash(mut self, hash: EventHash) -> Self {
        self.hash = hash;
        self
    }

    /// SHA-256 over the canonical encoding of the identifying fields, truncated to
    /// 24 bytes and prefixed with the epoch and Lamport timestamp.
    pub fn compute_hash(&self) -> EventHash {
        let fields = HashedFields {
            epoch: self.epoch,
            lamport: self.lamport,
            creator: self.creator,
            seq: self.seq,
            parents: &self.parents,
        };
        let encoded = codec::to_bytes_canonical(&fields).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        let mut tail = [0u8; 24];
        if let Some(prefix) = digest.get(..24) {
            tail.copy_from_slice(prefix);
        }
        EventHash::new(self.epoch, self.lamport, tail)
    }

    /// The creator's previous event, if any.
    pub fn self_parent(&self) -> Option<&EventHash> {
        if self.seq > 1 {
            self.parents.first()
        } else {
            None
        }
    }
}
