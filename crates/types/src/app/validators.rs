// Path: crates/types/src/app/validators.rs
use super::{ValidatorId, Weight};
use crate::error::ValidatorSetError;
use parity_scale_codec::{Decode, Encode, Input, Output};
use serde::{Deserialize, Serialize};

/// A single voting member and its weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize)]
pub struct Validator {
    /// Validator identifier.
    pub id: ValidatorId,
    /// Positive voting weight.
    pub weight: Weight,
}

/// The weighted validator set of one epoch.
///
/// Members are kept in canonical order: weight descending, then id ascending.
/// That order is the election's candidate order and the order cheaters are
/// listed in blocks, so every node must agree on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Validator>", into = "Vec<Validator>")]
pub struct ValidatorSet {
    members: Vec<Validator>,
    total_weight: Weight,
}

impl ValidatorSet {
    /// Validates and canonicalizes a member list.
    pub fn new(mut members: Vec<Validator>) -> Result<Self, ValidatorSetError> {
        if members.is_empty() {
            return Err(ValidatorSetError::Empty);
        }
        let mut total: Weight = 0;
        for v in &members {
            if v.weight == 0 {
                return Err(ValidatorSetError::ZeroWeight(v.id));
            }
            total = total
                .checked_add(v.weight)
                .ok_or(ValidatorSetError::WeightOverflow)?;
        }
        // Quorum arithmetic multiplies by two.
        if total > Weight::MAX / 2 {
            return Err(ValidatorSetError::WeightOverflow);
        }
        members.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.id.cmp(&b.id)));
        let mut ids: Vec<ValidatorId> = members.iter().map(|v| v.id).collect();
        ids.sort_unstable();
        if let Some(w) = ids.windows(2).find(|w| w.first() == w.get(1)) {
            return Err(ValidatorSetError::Duplicate(
                w.first().copied().unwrap_or_default(),
            ));
        }
        Ok(Self {
            members,
            total_weight: total,
        })
    }

    /// Convenience constructor from `(id, weight)` pairs.
    pub fn from_weights<I>(weights: I) -> Result<Self, ValidatorSetError>
    where
        I: IntoIterator<Item = (ValidatorId, Weight)>,
    {
        Self::new(
            weights
                .into_iter()
                .map(|(id, weight)| Validator { id, weight })
                .collect(),
        )
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    /// The smallest weight strictly greater than two thirds of the total.
    pub fn quorum(&self) -> Weight {
        self.total_weight * 2 / 3 + 1
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for a constructed set; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: ValidatorId) -> bool {
        self.index_of(id).is_some()
    }

    /// The weight of `id`, if a member.
    pub fn weight_of(&self, id: ValidatorId) -> Option<Weight> {
        self.members.iter().find(|v| v.id == id).map(|v| v.weight)
    }

    /// Position of `id` in canonical order.
    pub fn index_of(&self, id: ValidatorId) -> Option<usize> {
        self.members.iter().position(|v| v.id == id)
    }

    /// The member at canonical position `idx`.
    pub fn get(&self, idx: usize) -> Option<&Validator> {
        self.members.get(idx)
    }

    /// Members in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Validator> + '_ {
        self.members.iter()
    }

    /// Member ids in canonical order.
    pub fn sorted_ids(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.members.iter().map(|v| v.id)
    }

    /// A fresh weight accumulator over this set.
    pub fn new_counter(&self) -> WeightCounter<'_> {
        WeightCounter {
            validators: self,
            counted: vec![false; self.members.len()],
            sum: 0,
        }
    }
}

impl TryFrom<Vec<Validator>> for ValidatorSet {
    type Error = ValidatorSetError;

    fn try_from(members: Vec<Validator>) -> Result<Self, Self::Error> {
        Self::new(members)
    }
}

impl From<ValidatorSet> for Vec<Validator> {
    fn from(set: ValidatorSet) -> Self {
        set.members
    }
}

impl Encode for ValidatorSet {
    fn size_hint(&self) -> usize {
        self.members.size_hint()
    }

    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        self.members.encode_to(dest)
    }
}

impl Decode for ValidatorSet {
    fn decode<I: Input>(input: &mut I) -> Result<Self, parity_scale_codec::Error> {
        let members = Vec::<Validator>::decode(input)?;
        Self::new(members).map_err(|_| "invalid validator set".into())
    }
}

/// Accumulates the weight of distinct validators.
#[derive(Debug, Clone)]
pub struct WeightCounter<'a> {
    validators: &'a ValidatorSet,
    counted: Vec<bool>,
    sum: Weight,
}

impl WeightCounter<'_> {
    /// Adds `id`'s weight. Returns false if `id` is unknown or already counted.
    pub fn count(&mut self, id: ValidatorId) -> bool {
        let Some(idx) = self.validators.index_of(id) else {
            return false;
        };
        match (self.counted.get_mut(idx), self.validators.get(idx)) {
            (Some(seen), Some(v)) if !*seen => {
                *seen = true;
                self.sum += v.weight;
                true
            }
            _ => false,
        }
    }

    /// Accumulated weight.
    pub fn sum(&self) -> Weight {
        self.sum
    }

    /// Whether the accumulated weight reaches quorum.
    pub fn has_quorum(&self) -> bool {
        self.sum >= self.validators.quorum()
    }
}
