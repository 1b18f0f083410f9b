// Path: crates/types/src/config/mod.rs

//! Configuration structures for the engine, its store and genesis.

use crate::app::{Epoch, Genesis, Validator, ValidatorId, ValidatorSet, Weight, FIRST_EPOCH};
use crate::error::ValidatorSetError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Delete per-event, per-root and cheater records of an epoch when it is sealed.
    /// Blocks and validator snapshots are always kept.
    #[serde(default = "default_drop_sealed_epochs")]
    pub drop_sealed_epochs: bool,
    /// Which key-value backend holds the engine state.
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_drop_sealed_epochs() -> bool {
    true
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            drop_sealed_epochs: default_drop_sealed_epochs(),
            store: StoreConfig::default(),
        }
    }
}

/// Selects the key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Volatile in-process map.
    #[default]
    Memory,
    /// A `redb` database file.
    Redb {
        /// Path of the database file; created if absent.
        path: PathBuf,
    },
}

/// One validator entry of a genesis file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Validator identifier.
    pub id: ValidatorId,
    /// Voting weight.
    pub weight: Weight,
}

/// A genesis file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// The starting epoch.
    #[serde(default = "default_genesis_epoch")]
    pub epoch: Epoch,
    /// The initial validator set.
    pub validators: Vec<GenesisValidator>,
}

fn default_genesis_epoch() -> Epoch {
    FIRST_EPOCH
}

impl TryFrom<GenesisConfig> for Genesis {
    type Error = ValidatorSetError;

    fn try_from(cfg: GenesisConfig) -> Result<Self, Self::Error> {
        let validators = ValidatorSet::new(
            cfg.validators
                .into_iter()
                .map(|v| Validator {
                    id: v.id,
                    weight: v.weight,
                })
                .collect(),
        )?;
        Ok(Genesis {
            epoch: cfg.epoch,
            validators,
        })
    }
}
