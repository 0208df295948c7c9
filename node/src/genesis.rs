//! Application genesis document

use serde::{Deserialize, Serialize};
use std::path::Path;
use tidemark_core::{TidemarkResult, Validator, ValidatorId};
use tidemark_crypto::keys::KeyPair;

/// Genesis of every module, stored as one JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppGenesis {
    pub staking: tidemark_staking::GenesisState,
    #[serde(default)]
    pub delegation: tidemark_delegation::GenesisState,
    #[serde(default)]
    pub checkpoint: tidemark_checkpoint::GenesisState,
}

impl AppGenesis {
    /// Devnet genesis with `keypair` as the only validator
    pub fn single_validator(keypair: &KeyPair, power: i64) -> Self {
        let validator = Validator::new(
            ValidatorId::new(1),
            keypair.address(),
            keypair.public_key(),
            power,
        );
        Self {
            staking: tidemark_staking::GenesisState::new(vec![validator]),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> TidemarkResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> TidemarkResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> TidemarkResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> TidemarkResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
