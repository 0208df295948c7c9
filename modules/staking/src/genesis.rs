//! Staking genesis configuration

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tidemark_consensus::ValidatorSet;
use tidemark_core::{
    Address, KvStore, TidemarkError, TidemarkResult, Validator, ValidatorAccount, ValidatorId,
};
use tidemark_crypto::keys::verify_signer_address;
use tracing::info;

use crate::keeper::{StakingKeeper, DEFAULT_PROPOSER_BONUS_PERCENT};

fn default_bonus() -> u64 {
    DEFAULT_PROPOSER_BONUS_PERCENT
}

/// Staking genesis state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Validator directory
    pub validators: Vec<Validator>,

    /// Exported set; rebuilt from `validators` when empty
    #[serde(default)]
    pub current_val_set: ValidatorSet,

    #[serde(default)]
    pub validator_accounts: Vec<ValidatorAccount>,

    #[serde(default = "default_bonus")]
    pub proposer_bonus_percent: u64,
}

impl Default for GenesisState {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
            current_val_set: ValidatorSet::default(),
            validator_accounts: Vec::new(),
            proposer_bonus_percent: DEFAULT_PROPOSER_BONUS_PERCENT,
        }
    }
}

impl GenesisState {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self {
            validators,
            ..Default::default()
        }
    }

    /// Add a genesis validator
    pub fn add_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn add_account(mut self, account: ValidatorAccount) -> Self {
        self.validator_accounts.push(account);
        self
    }

    pub fn with_proposer_bonus(mut self, percent: u64) -> Self {
        self.proposer_bonus_percent = percent;
        self
    }

    /// Members of the genesis set
    fn set_members(&self) -> &[Validator] {
        if self.current_val_set.is_empty() {
            &self.validators
        } else {
            &self.current_val_set.validators
        }
    }

    pub fn to_json(&self) -> TidemarkResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> TidemarkResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reject a genesis the chain cannot start from
pub fn validate_genesis(genesis: &GenesisState) -> TidemarkResult<()> {
    check_unique(&genesis.validators, "validator directory")?;
    check_unique(&genesis.current_val_set.validators, "current validator set")?;

    // a signer names one validator across the directory and the set
    let mut owners: BTreeMap<Address, ValidatorId> = BTreeMap::new();
    for validator in genesis.validators.iter().chain(&genesis.current_val_set.validators) {
        let owner = *owners.entry(validator.signer).or_insert(validator.id);
        if owner != validator.id {
            return Err(TidemarkError::InvalidGenesis(format!(
                "signer {} is shared by validators {} and {}",
                validator.signer, owner, validator.id
            )));
        }
    }

    if let Some(proposer) = &genesis.current_val_set.proposer {
        if !genesis.current_val_set.has_signer(proposer) {
            return Err(TidemarkError::InvalidGenesis(format!(
                "proposer {} is not a member of the current validator set",
                proposer
            )));
        }
    }

    let total: i64 = genesis
        .set_members()
        .iter()
        .fold(0i64, |acc, v| acc.saturating_add(v.voting_power));
    if total <= 0 {
        return Err(TidemarkError::InvalidGenesis(
            "genesis validator set has no voting power".to_string(),
        ));
    }

    if genesis.proposer_bonus_percent > 100 {
        return Err(TidemarkError::InvalidGenesis(format!(
            "proposer bonus {}% exceeds 100%",
            genesis.proposer_bonus_percent
        )));
    }
    Ok(())
}

/// Well-formed entries with distinct ids and signers
fn check_unique(validators: &[Validator], what: &str) -> TidemarkResult<()> {
    let mut ids = BTreeSet::new();
    let mut signers = BTreeSet::new();
    for validator in validators {
        check_validator(validator)?;
        if !ids.insert(validator.id) {
            return Err(TidemarkError::InvalidGenesis(format!(
                "duplicate validator id {} in {}",
                validator.id, what
            )));
        }
        if !signers.insert(validator.signer) {
            return Err(TidemarkError::InvalidGenesis(format!(
                "duplicate signer {} in {}",
                validator.signer, what
            )));
        }
    }
    Ok(())
}

fn check_validator(validator: &Validator) -> TidemarkResult<()> {
    if !validator.validate_basic() {
        return Err(TidemarkError::InvalidGenesis(format!(
            "malformed validator {}",
            validator.id
        )));
    }
    if !verify_signer_address(&validator.signer, &validator.pub_key) {
        return Err(TidemarkError::InvalidGenesis(format!(
            "signer {} does not match public key of validator {}",
            validator.signer, validator.id
        )));
    }
    Ok(())
}

/// Write the genesis directory, set, accounts and bonus
pub fn init_genesis(
    keeper: &StakingKeeper,
    store: &mut dyn KvStore,
    genesis: &GenesisState,
) -> TidemarkResult<()> {
    validate_genesis(genesis)?;

    // an exported set already carries its priorities and proposer
    let set = if genesis.current_val_set.proposer.is_some() {
        genesis.current_val_set.clone()
    } else {
        ValidatorSet::new(genesis.set_members().to_vec())
    };

    let mut directory: Vec<&Validator> = genesis.validators.iter().collect();
    for member in &set.validators {
        if !genesis.validators.iter().any(|v| v.id == member.id) {
            directory.push(member);
        }
    }

    for validator in directory {
        keeper.add_validator(store, validator)?;
        let account = genesis
            .validator_accounts
            .iter()
            .find(|a| a.id == validator.id)
            .cloned()
            .unwrap_or_else(|| ValidatorAccount::new(validator.id));
        keeper.set_validator_account(store, &account)?;
    }

    keeper.update_validator_set_in_store(store, &set)?;
    keeper.set_proposer_bonus_percent(store, genesis.proposer_bonus_percent)?;

    info!(
        validators = genesis.validators.len(),
        set_size = set.len(),
        total_power = set.total_voting_power(),
        proposer = ?set.proposer,
        "Initialized staking genesis"
    );
    Ok(())
}

/// Read the staking state back into a genesis document
pub fn export_genesis(keeper: &StakingKeeper, store: &dyn KvStore) -> TidemarkResult<GenesisState> {
    Ok(GenesisState {
        validators: keeper.get_all_validators(store)?,
        current_val_set: keeper.get_validator_set(store)?,
        validator_accounts: keeper.get_all_validator_accounts(store)?,
        proposer_bonus_percent: keeper.get_proposer_bonus_percent(store)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::Amount;
    use tidemark_crypto::keys::KeyPair;
    use tidemark_state::MemoryStore;

    fn validator(seed: u8, power: i64) -> Validator {
        let kp = KeyPair::from_seed(&[seed; 32]);
        Validator::new(ValidatorId::new(seed as u64), kp.address(), kp.public_key(), power)
    }

    #[test]
    fn test_genesis_json() {
        let genesis = GenesisState::new(vec![validator(1, 10)]).with_proposer_bonus(5);
        let json = genesis.to_json().unwrap();
        let restored = GenesisState::from_json(&json).unwrap();

        assert_eq!(restored.validators, genesis.validators);
        assert_eq!(restored.proposer_bonus_percent, 5);
    }

    #[test]
    fn test_bonus_defaults_when_missing() {
        let json = r#"{"validators": []}"#;
        let genesis = GenesisState::from_json(json).unwrap();
        assert_eq!(genesis.proposer_bonus_percent, DEFAULT_PROPOSER_BONUS_PERCENT);
    }

    #[test]
    fn test_validate_genesis_rejects() {
        // no power
        assert!(validate_genesis(&GenesisState::default()).is_err());

        // duplicate id
        let dup = GenesisState::new(vec![validator(1, 10), validator(1, 10)]);
        assert!(matches!(validate_genesis(&dup), Err(TidemarkError::InvalidGenesis(_))));

        // forged signer
        let mut forged = validator(2, 10);
        forged.signer = Address([3u8; 32]);
        assert!(validate_genesis(&GenesisState::new(vec![forged])).is_err());

        // zero key
        let mut zero = validator(3, 10);
        zero.pub_key = tidemark_core::PublicKey::ZERO;
        assert!(validate_genesis(&GenesisState::new(vec![zero])).is_err());

        assert!(validate_genesis(&GenesisState::new(vec![validator(4, 10)])).is_ok());
    }

    #[test]
    fn test_validate_genesis_rejects_shared_signer() {
        let kp = KeyPair::from_seed(&[1; 32]);
        let twin = |id: u64, power: i64| {
            Validator::new(ValidatorId::new(id), kp.address(), kp.public_key(), power)
        };

        let keeper = StakingKeeper::new();
        let mut store = MemoryStore::new();
        let genesis = GenesisState::new(vec![twin(1, 10), twin(2, 60)]);
        assert!(matches!(
            init_genesis(&keeper, &mut store, &genesis),
            Err(TidemarkError::InvalidGenesis(_))
        ));
        assert!(keeper.get_all_validators(&store).unwrap().is_empty());

        // same key exported under two ids in the set
        let mut exported = GenesisState::new(vec![validator(2, 10)]);
        exported.current_val_set = ValidatorSet::new(vec![twin(1, 10), twin(3, 10)]);
        assert!(matches!(validate_genesis(&exported), Err(TidemarkError::InvalidGenesis(_))));

        // directory and set disagree on who owns a signer
        let mut crossed = GenesisState::new(vec![twin(1, 10)]);
        crossed.current_val_set = ValidatorSet::new(vec![twin(4, 10)]);
        assert!(matches!(validate_genesis(&crossed), Err(TidemarkError::InvalidGenesis(_))));
    }

    #[test]
    fn test_validate_genesis_rejects_foreign_proposer() {
        let mut genesis = GenesisState::new(vec![validator(1, 10), validator(2, 10)]);
        genesis.current_val_set = ValidatorSet::new(genesis.validators.clone());
        assert!(validate_genesis(&genesis).is_ok());

        genesis.current_val_set.proposer = Some(validator(9, 10).signer);
        assert!(matches!(validate_genesis(&genesis), Err(TidemarkError::InvalidGenesis(_))));
    }

    #[test]
    fn test_init_genesis_elects_proposer() {
        let keeper = StakingKeeper::new();
        let mut store = MemoryStore::new();
        let genesis = GenesisState::new(vec![validator(1, 10), validator(2, 20)])
            .add_account(ValidatorAccount {
                id: ValidatorId::new(1),
                reward_amount: Amount::new(7),
                slashed_amount: Amount::ZERO,
            });

        init_genesis(&keeper, &mut store, &genesis).unwrap();

        let set = keeper.get_validator_set(&store).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.proposer().is_some());

        let accounts = keeper.get_all_validator_accounts(&store).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].reward_amount, Amount::new(7));
        assert_eq!(accounts[1], ValidatorAccount::new(ValidatorId::new(2)));
    }

    #[test]
    fn test_invalid_genesis_writes_nothing() {
        let keeper = StakingKeeper::new();
        let mut store = MemoryStore::new();
        assert!(init_genesis(&keeper, &mut store, &GenesisState::default()).is_err());
        assert!(keeper.get_all_validators(&store).unwrap().is_empty());
    }

    #[test]
    fn test_export_then_import() {
        let keeper = StakingKeeper::new();
        let mut store = MemoryStore::new();
        let genesis = GenesisState::new(vec![validator(1, 10), validator(2, 10)]);
        init_genesis(&keeper, &mut store, &genesis).unwrap();
        keeper.increment_accum(&mut store, 3).unwrap();

        let exported = export_genesis(&keeper, &store).unwrap();
        let mut other = MemoryStore::new();
        init_genesis(&keeper, &mut other, &exported).unwrap();

        assert_eq!(
            keeper.get_validator_set(&other).unwrap(),
            keeper.get_validator_set(&store).unwrap()
        );
    }
}
