//! Staking keeper - validator directory and current set

use tidemark_consensus::{get_updated_validators, validator_updates, ValidatorSet};
use tidemark_core::{
    load, load_prefix, save, Address, Amount, CheckpointStaking, KvStore, SignerRewards,
    TidemarkError, TidemarkResult, Validator, ValidatorAccount, ValidatorDirectory, ValidatorId,
    ValidatorUpdate, VoteSignatures,
};
use tracing::{debug, info};

use crate::rewards;

pub const VALIDATOR_PREFIX: u8 = 0x21;
pub const VALIDATOR_SET_KEY: &[u8] = &[0x22];
pub const VALIDATOR_ACCOUNT_PREFIX: u8 = 0x23;
pub const PROPOSER_BONUS_KEY: &[u8] = &[0x24];

pub const DEFAULT_PROPOSER_BONUS_PERCENT: u64 = 10;

pub fn validator_key(id: ValidatorId) -> Vec<u8> {
    let mut key = vec![VALIDATOR_PREFIX];
    key.extend_from_slice(&id.to_key_bytes());
    key
}

pub fn validator_account_key(id: ValidatorId) -> Vec<u8> {
    let mut key = vec![VALIDATOR_ACCOUNT_PREFIX];
    key.extend_from_slice(&id.to_key_bytes());
    key
}

/// Staking keeper
///
/// Holds no state of its own; every call works on the store it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct StakingKeeper;

impl StakingKeeper {
    pub fn new() -> Self {
        Self
    }

    // ============ Validators ============

    pub fn get_validator(
        &self,
        store: &dyn KvStore,
        id: ValidatorId,
    ) -> TidemarkResult<Option<Validator>> {
        load(store, &validator_key(id))
    }

    pub fn add_validator(&self, store: &mut dyn KvStore, validator: &Validator) -> TidemarkResult<()> {
        save(store, &validator_key(validator.id), validator)?;
        debug!(id = %validator.id, signer = %validator.signer, power = validator.voting_power, "Stored validator");
        Ok(())
    }

    /// Every validator in the directory, ordered by id
    pub fn get_all_validators(&self, store: &dyn KvStore) -> TidemarkResult<Vec<Validator>> {
        load_prefix(store, &[VALIDATOR_PREFIX])
    }

    pub fn get_validator_by_signer(
        &self,
        store: &dyn KvStore,
        signer: &Address,
    ) -> TidemarkResult<Option<Validator>> {
        Ok(self
            .get_all_validators(store)?
            .into_iter()
            .find(|v| &v.signer == signer))
    }

    /// Whether `signer` belongs to a validator active after `ack_count` acks
    pub fn is_current_validator_by_address(
        &self,
        store: &dyn KvStore,
        signer: &Address,
        ack_count: u64,
    ) -> TidemarkResult<bool> {
        Ok(self
            .get_validator_by_signer(store, signer)?
            .map(|v| v.is_current(ack_count))
            .unwrap_or(false))
    }

    // ============ Validator Set ============

    /// Current set, empty before genesis
    pub fn get_validator_set(&self, store: &dyn KvStore) -> TidemarkResult<ValidatorSet> {
        Ok(load(store, VALIDATOR_SET_KEY)?.unwrap_or_default())
    }

    pub fn update_validator_set_in_store(
        &self,
        store: &mut dyn KvStore,
        set: &ValidatorSet,
    ) -> TidemarkResult<()> {
        save(store, VALIDATOR_SET_KEY, set)
    }

    pub fn get_current_proposer(&self, store: &dyn KvStore) -> TidemarkResult<Option<Validator>> {
        Ok(self.get_validator_set(store)?.proposer().cloned())
    }

    pub fn increment_accum(&self, store: &mut dyn KvStore, times: u64) -> TidemarkResult<()> {
        let mut set = self.get_validator_set(store)?;
        set.increment_accum(times);
        debug!(times, proposer = ?set.proposer, "Incremented proposer priority");
        self.update_validator_set_in_store(store, &set)
    }

    /// Reconcile the current set with the directory at `ack_count`
    ///
    /// Returns the power updates for the consensus engine. On error nothing
    /// is written.
    pub fn apply_validator_set_changes(
        &self,
        store: &mut dyn KvStore,
        ack_count: u64,
    ) -> TidemarkResult<Vec<ValidatorUpdate>> {
        let mut set = self.get_validator_set(store)?;
        let all = self.get_all_validators(store)?;
        let changes = get_updated_validators(&set, &all, ack_count);
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        set.update_with_change_set(&changes)?;
        self.update_validator_set_in_store(store, &set)?;

        info!(
            changes = changes.len(),
            size = set.len(),
            total_power = set.total_voting_power(),
            "Updated validator set"
        );
        Ok(validator_updates(&changes))
    }

    // ============ Accounts ============

    pub fn get_validator_account(
        &self,
        store: &dyn KvStore,
        id: ValidatorId,
    ) -> TidemarkResult<Option<ValidatorAccount>> {
        load(store, &validator_account_key(id))
    }

    pub fn set_validator_account(
        &self,
        store: &mut dyn KvStore,
        account: &ValidatorAccount,
    ) -> TidemarkResult<()> {
        save(store, &validator_account_key(account.id), account)
    }

    pub fn get_all_validator_accounts(
        &self,
        store: &dyn KvStore,
    ) -> TidemarkResult<Vec<ValidatorAccount>> {
        load_prefix(store, &[VALIDATOR_ACCOUNT_PREFIX])
    }

    // ============ Proposer Bonus ============

    pub fn get_proposer_bonus_percent(&self, store: &dyn KvStore) -> TidemarkResult<u64> {
        Ok(load(store, PROPOSER_BONUS_KEY)?.unwrap_or(DEFAULT_PROPOSER_BONUS_PERCENT))
    }

    pub fn set_proposer_bonus_percent(&self, store: &mut dyn KvStore, percent: u64) -> TidemarkResult<()> {
        if percent > 100 {
            return Err(TidemarkError::InvalidGenesis(format!(
                "proposer bonus {}% exceeds 100%",
                percent
            )));
        }
        save(store, PROPOSER_BONUS_KEY, &percent)
    }
}

impl ValidatorDirectory for StakingKeeper {
    fn validator(&self, store: &dyn KvStore, id: ValidatorId) -> TidemarkResult<Option<Validator>> {
        self.get_validator(store, id)
    }

    fn set_validator(&self, store: &mut dyn KvStore, validator: &Validator) -> TidemarkResult<()> {
        self.add_validator(store, validator)
    }
}

impl CheckpointStaking for StakingKeeper {
    fn current_proposer(&self, store: &dyn KvStore) -> TidemarkResult<Option<Validator>> {
        self.get_current_proposer(store)
    }

    fn increment_accum(&self, store: &mut dyn KvStore, times: u64) -> TidemarkResult<()> {
        StakingKeeper::increment_accum(self, store, times)
    }

    fn validator_accounts(&self, store: &dyn KvStore) -> TidemarkResult<Vec<ValidatorAccount>> {
        self.get_all_validator_accounts(store)
    }

    fn calculate_signer_rewards(
        &self,
        store: &dyn KvStore,
        proposer: &Address,
        votes: &VoteSignatures,
        total_reward: Amount,
    ) -> TidemarkResult<SignerRewards> {
        let set = self.get_validator_set(store)?;
        let bonus_percent = self.get_proposer_bonus_percent(store)?;
        rewards::calculate_signer_rewards(&set, bonus_percent, proposer, votes, total_reward)
    }

    fn update_validator_rewards(
        &self,
        store: &mut dyn KvStore,
        rewards: &SignerRewards,
    ) -> TidemarkResult<()> {
        for (id, reward) in rewards {
            let mut validator = self
                .get_validator(store, *id)?
                .ok_or(TidemarkError::NoValidator)?;
            let mut account = self
                .get_validator_account(store, *id)?
                .unwrap_or_else(|| ValidatorAccount::new(*id));

            let split = rewards::split_reward(&validator, *reward)?;
            validator.delegator_reward_pool = validator
                .delegator_reward_pool
                .saturating_add(split.delegator_pool_power);
            account.reward_amount = account.reward_amount.saturating_add(split.validator_amount);

            self.add_validator(store, &validator)?;
            self.set_validator_account(store, &account)?;

            debug!(
                id = %id,
                reward = %reward,
                validator_amount = %split.validator_amount,
                pool = validator.delegator_reward_pool,
                "Credited checkpoint reward"
            );
        }
        Ok(())
    }
}
