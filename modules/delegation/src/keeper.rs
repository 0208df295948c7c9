//! Delegation keeper - delegator records and bonding economics

use tidemark_core::{
    load, load_prefix, save, Amount, Delegator, DelegatorAccount, DelegatorId, KvStore,
    TidemarkError, TidemarkResult, ValidatorDirectory, ValidatorId,
};
use tracing::{debug, error, info};

use crate::shares::{power_from_amount, F32ShareMath, ShareMath};

pub const DELEGATOR_PREFIX: u8 = 0x41;
pub const DELEGATOR_ACCOUNT_PREFIX: u8 = 0x42;

pub fn delegator_key(id: DelegatorId) -> Vec<u8> {
    let mut key = vec![DELEGATOR_PREFIX];
    key.extend_from_slice(&id.to_key_bytes());
    key
}

pub fn delegator_account_key(id: DelegatorId) -> Vec<u8> {
    let mut key = vec![DELEGATOR_ACCOUNT_PREFIX];
    key.extend_from_slice(&id.to_key_bytes());
    key
}

/// Outcome of an unbond
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnbondResult {
    pub validator: ValidatorId,
    pub shares: f32,
    /// Returns above (or, when negative, below) the bonded power
    pub reward: f32,
}

/// Delegation keeper
///
/// Reads and writes validators through the injected directory. Callers run
/// each operation against a transaction-scoped store, so a failure part way
/// through leaves nothing behind.
pub struct DelegationKeeper<D, M = F32ShareMath> {
    directory: D,
    math: M,
}

impl<D: ValidatorDirectory> DelegationKeeper<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            math: F32ShareMath,
        }
    }
}

impl<D: ValidatorDirectory, M: ShareMath> DelegationKeeper<D, M> {
    pub fn with_share_math(directory: D, math: M) -> Self {
        Self { directory, math }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    // ============ Records ============

    pub fn add_delegator(&self, store: &mut dyn KvStore, delegator: &Delegator) -> TidemarkResult<()> {
        save(store, &delegator_key(delegator.id), delegator)?;
        debug!(id = %delegator.id, val_id = %delegator.val_id, "Stored delegator");
        Ok(())
    }

    pub fn get_delegator(
        &self,
        store: &dyn KvStore,
        id: DelegatorId,
    ) -> TidemarkResult<Option<Delegator>> {
        load(store, &delegator_key(id))
    }

    pub fn get_all_delegators(&self, store: &dyn KvStore) -> TidemarkResult<Vec<Delegator>> {
        load_prefix(store, &[DELEGATOR_PREFIX])
    }

    pub fn add_delegator_account(
        &self,
        store: &mut dyn KvStore,
        account: &DelegatorAccount,
    ) -> TidemarkResult<()> {
        save(store, &delegator_account_key(account.id), account)
    }

    pub fn get_delegator_account(
        &self,
        store: &dyn KvStore,
        id: DelegatorId,
    ) -> TidemarkResult<Option<DelegatorAccount>> {
        load(store, &delegator_account_key(id))
    }

    pub fn get_all_delegator_accounts(
        &self,
        store: &dyn KvStore,
    ) -> TidemarkResult<Vec<DelegatorAccount>> {
        load_prefix(store, &[DELEGATOR_ACCOUNT_PREFIX])
    }

    // ============ Bonding ============

    /// Bond `amount` of `delegator_id`'s stake to `val_id`
    ///
    /// Returns the shares minted.
    pub fn bond_delegator(
        &self,
        store: &mut dyn KvStore,
        delegator_id: DelegatorId,
        val_id: ValidatorId,
        amount: Amount,
        last_updated: u64,
    ) -> TidemarkResult<f32> {
        let mut delegator = self.get_delegator(store, delegator_id)?.ok_or_else(|| {
            error!(delegator = %delegator_id, "Delegator not found");
            TidemarkError::NoDelegator
        })?;
        let mut account = self
            .get_delegator_account(store, delegator_id)?
            .ok_or(TidemarkError::NoDelegatorAccount)?;
        let mut validator = self.directory.validator(store, val_id)?.ok_or_else(|| {
            error!(validator = %val_id, "Bonded validator not found");
            TidemarkError::NoValidator
        })?;

        let power = power_from_amount(amount)?;
        if power <= 0 {
            error!(delegator = %delegator_id, %amount, "Bond amount is below one power unit");
            return Err(TidemarkError::PowerConversion(format!(
                "amount {} is below one power unit",
                amount
            )));
        }
        let rate = self.math.exchange_rate(&validator);
        let shares = self.math.shares_for_power(power, rate);

        delegator.val_id = val_id;
        delegator.last_updated = last_updated;
        delegator.voting_power = delegator.voting_power.saturating_add(power);
        account.shares += shares;
        validator.total_delegator_shares += shares;
        validator.voting_power = validator.voting_power.saturating_add(power);
        validator.delegated_power = validator.delegated_power.saturating_add(power);

        self.add_delegator(store, &delegator)?;
        self.add_delegator_account(store, &account)?;
        self.directory.set_validator(store, &validator)?;

        info!(
            delegator = %delegator_id,
            validator = %val_id,
            power,
            rate,
            shares,
            "Bonded delegator"
        );
        Ok(shares)
    }

    /// Redeem every share of `delegator_id` and detach it from its validator
    pub fn unbond_delegator(
        &self,
        store: &mut dyn KvStore,
        delegator_id: DelegatorId,
        last_updated: u64,
    ) -> TidemarkResult<UnbondResult> {
        let mut delegator = self
            .get_delegator(store, delegator_id)?
            .ok_or(TidemarkError::NoDelegator)?;
        if !delegator.is_bonded() {
            error!(delegator = %delegator_id, "Delegator already unbonded");
            return Err(TidemarkError::DelegatorAlreadyUnbonded);
        }
        let mut account = self
            .get_delegator_account(store, delegator_id)?
            .ok_or(TidemarkError::NoDelegatorAccount)?;
        let val_id = delegator.val_id;
        let mut validator = self
            .directory
            .validator(store, val_id)?
            .ok_or(TidemarkError::NoValidator)?;

        let shares = account.shares;
        let rate = self.math.exchange_rate(&validator);
        let total_returns = self.math.returns_for_shares(shares, rate);
        let reward = total_returns - delegator.voting_power as f32;

        validator.total_delegator_shares -= shares;
        validator.voting_power = validator.voting_power.saturating_sub(delegator.voting_power);
        validator.delegated_power = validator.delegated_power.saturating_sub(delegator.voting_power);
        validator.delegator_reward_pool = (validator.delegator_reward_pool as f32 - reward) as i64;

        let payout = reward.round() as i64;
        if payout >= 0 {
            account.reward_amount = account.reward_amount.saturating_add(payout);
        } else {
            account.slashed_amount = account.slashed_amount.saturating_add(-payout);
        }
        account.shares = 0.0;

        delegator.val_id = ValidatorId::NONE;
        delegator.voting_power = 0;
        delegator.last_updated = last_updated;

        self.directory.set_validator(store, &validator)?;
        self.add_delegator_account(store, &account)?;
        self.add_delegator(store, &delegator)?;

        info!(
            delegator = %delegator_id,
            validator = %val_id,
            shares,
            rate,
            reward,
            "Unbonded delegator"
        );
        Ok(UnbondResult {
            validator: val_id,
            shares,
            reward,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::Validator;
    use tidemark_crypto::keys::KeyPair;
    use tidemark_staking::StakingKeeper;
    use tidemark_state::MemoryStore;

    const V1: ValidatorId = ValidatorId(1);
    const D1: DelegatorId = DelegatorId(1);

    fn setup() -> (DelegationKeeper<StakingKeeper>, MemoryStore) {
        let keeper = DelegationKeeper::new(StakingKeeper::new());
        let mut store = MemoryStore::new();

        let kp = KeyPair::from_seed(&[1; 32]);
        let validator = Validator::new(V1, kp.address(), kp.public_key(), 100);
        keeper.directory().add_validator(&mut store, &validator).unwrap();

        keeper.add_delegator(&mut store, &Delegator::new(D1)).unwrap();
        keeper.add_delegator_account(&mut store, &DelegatorAccount::new(D1)).unwrap();
        (keeper, store)
    }

    fn validator(keeper: &DelegationKeeper<StakingKeeper>, store: &MemoryStore) -> Validator {
        keeper.directory().get_validator(store, V1).unwrap().unwrap()
    }

    #[test]
    fn test_two_bonds_at_rate_one() {
        let (keeper, mut store) = setup();

        let first = keeper
            .bond_delegator(&mut store, D1, V1, Amount::from_tokens(50), 1)
            .unwrap();
        assert_eq!(first, 50.0);

        let v = validator(&keeper, &store);
        assert_eq!(v.delegated_power, 50);
        assert_eq!(v.delegator_reward_pool, 0);
        assert_eq!(v.total_delegator_shares, 50.0);

        let second = keeper
            .bond_delegator(&mut store, D1, V1, Amount::from_tokens(50), 2)
            .unwrap();
        assert_eq!(second, 50.0);

        let v = validator(&keeper, &store);
        assert_eq!(v.total_delegator_shares, 100.0);
        assert_eq!(v.voting_power, 200);
        assert_eq!(v.delegated_power, 100);

        let account = keeper.get_delegator_account(&store, D1).unwrap().unwrap();
        assert_eq!(account.shares, 100.0);
        let delegator = keeper.get_delegator(&store, D1).unwrap().unwrap();
        assert_eq!(delegator.voting_power, 100);
        assert_eq!(delegator.val_id, V1);
        assert_eq!(delegator.last_updated, 2);
    }

    #[test]
    fn test_bond_below_one_power_unit() {
        let (keeper, mut store) = setup();
        let before = validator(&keeper, &store);

        let result = keeper.bond_delegator(&mut store, D1, V1, Amount::new(Amount::ONE_TOKEN / 2), 1);
        assert!(matches!(result, Err(TidemarkError::PowerConversion(_))));

        let delegator = keeper.get_delegator(&store, D1).unwrap().unwrap();
        assert!(!delegator.is_bonded());
        assert_eq!(keeper.get_delegator_account(&store, D1).unwrap().unwrap().shares, 0.0);
        assert_eq!(validator(&keeper, &store), before);
    }

    #[test]
    fn test_bond_then_unbond_round_trip() {
        let (keeper, mut store) = setup();
        let before = validator(&keeper, &store);

        keeper
            .bond_delegator(&mut store, D1, V1, Amount::from_tokens(40), 1)
            .unwrap();
        let result = keeper.unbond_delegator(&mut store, D1, 2).unwrap();

        assert!(result.reward.abs() < 1e-3);
        let after = validator(&keeper, &store);
        assert_eq!(after.voting_power, before.voting_power);
        assert_eq!(after.delegated_power, before.delegated_power);
        assert!(after.total_delegator_shares.abs() < 1e-3);
        assert_eq!(after.delegator_reward_pool, 0);

        let delegator = keeper.get_delegator(&store, D1).unwrap().unwrap();
        assert!(!delegator.is_bonded());
        let account = keeper.get_delegator_account(&store, D1).unwrap().unwrap();
        assert_eq!(account.shares, 0.0);
        assert_eq!(account.reward_amount, 0);
    }

    #[test]
    fn test_unbond_pays_out_pool() {
        let (keeper, mut store) = setup();
        keeper
            .bond_delegator(&mut store, D1, V1, Amount::from_tokens(50), 1)
            .unwrap();

        let mut v = validator(&keeper, &store);
        v.delegator_reward_pool = 50;
        keeper.directory().add_validator(&mut store, &v).unwrap();

        // rate 2
        let result = keeper.unbond_delegator(&mut store, D1, 2).unwrap();
        assert_eq!(result.reward, 50.0);

        let after = validator(&keeper, &store);
        assert_eq!(after.delegator_reward_pool, 0);
        let account = keeper.get_delegator_account(&store, D1).unwrap().unwrap();
        assert_eq!(account.reward_amount, 50);
    }

    #[test]
    fn test_negative_reward_is_slashed() {
        let (keeper, mut store) = setup();
        keeper
            .bond_delegator(&mut store, D1, V1, Amount::from_tokens(50), 1)
            .unwrap();

        let mut v = validator(&keeper, &store);
        v.delegator_reward_pool = -25;
        keeper.directory().add_validator(&mut store, &v).unwrap();

        // rate 0.5
        let result = keeper.unbond_delegator(&mut store, D1, 2).unwrap();
        assert_eq!(result.reward, -25.0);

        // a loss grows the pool back to zero
        assert_eq!(validator(&keeper, &store).delegator_reward_pool, 0);
        let account = keeper.get_delegator_account(&store, D1).unwrap().unwrap();
        assert_eq!(account.slashed_amount, 25);
    }

    #[test]
    fn test_no_double_unbond() {
        let (keeper, mut store) = setup();
        keeper
            .bond_delegator(&mut store, D1, V1, Amount::from_tokens(10), 1)
            .unwrap();
        keeper.unbond_delegator(&mut store, D1, 2).unwrap();

        let snapshot = store.all_entries();
        assert_eq!(
            keeper.unbond_delegator(&mut store, D1, 3),
            Err(TidemarkError::DelegatorAlreadyUnbonded)
        );
        assert_eq!(store.all_entries(), snapshot);
    }

    #[test]
    fn test_missing_records() {
        let (keeper, mut store) = setup();
        assert_eq!(
            keeper.bond_delegator(&mut store, DelegatorId(9), V1, Amount::from_tokens(1), 1),
            Err(TidemarkError::NoDelegator)
        );
        assert_eq!(
            keeper.bond_delegator(&mut store, D1, ValidatorId(9), Amount::from_tokens(1), 1),
            Err(TidemarkError::NoValidator)
        );
        assert_eq!(
            keeper.unbond_delegator(&mut store, DelegatorId(9), 1),
            Err(TidemarkError::NoDelegator)
        );
    }
}
