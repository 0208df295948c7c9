//! Checkpoint signer rewards
//!
//! The proposer of an acknowledged checkpoint takes the proposer bonus off
//! the top. The rest is split across the validators whose signatures appear
//! in the submission, pro rata to voting power. Integer division leaves a
//! remainder, which goes to the first signer by address.

use std::collections::BTreeSet;
use tidemark_consensus::ValidatorSet;
use tidemark_core::{
    Address, Amount, SignerRewards, TidemarkError, TidemarkResult, Validator, VoteSignatures,
};
use tidemark_crypto::{keys::signer_address, signing::parse_sig_input};
use tracing::debug;

/// Validators whose signatures appear in `votes`, sorted by signer
///
/// Every signature must verify over the vote payload and come from a member
/// of `set`. Repeated signers count once.
pub fn checkpoint_signers<'a>(
    set: &'a ValidatorSet,
    votes: &VoteSignatures,
) -> TidemarkResult<Vec<&'a Validator>> {
    let mut seen = BTreeSet::new();
    let mut signers = Vec::new();

    for entry in parse_sig_input(&votes.sig_input)? {
        entry.verify(&votes.vote_bytes).map_err(|_| {
            TidemarkError::ComputeSignerRewards(format!(
                "invalid signature from {:?}",
                entry.public_key
            ))
        })?;

        let signer = signer_address(&entry.public_key);
        let member = set.get_by_signer(&signer).ok_or_else(|| {
            TidemarkError::ComputeSignerRewards(format!("signer {} is not in the validator set", signer))
        })?;

        if seen.insert(signer) {
            signers.push(member);
        }
    }

    signers.sort_by(|a, b| a.signer.cmp(&b.signer));
    Ok(signers)
}

/// Split `total_reward` between the proposer bonus and the signers
pub fn calculate_signer_rewards(
    set: &ValidatorSet,
    bonus_percent: u64,
    proposer: &Address,
    votes: &VoteSignatures,
    total_reward: Amount,
) -> TidemarkResult<SignerRewards> {
    let signers = checkpoint_signers(set, votes)?;
    if signers.is_empty() {
        return Err(TidemarkError::ComputeSignerRewards(
            "checkpoint carries no signatures".to_string(),
        ));
    }

    let proposer = set.get_by_signer(proposer).ok_or_else(|| {
        TidemarkError::ComputeSignerRewards(format!("proposer {} is not in the validator set", proposer))
    })?;

    let bonus = mul_div(total_reward.0, bonus_percent as u128, 100)?;
    let remainder = total_reward.0 - bonus;

    let signer_power: u128 = signers.iter().map(|v| v.voting_power.max(0) as u128).sum();
    if signer_power == 0 {
        return Err(TidemarkError::ComputeSignerRewards(
            "signers hold no voting power".to_string(),
        ));
    }

    let mut rewards = SignerRewards::new();
    if bonus > 0 {
        rewards.insert(proposer.id, Amount(bonus));
    }

    let mut distributed = 0u128;
    for signer in &signers {
        let share = mul_div(remainder, signer.voting_power.max(0) as u128, signer_power)?;
        distributed += share;
        credit(&mut rewards, signer, share);
    }
    credit(&mut rewards, signers[0], remainder - distributed);

    debug!(
        total = %total_reward,
        bonus = %Amount(bonus),
        signers = signers.len(),
        "Computed checkpoint signer rewards"
    );
    Ok(rewards)
}

fn credit(rewards: &mut SignerRewards, validator: &Validator, amount: u128) {
    let entry = rewards.entry(validator.id).or_insert(Amount::ZERO);
    *entry = entry.saturating_add(Amount(amount));
}

fn mul_div(value: u128, numerator: u128, denominator: u128) -> TidemarkResult<u128> {
    value
        .checked_mul(numerator)
        .map(|product| product / denominator)
        .ok_or_else(|| TidemarkError::ComputeSignerRewards("reward overflow".to_string()))
}

/// How one validator's reward divides between its account and its delegators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSplit {
    /// Credited to the validator account
    pub validator_amount: Amount,
    /// Added to the delegator reward pool, in power units
    pub delegator_pool_power: i64,
}

/// Split `reward` by the delegated fraction of the validator's power
///
/// The delegated part is floored to whole power units; what is left over
/// stays with the validator.
pub fn split_reward(validator: &Validator, reward: Amount) -> TidemarkResult<RewardSplit> {
    if validator.voting_power <= 0 || validator.delegated_power <= 0 {
        return Ok(RewardSplit {
            validator_amount: reward,
            delegator_pool_power: 0,
        });
    }

    let delegated = mul_div(
        reward.0,
        validator.delegated_power as u128,
        validator.voting_power as u128,
    )
    .map_err(|_| TidemarkError::ComputeCheckpointRewards)?;
    let pool_power = delegated / Amount::ONE_TOKEN;
    let pool_power_i64 =
        i64::try_from(pool_power).map_err(|_| TidemarkError::ComputeCheckpointRewards)?;

    Ok(RewardSplit {
        validator_amount: Amount(reward.0 - pool_power * Amount::ONE_TOKEN),
        delegator_pool_power: pool_power_i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::ValidatorId;
    use tidemark_crypto::keys::KeyPair;
    use tidemark_crypto::signing::{encode_sig_input, SignerSignature};

    const VOTE: &[u8] = b"checkpoint vote";

    fn keypair(seed: u8) -> KeyPair {
        KeyPair::from_seed(&[seed; 32])
    }

    fn validator(seed: u8, power: i64) -> Validator {
        let kp = keypair(seed);
        Validator::new(ValidatorId::new(seed as u64), kp.address(), kp.public_key(), power)
    }

    fn votes(seeds: &[u8]) -> VoteSignatures {
        let entries: Vec<_> = seeds
            .iter()
            .map(|seed| SignerSignature::new(&keypair(*seed), VOTE))
            .collect();
        VoteSignatures {
            vote_bytes: VOTE.to_vec(),
            sig_input: encode_sig_input(&entries),
            tx_data: Vec::new(),
        }
    }

    #[test]
    fn test_single_signer_takes_everything() {
        let v1 = validator(1, 10);
        let set = ValidatorSet::new(vec![v1.clone()]);
        let rewards =
            calculate_signer_rewards(&set, 10, &v1.signer, &votes(&[1]), Amount::new(1_000)).unwrap();
        assert_eq!(rewards.get(&v1.id), Some(&Amount::new(1_000)));
    }

    #[test]
    fn test_bonus_and_pro_rata_split() {
        let v1 = validator(1, 30);
        let v2 = validator(2, 10);
        let set = ValidatorSet::new(vec![v1.clone(), v2.clone()]);

        let rewards =
            calculate_signer_rewards(&set, 10, &v2.signer, &votes(&[1, 2]), Amount::new(1_000)).unwrap();

        // 100 bonus to v2, 900 split 3:1
        assert_eq!(rewards[&v1.id], Amount::new(675));
        assert_eq!(rewards[&v2.id], Amount::new(325));
        let total: u128 = rewards.values().map(|a| a.0).sum();
        assert_eq!(total, 1_000);
    }

    #[test]
    fn test_remainder_goes_to_first_signer() {
        let vals: Vec<_> = (1..=3).map(|s| validator(s, 1)).collect();
        let set = ValidatorSet::new(vals.clone());
        let first = set.validators[0].clone();

        let rewards =
            calculate_signer_rewards(&set, 0, &first.signer, &votes(&[1, 2, 3]), Amount::new(10)).unwrap();

        assert_eq!(rewards[&first.id], Amount::new(4));
        let total: u128 = rewards.values().map(|a| a.0).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_duplicate_signatures_count_once() {
        let v1 = validator(1, 10);
        let v2 = validator(2, 10);
        let set = ValidatorSet::new(vec![v1.clone(), v2.clone()]);

        let signers = checkpoint_signers(&set, &votes(&[1, 1, 2])).unwrap();
        assert_eq!(signers.len(), 2);
    }

    #[test]
    fn test_outsider_and_bad_signature_rejected() {
        let v1 = validator(1, 10);
        let set = ValidatorSet::new(vec![v1.clone()]);

        assert!(matches!(
            checkpoint_signers(&set, &votes(&[1, 9])),
            Err(TidemarkError::ComputeSignerRewards(_))
        ));

        let mut tampered = votes(&[1]);
        tampered.vote_bytes = b"something else".to_vec();
        assert!(matches!(
            checkpoint_signers(&set, &tampered),
            Err(TidemarkError::ComputeSignerRewards(_))
        ));
    }

    #[test]
    fn test_no_signers_is_error() {
        let v1 = validator(1, 10);
        let set = ValidatorSet::new(vec![v1.clone()]);
        assert!(calculate_signer_rewards(&set, 10, &v1.signer, &votes(&[]), Amount::new(5)).is_err());
    }

    #[test]
    fn test_split_reward_without_delegation() {
        let v1 = validator(1, 10);
        let split = split_reward(&v1, Amount::from_tokens(3)).unwrap();
        assert_eq!(split.validator_amount, Amount::from_tokens(3));
        assert_eq!(split.delegator_pool_power, 0);
    }

    #[test]
    fn test_split_reward_floors_pool_to_power_units() {
        let mut v1 = validator(1, 3);
        v1.delegated_power = 1;
        let split = split_reward(&v1, Amount::from_tokens(4)).unwrap();
        // 4/3 tokens delegated, floored to 1
        assert_eq!(split.delegator_pool_power, 1);
        assert_eq!(split.validator_amount, Amount::from_tokens(3));
    }
}
