//! Property tests for proposer rotation

use proptest::prelude::*;
use tidemark_consensus::ValidatorSet;
use tidemark_core::{Validator, ValidatorId};
use tidemark_crypto::keys::KeyPair;

fn build_set(powers: &[i64]) -> ValidatorSet {
    let validators = powers
        .iter()
        .enumerate()
        .map(|(i, power)| {
            let kp = KeyPair::from_seed(&[(i + 1) as u8; 32]);
            Validator::new(ValidatorId::new(i as u64 + 1), kp.address(), kp.public_key(), *power)
        })
        .collect();
    ValidatorSet::new(validators)
}

fn priority_sum(set: &ValidatorSet) -> i64 {
    set.validators.iter().map(|v| v.proposer_priority).sum()
}

proptest! {
    #[test]
    fn prop_increment_zero_is_noop(powers in prop::collection::vec(1i64..1_000, 1..8)) {
        let set = build_set(&powers);
        let mut after = set.clone();
        after.increment_accum(0);
        prop_assert_eq!(after, set);
    }

    #[test]
    fn prop_increment_is_additive(
        powers in prop::collection::vec(1i64..1_000, 1..8),
        a in 0u64..50,
        b in 0u64..50,
    ) {
        let mut split = build_set(&powers);
        split.increment_accum(a);
        split.increment_accum(b);

        let mut joined = build_set(&powers);
        joined.increment_accum(a + b);

        prop_assert_eq!(split, joined);
    }

    #[test]
    fn prop_proposer_is_member_and_priorities_do_not_drift(
        powers in prop::collection::vec(1i64..1_000, 1..8),
        rounds in 0u64..100,
    ) {
        let mut set = build_set(&powers);
        let initial_sum = priority_sum(&set);
        set.increment_accum(rounds);

        prop_assert!(set.proposer().is_some());
        prop_assert_eq!(priority_sum(&set), initial_sum);
    }

    #[test]
    fn prop_failed_change_set_is_atomic(powers in prop::collection::vec(1i64..1_000, 1..8)) {
        let mut set = build_set(&powers);
        let before = set.clone();

        // removing every member leaves no power
        let removals: Vec<Validator> = set
            .validators
            .iter()
            .cloned()
            .map(|mut v| { v.voting_power = 0; v })
            .collect();

        prop_assert!(set.update_with_change_set(&removals).is_err());
        prop_assert_eq!(set, before);
    }
}
