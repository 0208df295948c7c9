//! Change sets derived from the validator directory

use tidemark_core::{Validator, ValidatorUpdate};

use crate::validator_set::ValidatorSet;

/// Diff between the current set and every known validator at `ack_count`
///
/// Members no longer current are removed (power 0), current non-members are
/// added, and members whose power changed are updated. Sorted by signer.
pub fn get_updated_validators(
    current: &ValidatorSet,
    all: &[Validator],
    ack_count: u64,
) -> Vec<Validator> {
    let mut updates: Vec<Validator> = all
        .iter()
        .filter_map(|validator| {
            let member = current.get_by_signer(&validator.signer);
            let is_current = validator.is_current(ack_count);
            match member {
                Some(_) if !is_current => {
                    let mut removal = validator.clone();
                    removal.voting_power = 0;
                    Some(removal)
                }
                None if is_current => Some(validator.clone()),
                Some(m) if m.voting_power != validator.voting_power => Some(validator.clone()),
                _ => None,
            }
        })
        .collect();

    updates.sort_by(|a, b| a.signer.cmp(&b.signer));
    updates
}

/// Power updates handed to the consensus engine
pub fn validator_updates(changes: &[Validator]) -> Vec<ValidatorUpdate> {
    changes
        .iter()
        .map(|v| ValidatorUpdate {
            pub_key: v.pub_key,
            power: v.voting_power,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::ValidatorId;
    use tidemark_crypto::keys::KeyPair;

    fn validator(seed: u8, power: i64, start: u64, end: u64) -> Validator {
        let kp = KeyPair::from_seed(&[seed; 32]);
        Validator::new(ValidatorId::new(seed as u64), kp.address(), kp.public_key(), power)
            .with_epochs(start, end)
    }

    #[test]
    fn test_no_changes_when_in_sync() {
        let v1 = validator(1, 10, 0, 0);
        let set = ValidatorSet::new(vec![v1.clone()]);
        assert!(get_updated_validators(&set, &[v1], 0).is_empty());
    }

    #[test]
    fn test_epoch_bounds_drive_membership() {
        let v1 = validator(1, 10, 0, 1);
        let v2 = validator(2, 10, 2, 0);
        let set = ValidatorSet::new(vec![v1.clone()]);

        // ack count 1 is epoch 2: v1 ended, v2 started
        let updates = get_updated_validators(&set, &[v1.clone(), v2.clone()], 1);
        assert_eq!(updates.len(), 2);

        let removal = updates.iter().find(|u| u.signer == v1.signer).unwrap();
        assert_eq!(removal.voting_power, 0);
        let addition = updates.iter().find(|u| u.signer == v2.signer).unwrap();
        assert_eq!(addition.voting_power, 10);
    }

    #[test]
    fn test_power_change_is_update() {
        let v1 = validator(1, 10, 0, 0);
        let set = ValidatorSet::new(vec![v1.clone()]);
        let mut bonded = v1.clone();
        bonded.voting_power = 60;

        let updates = get_updated_validators(&set, &[bonded], 0);
        assert_eq!(updates.len(), 1);
        assert_eq!(validator_updates(&updates)[0].power, 60);
    }

    #[test]
    fn test_updates_sorted_by_signer() {
        let vals: Vec<_> = (1..=5).map(|i| validator(i, 10, 0, 0)).collect();
        let set = ValidatorSet::default();
        let updates = get_updated_validators(&set, &vals, 0);
        assert!(updates.windows(2).all(|w| w[0].signer < w[1].signer));
    }
}
