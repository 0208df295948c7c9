//! Validator set and weighted round-robin proposer election
//!
//! Every member carries a `proposer_priority`. One election round picks the
//! member with the highest priority as proposer, adds each member's power to
//! its priority and charges the proposer the total power of the set, so the
//! sum of priorities never drifts. Ties go to the smaller signer address.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tidemark_core::{Address, TidemarkError, TidemarkResult, Validator};
use tidemark_crypto::keys::verify_signer_address;
use tracing::debug;

/// The current validator set, members sorted by signer address
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub validators: Vec<Validator>,
    pub proposer: Option<Address>,
}

impl ValidatorSet {
    /// Build a set and elect its first proposer
    pub fn new(mut validators: Vec<Validator>) -> Self {
        validators.sort_by(|a, b| a.signer.cmp(&b.signer));
        let mut set = Self {
            validators,
            proposer: None,
        };
        if !set.is_empty() {
            set.increment_accum(1);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn total_voting_power(&self) -> i64 {
        total_power(&self.validators)
    }

    pub fn get_by_signer(&self, signer: &Address) -> Option<&Validator> {
        self.validators.iter().find(|v| &v.signer == signer)
    }

    pub fn has_signer(&self, signer: &Address) -> bool {
        self.get_by_signer(signer).is_some()
    }

    /// The elected proposer, if any
    pub fn proposer(&self) -> Option<&Validator> {
        self.proposer.as_ref().and_then(|p| self.get_by_signer(p))
    }

    /// Run `times` election rounds
    pub fn increment_accum(&mut self, times: u64) {
        if self.validators.is_empty() {
            return;
        }
        for _ in 0..times {
            self.increment_once();
        }
    }

    fn increment_once(&mut self) {
        let total = self.total_voting_power();
        let Some(idx) = max_priority_index(&self.validators) else {
            return;
        };

        self.proposer = Some(self.validators[idx].signer);
        for validator in self.validators.iter_mut() {
            validator.proposer_priority =
                validator.proposer_priority.saturating_add(validator.voting_power);
        }
        let elected = &mut self.validators[idx];
        elected.proposer_priority = elected.proposer_priority.saturating_sub(total);
    }

    /// Apply additions, removals (power 0) and power updates atomically
    ///
    /// On error the set is left as it was.
    pub fn update_with_change_set(&mut self, changes: &[Validator]) -> TidemarkResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut seen = BTreeSet::new();
        for change in changes {
            if !seen.insert(change.signer) {
                return Err(TidemarkError::ValSetMisMatch(format!(
                    "duplicate change for signer {}",
                    change.signer
                )));
            }
            if !verify_signer_address(&change.signer, &change.pub_key) {
                return Err(TidemarkError::ValSignerMismatch);
            }
            if change.voting_power < 0 {
                return Err(TidemarkError::ValSetMisMatch(format!(
                    "negative power {} for signer {}",
                    change.voting_power, change.signer
                )));
            }
        }

        let mut updated = self.validators.clone();
        let mut added = BTreeSet::new();

        for change in changes {
            let position = updated.iter().position(|v| v.signer == change.signer);
            match (position, change.voting_power) {
                (Some(idx), 0) => {
                    updated.remove(idx);
                }
                (None, 0) => {
                    return Err(TidemarkError::ValSetMisMatch(format!(
                        "cannot remove non-member {}",
                        change.signer
                    )));
                }
                (Some(idx), _) => {
                    let priority = updated[idx].proposer_priority;
                    updated[idx] = change.clone();
                    updated[idx].proposer_priority = priority;
                }
                (None, _) => {
                    updated.push(change.clone());
                    added.insert(change.signer);
                }
            }
        }

        let total = total_power(&updated);
        if total <= 0 {
            return Err(TidemarkError::ValSetMisMatch(
                "validator set would have no voting power".to_string(),
            ));
        }

        let initial_priority = -(total.saturating_add(total / 8));
        for validator in updated.iter_mut().filter(|v| added.contains(&v.signer)) {
            validator.proposer_priority = initial_priority;
        }
        updated.sort_by(|a, b| a.signer.cmp(&b.signer));

        let proposer_kept = self
            .proposer
            .map(|p| updated.iter().any(|v| v.signer == p))
            .unwrap_or(false);
        let proposer = if proposer_kept {
            self.proposer
        } else {
            max_priority_index(&updated).map(|idx| updated[idx].signer)
        };

        debug!(
            changes = changes.len(),
            size = updated.len(),
            total_power = total,
            "Applied validator change set"
        );

        self.validators = updated;
        self.proposer = proposer;
        Ok(())
    }
}

fn total_power(validators: &[Validator]) -> i64 {
    validators
        .iter()
        .fold(0i64, |acc, v| acc.saturating_add(v.voting_power))
}

/// Highest priority, first (smallest signer) on ties; input sorted by signer
fn max_priority_index(validators: &[Validator]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, validator) in validators.iter().enumerate() {
        match best {
            Some(b) if validators[b].proposer_priority >= validator.proposer_priority => {}
            _ => best = Some(idx),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_core::ValidatorId;
    use tidemark_crypto::keys::KeyPair;

    fn validator(seed: u8, power: i64) -> Validator {
        let kp = KeyPair::from_seed(&[seed; 32]);
        Validator::new(ValidatorId::new(seed as u64), kp.address(), kp.public_key(), power)
    }

    #[test]
    fn test_single_validator_stays_proposer() {
        let v1 = validator(1, 100);
        let mut set = ValidatorSet::new(vec![v1.clone()]);
        assert_eq!(set.proposer, Some(v1.signer));

        set.increment_accum(5);
        assert_eq!(set.proposer, Some(v1.signer));
        assert_eq!(set.validators[0].proposer_priority, 0);
    }

    #[test]
    fn test_equal_power_rotates() {
        let a = validator(1, 10);
        let b = validator(2, 10);
        let mut set = ValidatorSet::new(vec![a.clone(), b.clone()]);
        let first = set.proposer.unwrap();

        set.increment_accum(1);
        let second = set.proposer.unwrap();
        assert_ne!(first, second);

        set.increment_accum(1);
        assert_eq!(set.proposer.unwrap(), first);
    }

    #[test]
    fn test_tie_breaks_on_smaller_signer() {
        let a = validator(1, 10);
        let b = validator(2, 10);
        let smaller = a.signer.min(b.signer);
        let set = ValidatorSet::new(vec![a, b]);
        assert_eq!(set.proposer, Some(smaller));
    }

    #[test]
    fn test_heavier_validator_proposes_more() {
        let heavy = validator(1, 30);
        let light = validator(2, 10);
        let mut set = ValidatorSet::new(vec![heavy.clone(), light.clone()]);

        let mut heavy_count = 0;
        for _ in 0..40 {
            set.increment_accum(1);
            if set.proposer == Some(heavy.signer) {
                heavy_count += 1;
            }
        }
        assert_eq!(heavy_count, 30);
    }

    #[test]
    fn test_add_member_gets_penalty_priority() {
        let mut set = ValidatorSet::new(vec![validator(1, 80)]);
        let newcomer = validator(2, 20);
        set.update_with_change_set(&[newcomer.clone()]).unwrap();

        let added = set.get_by_signer(&newcomer.signer).unwrap();
        assert_eq!(added.proposer_priority, -(100 + 100 / 8));
        assert_eq!(set.total_voting_power(), 100);
    }

    #[test]
    fn test_update_power_keeps_priority() {
        let v1 = validator(1, 10);
        let v2 = validator(2, 10);
        let mut set = ValidatorSet::new(vec![v1.clone(), v2.clone()]);
        set.increment_accum(3);
        let before = set.get_by_signer(&v1.signer).unwrap().proposer_priority;

        let mut change = v1.clone();
        change.voting_power = 25;
        set.update_with_change_set(&[change]).unwrap();

        let after = set.get_by_signer(&v1.signer).unwrap();
        assert_eq!(after.voting_power, 25);
        assert_eq!(after.proposer_priority, before);
    }

    #[test]
    fn test_removing_proposer_elects_new_one() {
        let v1 = validator(1, 10);
        let v2 = validator(2, 10);
        let mut set = ValidatorSet::new(vec![v1.clone(), v2.clone()]);
        let proposer = set.proposer.unwrap();
        let other = if proposer == v1.signer { v2.clone() } else { v1.clone() };
        let mut removal = if proposer == v1.signer { v1 } else { v2 };
        removal.voting_power = 0;

        set.update_with_change_set(&[removal]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.proposer, Some(other.signer));
    }

    #[test]
    fn test_change_set_errors_leave_set_untouched() {
        let v1 = validator(1, 10);
        let mut set = ValidatorSet::new(vec![v1.clone()]);
        let snapshot = set.clone();

        // duplicate
        let dup = validator(2, 5);
        assert!(matches!(
            set.update_with_change_set(&[dup.clone(), dup]),
            Err(TidemarkError::ValSetMisMatch(_))
        ));

        // remove non-member
        let mut ghost = validator(3, 0);
        ghost.voting_power = 0;
        assert!(matches!(
            set.update_with_change_set(&[ghost]),
            Err(TidemarkError::ValSetMisMatch(_))
        ));

        // empty result
        let mut last = v1.clone();
        last.voting_power = 0;
        assert!(matches!(
            set.update_with_change_set(&[last]),
            Err(TidemarkError::ValSetMisMatch(_))
        ));

        // signer not derived from pubkey
        let mut forged = validator(4, 5);
        forged.signer = Address([7u8; 32]);
        assert_eq!(
            set.update_with_change_set(&[forged]),
            Err(TidemarkError::ValSignerMismatch)
        );

        assert_eq!(set, snapshot);
    }
}
