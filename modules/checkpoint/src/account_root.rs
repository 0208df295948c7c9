//! Commitment over validator reward accounts

use tidemark_core::{Hash, TidemarkResult, ValidatorAccount};
use tidemark_crypto::hashing::merkle_root_of;

/// Merkle root of `accounts` in validator-id order
///
/// An empty list commits to the zero hash.
pub fn account_root_hash(accounts: &[ValidatorAccount]) -> TidemarkResult<Hash> {
    let mut sorted: Vec<&ValidatorAccount> = accounts.iter().collect();
    sorted.sort_by_key(|account| account.id);

    let leaves = sorted
        .into_iter()
        .map(bincode::serialize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merkle_root_of(&leaves))
}
