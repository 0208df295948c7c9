//! TIDEMARK Staking Module
//!
//! Owns the validator directory and the current validator set:
//! - Validator records, accounts and the proposer bonus
//! - Genesis import/export
//! - Checkpoint signer rewards
//! - End-block validator set reconciliation

pub mod keeper;
pub mod genesis;
pub mod rewards;
pub mod querier;

pub use keeper::*;
pub use genesis::*;
pub use rewards::*;
pub use querier::*;
