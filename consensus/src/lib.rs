//! TIDEMARK Validator Set Rotation
//! 
//! Implements deterministic proposer election over the validator set:
//! - Weighted round-robin by proposer priority
//! - Atomic change-set application
//! - Change sets derived from validator epochs and power

pub mod validator_set;
pub mod updates;

pub use validator_set::*;
pub use updates::*;
