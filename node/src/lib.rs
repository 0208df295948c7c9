//! TIDEMARK Node Implementation
//!
//! Application state machine that combines all modules:
//! - Staking: validator directory and proposer rotation
//! - Delegation: root-chain bond/unbond replay
//! - Checkpoint: propose, ack and no-ack
//! - JSON queries and genesis import/export

mod app;
mod genesis;
mod tx;

pub use app::*;
pub use genesis::*;
pub use tx::*;
