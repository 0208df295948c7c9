//! TIDEMARK Checkpoint Module
//!
//! Drives the checkpoint lifecycle against the root chain:
//! - Proposals buffered in a single pending slot
//! - Acknowledgements promoting the buffer to a confirmed header
//! - No-acks rotating the proposer once the buffer period lapses

pub mod keeper;
pub mod account_root;
pub mod msg;
pub mod handler;
pub mod genesis;
pub mod querier;

pub use keeper::*;
pub use account_root::*;
pub use msg::*;
pub use handler::*;
pub use genesis::*;
pub use querier::*;
