//! TIDEMARK Delegation Module
//!
//! Delegators bond power to a validator in exchange for shares of its
//! delegated pool, and redeem those shares at the live exchange rate when
//! they unbond.

pub mod shares;
pub mod keeper;
pub mod msg;
pub mod handler;
pub mod genesis;
pub mod querier;

pub use shares::*;
pub use keeper::*;
pub use msg::*;
pub use handler::*;
pub use genesis::*;
pub use querier::*;
