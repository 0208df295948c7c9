//! TIDEMARK State Management
//! 
//! Provides state storage, versioning, and state root computation.
//! Uses a key-value model where state = { key → value }; every module
//! owns a one-byte key prefix.

pub mod store;
pub mod memory;
pub mod persistent;
pub mod cache;

pub use store::*;
pub use memory::*;
pub use persistent::*;
pub use cache::*;
