//! TIDEMARK Core Library
//! 
//! Core types, traits, and abstractions for the TIDEMARK checkpointing layer.
//! This crate provides the foundation for all other TIDEMARK components.

pub mod types;
pub mod records;
pub mod chain;
pub mod traits;
pub mod error;
pub mod config;
pub mod oracle;

pub use types::*;
pub use records::*;
pub use chain::*;
pub use traits::*;
pub use error::*;
pub use config::*;
pub use oracle::*;
