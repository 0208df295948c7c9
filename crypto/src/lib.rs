//! TIDEMARK Cryptography Module
//! 
//! Primitives used to identify and authenticate validators:
//! - Ed25519 for signer signatures over checkpoint votes
//! - BLAKE3 for signer addresses and Merkle nodes
//! - SHA-256 for vote digests

pub mod keys;
pub mod signing;
pub mod hashing;

pub use keys::*;
pub use signing::*;
pub use hashing::*;
