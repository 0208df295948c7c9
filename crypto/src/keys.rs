//! Validator signer keys
//!
//! Handles key generation, key files, and signer address derivation.

use ed25519_dalek::{
    SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
    SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tidemark_core::{Address, PublicKey, TidemarkError, TidemarkResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::hashing::blake3_hash;

/// A signer keypair
#[derive(Clone)]
pub struct KeyPair {
    signing_key: Ed25519SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create keypair from seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = Ed25519SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create keypair from secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> TidemarkResult<Self> {
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(TidemarkError::InvalidPublicKey);
        }
        let mut seed = SecretKey::new([0u8; 32]);
        seed.bytes.copy_from_slice(bytes);
        Ok(seed.to_keypair())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    /// Signer address of this key
    pub fn address(&self) -> Address {
        signer_address(&self.public_key())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub(crate) fn signing_key(&self) -> &Ed25519SigningKey {
        &self.signing_key
    }
}

/// Signer address of a public key: BLAKE3 of the key bytes
pub fn signer_address(public_key: &PublicKey) -> Address {
    let hash = blake3_hash(public_key.as_bytes());
    Address::from_bytes(*hash.as_bytes())
}

/// Whether `address` is the signer address of `public_key`
pub fn verify_signer_address(address: &Address, public_key: &PublicKey) -> bool {
    &signer_address(public_key) == address
}

pub fn public_key_to_ed25519(key: &PublicKey) -> TidemarkResult<Ed25519VerifyingKey> {
    Ed25519VerifyingKey::from_bytes(key.as_bytes())
        .map_err(|_| TidemarkError::InvalidPublicKey)
}

/// Secret seed, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; 32],
}

impl SecretKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_keypair(&self) -> KeyPair {
        KeyPair::from_seed(&self.bytes)
    }
}

/// On-disk validator key, written by `tidemark init`
#[derive(Serialize, Deserialize)]
pub struct ValidatorKeyFile {
    pub address: Address,
    pub pub_key: PublicKey,
    secret: String,
}

impl ValidatorKeyFile {
    pub fn from_keypair(keypair: &KeyPair) -> Self {
        let secret = SecretKey::new(keypair.secret_bytes());
        Self {
            address: keypair.address(),
            pub_key: keypair.public_key(),
            secret: hex::encode(secret.as_bytes()),
        }
    }

    pub fn to_keypair(&self) -> TidemarkResult<KeyPair> {
        let mut bytes = hex::decode(&self.secret).map_err(|_| TidemarkError::InvalidPublicKey)?;
        let keypair = KeyPair::from_secret_bytes(&bytes);
        bytes.zeroize();
        let keypair = keypair?;
        if keypair.public_key() != self.pub_key || keypair.address() != self.address {
            return Err(TidemarkError::ValSignerMismatch);
        }
        Ok(keypair)
    }
}

impl Drop for ValidatorKeyFile {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}
