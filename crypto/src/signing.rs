//! Signer signatures over checkpoint votes
//!
//! A checkpoint submission carries the vote payload and a `sig_input` blob of
//! fixed-size `(public key || signature)` entries, one per signer.

use ed25519_dalek::{Signer, Verifier};
use tidemark_core::{PublicKey, Signature, TidemarkError, TidemarkResult};

use crate::hashing::sha256_hash;
use crate::keys::{public_key_to_ed25519, KeyPair};

/// Size of one `(public key || signature)` entry
pub const SIG_ENTRY_LENGTH: usize = 96;

/// Sign a message using Ed25519
pub fn sign(keypair: &KeyPair, message: &[u8]) -> Signature {
    let signature = keypair.signing_key().sign(message);
    Signature::from_bytes(signature.to_bytes())
}

/// Verify a signature using Ed25519
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> TidemarkResult<()> {
    let verifying_key = public_key_to_ed25519(public_key)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());

    verifying_key
        .verify(message, &sig)
        .map_err(|_| TidemarkError::InvalidSignature)
}

/// Sign the digest of a checkpoint vote
pub fn sign_vote(keypair: &KeyPair, vote_bytes: &[u8]) -> Signature {
    sign(keypair, sha256_hash(vote_bytes).as_bytes())
}

/// Verify a signature over the digest of a checkpoint vote
pub fn verify_vote(public_key: &PublicKey, vote_bytes: &[u8], signature: &Signature) -> TidemarkResult<()> {
    verify(public_key, sha256_hash(vote_bytes).as_bytes(), signature)
}

/// One signer entry of `sig_input`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSignature {
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl SignerSignature {
    pub fn new(keypair: &KeyPair, vote_bytes: &[u8]) -> Self {
        Self {
            public_key: keypair.public_key(),
            signature: sign_vote(keypair, vote_bytes),
        }
    }

    pub fn verify(&self, vote_bytes: &[u8]) -> TidemarkResult<()> {
        verify_vote(&self.public_key, vote_bytes, &self.signature)
    }
}

/// Split `sig_input` into signer entries
pub fn parse_sig_input(sig_input: &[u8]) -> TidemarkResult<Vec<SignerSignature>> {
    if sig_input.len() % SIG_ENTRY_LENGTH != 0 {
        return Err(TidemarkError::ComputeSignerRewards(format!(
            "signature input length {} is not a multiple of {}",
            sig_input.len(),
            SIG_ENTRY_LENGTH
        )));
    }

    Ok(sig_input
        .chunks_exact(SIG_ENTRY_LENGTH)
        .map(|entry| {
            let mut public_key = [0u8; 32];
            let mut signature = [0u8; 64];
            public_key.copy_from_slice(&entry[..32]);
            signature.copy_from_slice(&entry[32..]);
            SignerSignature {
                public_key: PublicKey::from_bytes(public_key),
                signature: Signature::from_bytes(signature),
            }
        })
        .collect())
}

/// Concatenate signer entries into `sig_input`
pub fn encode_sig_input(entries: &[SignerSignature]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * SIG_ENTRY_LENGTH);
    for entry in entries {
        out.extend_from_slice(entry.public_key.as_bytes());
        out.extend_from_slice(entry.signature.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"checkpoint 0..99";

        let signature = sign(&keypair, message);
        assert!(verify(&keypair.public_key(), message, &signature).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let keypair1 = KeyPair::generate();
        let keypair2 = KeyPair::generate();
        let message = b"checkpoint 0..99";

        let signature = sign(&keypair1, message);

        // Wrong public key should fail
        assert!(verify(&keypair2.public_key(), message, &signature).is_err());

        // Wrong message should fail
        assert!(verify(&keypair1.public_key(), b"checkpoint 0..98", &signature).is_err());
    }

    #[test]
    fn test_sig_input_entries_verify() {
        let vote = b"vote payload".to_vec();
        let signers: Vec<_> = (1u8..=3)
            .map(|i| SignerSignature::new(&KeyPair::from_seed(&[i; 32]), &vote))
            .collect();

        let input = encode_sig_input(&signers);
        assert_eq!(input.len(), 3 * SIG_ENTRY_LENGTH);

        let parsed = parse_sig_input(&input).unwrap();
        assert_eq!(parsed, signers);
        assert!(parsed.iter().all(|s| s.verify(&vote).is_ok()));
        assert!(parsed[0].verify(b"other vote").is_err());
    }

    #[test]
    fn test_sig_input_bad_length() {
        assert!(matches!(
            parse_sig_input(&[0u8; 95]),
            Err(TidemarkError::ComputeSignerRewards(_))
        ));
    }
}
