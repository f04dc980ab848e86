//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Ed25519 key pair generation, signing, and verification
//! - Deterministic key derivation from seeds for tests and tooling

use crate::types::{PublicKey, Signature};
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};

/// Ed25519 key pair for signing transactions
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::from_bytes(&rand::random::<[u8; 32]>());
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from a 32-byte seed, deterministically
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from raw seed bytes of caller-supplied length.
    ///
    /// Key material entered by hand (hex from a prompt, a file) arrives as
    /// a slice; anything but exactly 32 bytes is rejected.
    pub fn from_seed_bytes(seed: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = seed.try_into().map_err(|_| {
            Error::InvalidOperation(format!(
                "private key seed must be 32 bytes, got {}",
                seed.len()
            ))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Public half as a ledger identity
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.verifying_key.to_bytes())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.signing_key.sign(message);
        Signature::from_bytes(signature.to_bytes())
    }
}

/// Verify a signature against a public key.
///
/// Unparseable keys verify as false rather than erroring; the apply loop
/// treats both the same way (drop).
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());

    let verifying_key = match VerifyingKey::from_bytes(public_key.as_bytes()) {
        Ok(key) => key,
        Err(_) => return false,
    };

    verifying_key.verify(message, &dalek_sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let keypair = KeyPair::generate();
        assert_eq!(keypair.public_key().as_bytes().len(), 32);
    }

    #[test]
    fn test_keypair_from_seed_deterministic() {
        let seed = [42u8; 32];
        let keypair1 = KeyPair::from_seed(&seed);
        let keypair2 = KeyPair::from_seed(&seed);
        assert_eq!(keypair1.public_key(), keypair2.public_key());
    }

    #[test]
    fn test_from_seed_bytes_rejects_wrong_length() {
        let err = KeyPair::from_seed_bytes(&[1u8; 16]).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"test message";

        let signature = keypair.sign(message);
        assert!(verify_signature(message, &signature, &keypair.public_key()));

        // wrong message
        assert!(!verify_signature(
            b"wrong message",
            &signature,
            &keypair.public_key()
        ));

        // wrong key
        let other = KeyPair::generate();
        assert!(!verify_signature(message, &signature, &other.public_key()));
    }
}
