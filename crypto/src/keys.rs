//! Ed25519 key derivation.

use dpos_types::{KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;

use crate::error::CryptoError;

/// Generate a fresh key pair from the operating system's entropy source.
pub fn generate_keypair() -> Result<KeyPair, CryptoError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| CryptoError::Entropy(e.to_string()))?;
    let keypair = keypair_from_seed(&seed);
    seed.fill(0);
    Ok(keypair)
}

pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    PublicKey(SigningKey::from_bytes(&private.0).verifying_key().to_bytes())
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let private = PrivateKey(*seed);
    KeyPair {
        public: public_from_private(&private),
        private,
    }
}
