//! Local ed25519 signer for decryption challenges.

use crate::auth::{Signature, SignError, Signer};
use async_trait::async_trait;
use ed25519_dalek::{
    Signature as DalekSignature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey,
};
use rand::RngCore;
use std::fmt;
use tracing::debug;

/// Signs challenges with an ed25519 key held in memory.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Fresh random key.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Key from a 64-character hex seed.
    pub fn from_hex(seed_hex: &str) -> Result<Self, SignError> {
        let bytes = hex::decode(seed_hex.trim())
            .map_err(|e| SignError::Failed(format!("invalid key hex: {}", e)))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            SignError::Failed(format!("key must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("verifying_key", &self.verifying_key_hex())
            .finish()
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, message: &str) -> Result<Signature, SignError> {
        let signature = self.key.sign(message.as_bytes());
        debug!(bytes = message.len(), "Signed challenge");
        Ok(Signature(hex::encode(signature.to_bytes())))
    }
}

/// Check a hex signature over `challenge` against a hex verifying key.
pub fn verify_challenge(verifying_key_hex: &str, challenge: &str, signature: &Signature) -> bool {
    let Ok(key_bytes) = hex::decode(verifying_key_hex.trim()) else {
        return false;
    };
    let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(signature.0.trim()) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };

    key.verify(challenge.as_bytes(), &DalekSignature::from_bytes(&sig_bytes))
        .is_ok()
}
