//! Reversible encoding of numeric profile fields into opaque tokens.
//!
//! Every codec must satisfy `decode(encode(v)) == v` for finite `v`, and
//! must also accept bare decimal strings written before values were
//! encoded. `PlaceholderCodec` hides the value only from casual
//! inspection; `SealedCodec` encrypts it. Neither is homomorphic: a
//! deployment that needs computation over ciphertexts plugs a real
//! scheme in behind the same trait.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use std::fmt;
use thiserror::Error;

/// Token prefix of the placeholder scheme.
pub const PLACEHOLDER_PREFIX: &str = "FHE-";

/// Token prefix of the AES-GCM scheme.
pub const SEALED_PREFIX: &str = "SEAL-";

/// Nonce size for AES-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// Codec errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Value is not a finite number")]
    NonFinite,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Encryption error: {0}")]
    Encryption(String),
}

/// Encode/decode contract for opaque numeric fields.
pub trait Codec: Send + Sync {
    /// Scheme name, for logs.
    fn name(&self) -> &'static str;

    fn encode(&self, value: f64) -> Result<String, CodecError>;

    fn decode(&self, token: &str) -> Result<f64, CodecError>;
}

/// Parse a decimal rendering; the legacy un-encoded format.
fn parse_plain(text: &str) -> Result<f64, CodecError> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| CodecError::Malformed(format!("not a number: {:?}", truncate(text))))?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(CodecError::NonFinite)
    }
}

/// Shortest decimal text that parses back to exactly `value`.
fn render(value: f64) -> Result<String, CodecError> {
    if value.is_finite() {
        Ok(value.to_string())
    } else {
        Err(CodecError::NonFinite)
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(32) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// `FHE-` + base64 of the decimal rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderCodec;

impl Codec for PlaceholderCodec {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn encode(&self, value: f64) -> Result<String, CodecError> {
        let text = render(value)?;
        Ok(format!("{}{}", PLACEHOLDER_PREFIX, STANDARD.encode(text)))
    }

    fn decode(&self, token: &str) -> Result<f64, CodecError> {
        match token.strip_prefix(PLACEHOLDER_PREFIX) {
            Some(payload) => {
                let bytes = STANDARD
                    .decode(payload)
                    .map_err(|e| CodecError::Malformed(format!("bad base64: {}", e)))?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| CodecError::Malformed("payload is not UTF-8".into()))?;
                parse_plain(&text)
            }
            None => parse_plain(token),
        }
    }
}

/// `SEAL-` + base64 of `[12 bytes nonce][AES-256-GCM ciphertext]`.
///
/// Still reads placeholder and bare legacy tokens so existing records stay
/// decodable after switching schemes.
#[derive(Clone)]
pub struct SealedCodec {
    key: [u8; 32],
}

impl SealedCodec {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build from a 64-character hex key.
    pub fn from_hex(key_hex: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(key_hex.trim())
            .map_err(|e| CodecError::Encryption(format!("invalid key hex: {}", e)))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CodecError::Encryption(format!("key must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::new(key))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }
}

impl fmt::Debug for SealedCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedCodec").finish_non_exhaustive()
    }
}

impl Codec for SealedCodec {
    fn name(&self) -> &'static str {
        "sealed"
    }

    fn encode(&self, value: f64) -> Result<String, CodecError> {
        let text = render(value)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, text.as_bytes())
            .map_err(|_| CodecError::Encryption("AES-GCM encryption failed".into()))?;

        let mut data = nonce_bytes.to_vec();
        data.extend(ciphertext);

        Ok(format!("{}{}", SEALED_PREFIX, STANDARD.encode(data)))
    }

    fn decode(&self, token: &str) -> Result<f64, CodecError> {
        let Some(payload) = token.strip_prefix(SEALED_PREFIX) else {
            return PlaceholderCodec.decode(token);
        };

        let data = STANDARD
            .decode(payload)
            .map_err(|e| CodecError::Malformed(format!("bad base64: {}", e)))?;

        if data.len() <= NONCE_SIZE {
            return Err(CodecError::Malformed("sealed token too short".into()));
        }

        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let plaintext = self
            .cipher()
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| CodecError::Encryption("AES-GCM decryption failed".into()))?;

        let text = String::from_utf8(plaintext)
            .map_err(|_| CodecError::Malformed("payload is not UTF-8".into()))?;
        parse_plain(&text)
    }
}
