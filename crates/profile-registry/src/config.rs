//! Registry configuration.

use crate::auth::DEFAULT_DURATION_DAYS;
use crate::codec::{Codec, CodecError, PlaceholderCodec, SealedCodec};
use crate::index::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use crate::store::DEFAULT_LIST_CONCURRENCY;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Token scheme used for new records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Placeholder,
    Sealed,
}

/// Main registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Chain id placed in decryption challenges.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Decryption session validity in days.
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,

    /// Compare-and-set attempts per index append.
    #[serde(default = "default_index_max_attempts")]
    pub index_max_attempts: u32,

    /// Base backoff between index append attempts.
    #[serde(default = "default_index_retry_backoff", with = "humantime_serde")]
    pub index_retry_backoff: Duration,

    /// Records fetched concurrently while listing.
    #[serde(default = "default_list_concurrency")]
    pub list_concurrency: usize,

    /// Bind decryption challenges to the tokens being revealed.
    #[serde(default = "default_true")]
    pub bind_ciphertexts: bool,

    #[serde(default)]
    pub codec: CodecKind,

    /// Hex AES-256 key, required for the sealed codec.
    pub codec_key: Option<SecretString>,
}

fn default_chain_id() -> u64 {
    11155111
}

fn default_duration_days() -> u32 {
    DEFAULT_DURATION_DAYS
}

fn default_index_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_index_retry_backoff() -> Duration {
    DEFAULT_RETRY_BACKOFF
}

fn default_list_concurrency() -> usize {
    DEFAULT_LIST_CONCURRENCY
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            duration_days: default_duration_days(),
            index_max_attempts: default_index_max_attempts(),
            index_retry_backoff: default_index_retry_backoff(),
            list_concurrency: default_list_concurrency(),
            bind_ciphertexts: true,
            codec: CodecKind::Placeholder,
            codec_key: None,
        }
    }
}

impl RegistryConfig {
    /// Build the configured codec.
    pub fn build_codec(&self) -> Result<Arc<dyn Codec>, CodecError> {
        match self.codec {
            CodecKind::Placeholder => Ok(Arc::new(PlaceholderCodec)),
            CodecKind::Sealed => {
                let key = self.codec_key.as_ref().ok_or_else(|| {
                    CodecError::Encryption("sealed codec requires a codec key".into())
                })?;
                Ok(Arc::new(SealedCodec::from_hex(key.expose_secret())?))
            }
        }
    }
}
