//! Error types for the profile registry.

use crate::codec::CodecError;
use crate::status::Status;
use ledger_client::LedgerError;
use thiserror::Error;

/// Registry error types.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Malformed record at {key}: {source}")]
    ParseFailure {
        key: String,
        source: serde_json::Error,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: Status, to: Status },

    #[error("{caller} is not the owner of profile {id}")]
    Unauthorized { id: String, caller: String },

    #[error("Index append for {id} lost {attempts} consecutive races")]
    IndexContention { id: String, attempts: u32 },

    #[error("Profile {id} was stored but not indexed: {source}")]
    IndexAppendFailed {
        id: String,
        source: Box<RegistryError>,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decryption session expired at {expired_at}")]
    SessionExpired { expired_at: i64 },

    #[error("Serialization error: {0}")]
    Serialization(serde_json::Error),
}

impl RegistryError {
    /// Whether the failure was a user/signer declining the action rather
    /// than a system or network problem.
    pub fn is_declined(&self) -> bool {
        match self {
            RegistryError::Ledger(e) => e.is_declined(),
            RegistryError::IndexAppendFailed { source, .. } => source.is_declined(),
            _ => false,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// `IndexAppendFailed` is retried with `ProfileStore::retry_index`,
    /// never by creating the profile again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::IndexContention { .. } | RegistryError::IndexAppendFailed { .. } => true,
            RegistryError::Ledger(LedgerError::Unavailable(_) | LedgerError::Http(_)) => true,
            _ => false,
        }
    }
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
