//! Ledger client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value encoding for key {key}: {reason}")]
    Encoding { key: String, reason: String },

    #[error("Write declined by signer")]
    Declined,

    #[error("Not authorized to write key {0}")]
    Unauthorized(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger rejected request: {status} - {message}")]
    Rejected { status: u16, message: String },
}

impl LedgerError {
    /// Whether the failure came from the user/signer refusing the action,
    /// as opposed to a system or network problem.
    pub fn is_declined(&self) -> bool {
        matches!(self, LedgerError::Declined)
    }
}
